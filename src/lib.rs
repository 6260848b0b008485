//! # OpenBiz (Udyam registration)
//!
//! `openbiz` has two halves:
//!
//! - [`form`]: a schema-driven, multi-step registration form engine. A JSON
//!   schema describes the steps and their fields; per-field validation, the
//!   step state machine, conditional (OTP-gated) fields and a serializable view
//!   are all derived from it. The bundled schema is the Udyam registration form
//!   (Aadhaar + OTP, then PAN).
//! - [`api`]: the signup API. `POST /api/auth/signup` validates the request,
//!   rejects duplicate emails, hashes the password with Argon2id and stores the
//!   user in Postgres. Health and database probes sit next to it.
//!
//! [`cli`] wires configuration, logging and the optional OTLP exporter around
//! the API server.

pub mod api;
pub mod cli;
pub mod form;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
