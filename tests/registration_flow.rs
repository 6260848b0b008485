//! End-to-end tests for the registration form.
//!
//! These drive the public form API the way a front end would: load the bundled
//! schema, type into fields, press the step actions and read back the rendered
//! view. The gateway is scripted so each test decides which remote calls fail,
//! hang or succeed, and records what was sent.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use openbiz::form::{
    FieldView, FormSchema, GatewayError, Notice, OtpRequest, Outcome, Phase,
    RegistrationGateway, RegistrationSession, StepSubmission, StepView,
    render::ActionKind,
};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
enum Reply {
    Accept,
    Reject(&'static str),
    Hang,
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Reply>,
    otp_requests: Vec<OtpRequest>,
    submissions: Vec<StepSubmission>,
}

/// Gateway that answers from a queue of canned replies; an empty queue accepts.
#[derive(Debug, Clone, Default)]
struct ScriptedGateway {
    script: Arc<Mutex<Script>>,
}

impl ScriptedGateway {
    fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
        let gateway = Self::default();
        gateway.lock().replies.extend(replies);
        gateway
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn otp_requests(&self) -> Vec<OtpRequest> {
        self.lock().otp_requests.clone()
    }

    fn submissions(&self) -> Vec<StepSubmission> {
        self.lock().submissions.clone()
    }

    async fn reply(&self) -> Result<(), GatewayError> {
        let reply = self.lock().replies.pop_front().unwrap_or(Reply::Accept);
        match reply {
            Reply::Accept => Ok(()),
            Reply::Reject(reason) => Err(GatewayError::Rejected(reason.to_string())),
            Reply::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl RegistrationGateway for ScriptedGateway {
    async fn send_otp(&self, request: &OtpRequest) -> Result<(), GatewayError> {
        self.lock().otp_requests.push(request.clone());
        self.reply().await
    }

    async fn submit_step(&self, submission: &StepSubmission) -> Result<(), GatewayError> {
        self.lock().submissions.push(submission.clone());
        self.reply().await
    }
}

fn session(gateway: ScriptedGateway) -> Result<RegistrationSession<ScriptedGateway>> {
    Ok(RegistrationSession::new(Arc::new(FormSchema::udyam()?), gateway)
        .with_timeout(Duration::from_secs(5)))
}

fn view(session: &RegistrationSession<ScriptedGateway>) -> Result<StepView> {
    session.view().ok_or_else(|| anyhow!("nothing rendered"))
}

fn field_names(view: &StepView) -> Vec<String> {
    view.fields.iter().map(|f| f.name().to_string()).collect()
}

fn fill_aadhaar_step(session: &mut RegistrationSession<ScriptedGateway>) -> Result<()> {
    session.input("aadhaar", "123456789012")?;
    session.input("entrepreneurName", "Asha Verma")?;
    session.input("consent", true)?;
    Ok(())
}

#[tokio::test]
async fn completes_both_steps() -> Result<()> {
    let gateway = ScriptedGateway::default();
    let mut session = session(gateway.clone())?;
    let cancel = CancellationToken::new();

    fill_aadhaar_step(&mut session)?;
    assert_eq!(
        session.send_otp(&cancel).await?,
        Outcome::Settled(Some(Notice::OtpSent))
    );
    assert_eq!(session.state().phase(), Phase::Step1OtpSent);
    assert_eq!(
        field_names(&view(&session)?),
        ["aadhaar", "entrepreneurName", "consent", "otp"]
    );

    session.input("otp", "654321")?;
    assert_eq!(session.advance(&cancel).await?, Outcome::Settled(None));
    assert_eq!(session.state().current_step(), 2);
    assert!(!session.state().otp_sent());

    let step2 = view(&session)?;
    assert_eq!(step2.title, "Enterprise Details");
    assert!(step2.notice.is_none());
    assert_eq!(field_names(&step2), ["pan", "panName"]);

    session.input("pan", "ABCDE1234F")?;
    session.input("panName", "Asha Verma")?;
    assert_eq!(
        session.advance(&cancel).await?,
        Outcome::Settled(Some(Notice::Completed))
    );
    assert_eq!(session.state().phase(), Phase::Completed);

    let done = view(&session)?;
    assert!(done.action.is_none());
    assert_eq!(
        done.notice.map(|n| n.message),
        Some("Registration completed successfully!")
    );

    let otp_requests = gateway.otp_requests();
    assert_eq!(otp_requests.len(), 1);
    assert_eq!(otp_requests[0].text("aadhaar"), Some("123456789012"));
    assert!(!otp_requests[0].values.contains_key("otp"));

    let submissions = gateway.submissions();
    let steps: Vec<usize> = submissions.iter().map(|s| s.step).collect();
    assert_eq!(steps, [1, 2]);
    assert!(submissions[1].values.contains_key("pan"));
    Ok(())
}

#[tokio::test]
async fn invalid_fields_block_without_calling_gateway() -> Result<()> {
    let gateway = ScriptedGateway::default();
    let mut session = session(gateway.clone())?;
    let cancel = CancellationToken::new();

    session.input("aadhaar", "12345")?;
    session.input("entrepreneurName", "Asha Verma")?;
    session.input("consent", true)?;

    let outcome = session.send_otp(&cancel).await?;
    assert_eq!(outcome, Outcome::Invalid(vec!["aadhaar".to_string()]));
    assert!(gateway.otp_requests().is_empty());

    let rendered = view(&session)?;
    let errors: Vec<(&str, &str)> = rendered
        .fields
        .iter()
        .filter_map(|f| f.error().map(|e| (f.name(), e)))
        .collect();
    assert_eq!(
        errors,
        [(
            "aadhaar",
            "Aadhaar number shall be required for Udyam Registration."
        )]
    );
    Ok(())
}

#[tokio::test]
async fn rejected_otp_send_can_be_retried() -> Result<()> {
    let gateway = ScriptedGateway::with_replies([Reply::Reject("provider down")]);
    let mut session = session(gateway.clone())?;
    let cancel = CancellationToken::new();
    fill_aadhaar_step(&mut session)?;

    assert_eq!(
        session.send_otp(&cancel).await?,
        Outcome::Settled(Some(Notice::OtpFailed))
    );
    assert_eq!(session.state().phase(), Phase::Step1Collecting);
    let rendered = view(&session)?;
    assert!(rendered.notice.as_ref().is_some_and(|n| n.failure));
    assert!(!field_names(&rendered).contains(&"otp".to_string()));

    assert_eq!(
        session.send_otp(&cancel).await?,
        Outcome::Settled(Some(Notice::OtpSent))
    );
    assert_eq!(gateway.otp_requests().len(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn hung_submission_times_out_and_keeps_step() -> Result<()> {
    let gateway = ScriptedGateway::with_replies([Reply::Accept, Reply::Hang]);
    let mut session = session(gateway)?;
    let cancel = CancellationToken::new();
    fill_aadhaar_step(&mut session)?;
    session.send_otp(&cancel).await?;
    session.input("otp", "111111")?;

    let before = session.state().clone();
    assert_eq!(
        session.advance(&cancel).await?,
        Outcome::Settled(Some(Notice::SubmitFailed))
    );
    assert!(!session.state().loading());
    assert_eq!(session.state().current_step(), 1);
    assert!(session.state().otp_sent());
    assert_eq!(session.state().values(), before.values());
    assert_eq!(session.state().errors(), before.errors());

    let action = view(&session)?
        .action
        .ok_or_else(|| anyhow!("no action after failure"))?;
    assert_eq!(action.kind, ActionKind::VerifyOtp);
    assert!(!action.disabled);
    Ok(())
}

#[tokio::test]
async fn cancellation_aborts_in_flight_call() -> Result<()> {
    let gateway = ScriptedGateway::with_replies([Reply::Hang]);
    let mut session = session(gateway)?;
    fill_aadhaar_step(&mut session)?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    assert_eq!(
        session.send_otp(&cancel).await?,
        Outcome::Settled(Some(Notice::OtpFailed))
    );
    assert!(!session.state().loading());
    assert!(!session.state().otp_sent());
    Ok(())
}

#[tokio::test]
async fn custom_schema_drives_the_same_engine() -> Result<()> {
    let schema = FormSchema::from_json(
        r#"{"steps":[
            {"title":"Contact","fields":[
                {"id":"email","name":"email","label":"Email","type":"text",
                 "validation":{"required":true,"pattern":"^[^@]+@[^@]+$","message":"Enter an email"}},
                {"id":"otp","name":"otp","label":"Code","type":"text","conditional":true,
                 "validation":{"required":true,"message":"Enter the code"}}
            ]},
            {"title":"Profile","fields":[
                {"id":"nick","name":"nick","label":"Nickname","type":"text"}
            ]},
            {"title":"Terms","fields":[
                {"id":"terms","name":"terms","label":"I agree","type":"checkbox",
                 "validation":{"required":true}}
            ]}
        ]}"#,
    )?;
    let gateway = ScriptedGateway::default();
    let mut session = RegistrationSession::new(Arc::new(schema), gateway);
    let cancel = CancellationToken::new();

    session.input("email", "asha@example.com")?;
    session.send_otp(&cancel).await?;
    session.input("otp", "anything")?;
    session.advance(&cancel).await?;

    // optional field left empty; intermediate step uses the continue action
    let profile = session.view().ok_or_else(|| anyhow!("nothing rendered"))?;
    assert_eq!(profile.badge, "Step 2 of 3");
    assert_eq!(
        profile.action.map(|a| (a.kind, a.label)),
        Some((ActionKind::Continue, "Continue"))
    );
    assert_eq!(session.advance(&cancel).await?, Outcome::Settled(None));

    let outcome = session.advance(&cancel).await?;
    assert_eq!(outcome, Outcome::Invalid(vec!["terms".to_string()]));
    let terms = session.view().ok_or_else(|| anyhow!("nothing rendered"))?;
    assert!(matches!(
        terms.fields.first(),
        Some(FieldView::Checkbox { error: Some(message), .. }) if message == "This field is required"
    ));

    session.input("terms", true)?;
    assert_eq!(
        session.advance(&cancel).await?,
        Outcome::Settled(Some(Notice::Completed))
    );
    Ok(())
}
