use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, Command};
use openbiz::form::{FormSchema, RegistrationSession, SimulatedGateway, StepView};
use std::{fs, sync::Arc};
use tokio_util::sync::CancellationToken;

fn print_view(view: Option<StepView>) -> Result<()> {
    let view = view.ok_or_else(|| anyhow!("form state points past the last step"))?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("form")
        .about("Render the registration form as JSON")
        .arg(
            Arg::new("schema")
                .long("schema")
                .help("Path to a form schema document (defaults to the bundled Udyam form)"),
        )
        .arg(
            Arg::new("walkthrough")
                .long("walkthrough")
                .help("Fill the Udyam form with sample values against the simulated gateway, printing every step")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let schema = match matches.get_one::<String>("schema") {
        Some(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
            FormSchema::from_json(&json)?
        }
        None => FormSchema::udyam()?,
    };

    let mut session = RegistrationSession::new(Arc::new(schema), SimulatedGateway::default());
    print_view(session.view())?;

    if !matches.get_flag("walkthrough") {
        return Ok(());
    }

    let cancel = CancellationToken::new();
    session.input("aadhaar", "123456789012")?;
    session.input("entrepreneurName", "Asha Verma")?;
    session.input("consent", true)?;
    session.send_otp(&cancel).await?;
    print_view(session.view())?;

    session.input("otp", "123456")?;
    session.advance(&cancel).await?;
    print_view(session.view())?;

    session.input("pan", "ABCDE1234F")?;
    session.input("panName", "Asha Verma")?;
    session.advance(&cancel).await?;
    print_view(session.view())
}
