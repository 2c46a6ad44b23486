use std::process::ExitCode;

use mobiclaw_lib::config;
use mobiclaw_lib::errors::MobiClawResult;
use mobiclaw_lib::model::InstructionStatus;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();
    mobiclaw_lib::init_tracing();

    let text = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if text.trim().is_empty() {
        eprintln!("usage: mobiclaw \"<instruction>\"");
        return ExitCode::from(2);
    }

    match run(&text).await {
        Ok(InstructionStatus::Completed) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "mobiclaw could not run the instruction");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(text: &str) -> MobiClawResult<InstructionStatus> {
    let cfg = config::load_config()?;
    let coordinator = mobiclaw_lib::build_coordinator(&cfg)?;

    let submitted = coordinator.submit(text).await?;
    let instruction = coordinator.process(submitted.id).await?;

    println!("instruction {}: {}", instruction.id, instruction.status);
    if let Some(result) = &instruction.result {
        println!("{result}");
    }
    for action in coordinator.actions_for(instruction.id).await? {
        let mark = if action.successful { "ok" } else { "FAILED" };
        println!(
            "  [{mark}] {}{}",
            action.label(),
            action
                .error_message
                .as_deref()
                .map(|e| format!(" ({e})"))
                .unwrap_or_default()
        );
    }
    Ok(instruction.status)
}
