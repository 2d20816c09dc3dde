use clap::Parser;
use std::process::ExitCode;
use tracing::Instrument;

use work_order_flow::cli::{AppContext, Cli};
use work_order_flow::config::{config, init_config};
use work_order_flow::telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
use work_order_flow::workflow::{ErrorKind, WorkflowError};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code(&e)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    init_config()?;
    let config = config()?;
    init_telemetry(&config.observability)?;
    tracing::debug!(
        database = config.database.as_ref().map(|db| db.url.as_str()),
        in_memory = cli.in_memory,
        "Configuration loaded"
    );

    let ctx = AppContext::bootstrap(config, cli.in_memory)
        .await?
        .with_identity(cli.role, cli.user);

    let correlation_id = generate_correlation_id();
    let span = create_workflow_span(
        cli.command.operation(),
        cli.command.target_id(),
        Some(&correlation_id),
    );
    let result = cli.command.execute(&ctx).instrument(span).await;

    ctx.shutdown().await;
    result
}

fn exit_code(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<WorkflowError>().map(WorkflowError::kind) {
        Some(ErrorKind::InvalidState) => ExitCode::from(2),
        Some(ErrorKind::Forbidden) => ExitCode::from(3),
        Some(ErrorKind::NotFound) => ExitCode::from(4),
        Some(ErrorKind::Storage) | None => ExitCode::FAILURE,
    }
}
