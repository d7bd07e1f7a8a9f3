// src/main.rs

use runsource::{cli, logging, run, EXIT_STATUS};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("runsource error: {err:?}");
    }
    std::process::exit(EXIT_STATUS);
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    let report = run(args).await?;
    if let Some(err) = report.last_error {
        tracing::debug!(cycles = report.cycles, "run ended after failure: {err}");
    }
    Ok(())
}
