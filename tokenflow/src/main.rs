use args::Args;
use clap::Parser;
use llm::Context;
use tokio_util::sync::CancellationToken;

mod args;
mod logger;
mod simulate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.config()?;

    logger::init(&args)?;

    let shutdown = CancellationToken::new();
    let ctx = Context::with_cancellation(shutdown.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Received Ctrl-C, cancelling the simulation");
            shutdown.cancel();
        }
    });

    let simulation = simulate::Simulation::from(&args);

    match simulate::run(&simulation, &config.streaming, &ctx).await {
        Ok(report) => report.log(),
        Err(e) => {
            log::error!("Simulation failed: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}
