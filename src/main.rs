use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stemrender::automation::{Controller, XdotoolDriver};
use stemrender::cli::{Cli, Command};
use stemrender::config::WorkerConfig;
use stemrender::processor::{JobProcessor, ProcessorOptions};
use stemrender::queue::QueueClient;
use stemrender::worker::Worker;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "stemrender=debug"
    } else {
        "stemrender=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = WorkerConfig::load(cli.config.as_deref())?;
    let queue = Arc::new(QueueClient::new(
        config.api_url.clone(),
        config.api_key.clone(),
    ));

    match cli.command {
        Command::Status => {
            let jobs = queue.pending_renders().await?;
            if jobs.is_empty() {
                println!("No pending renders.");
            } else {
                println!("{} pending render(s):", jobs.len());
                for job in jobs {
                    println!("  {}  {}", job.id, job.title);
                }
            }
        }
        Command::Run { once } => {
            let controller = Controller::new(XdotoolDriver, config.automation());
            let processor = JobProcessor::new(
                Arc::clone(&queue),
                controller,
                ProcessorOptions {
                    work_dir: config.work_dir.clone(),
                    project_extension: config.render.project_extension.clone(),
                    stem_base_path: config.stem_base_path.clone(),
                },
            );
            let worker = Worker::new(queue, processor, config.poll_interval(), cli.verbose);

            if once {
                worker.run_once().await;
            } else {
                let (shutdown_tx, shutdown_rx) = watch::channel(false);
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("stop requested");
                        let _ = shutdown_tx.send(true);
                    }
                });
                worker.run(shutdown_rx).await;
            }
        }
    }

    Ok(())
}
