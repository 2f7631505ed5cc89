//! History Writer binary: bounded-concurrency worker pool over the
//! `history-writer` subscription of `message-completed`.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::Semaphore;

use chatmesh_core::bus::MessageBus;
use chatmesh_service::config::WorkerArgs;
use chatmesh_service::wiring::Collaborators;
use chatmesh_types::config::subscriptions::HISTORY_WRITER;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = WorkerArgs::parse();
    let config = args.common.load()?;
    chatmesh_observe::tracing_setup::init_tracing(args.common.otel).map_err(|e| anyhow::anyhow!("{e}"))?;

    let max_concurrency = config.max_concurrency;
    let collaborators = Arc::new(Collaborators::build(config, &args.common.data_dir()).await?);
    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let shutdown = chatmesh_service::shutdown::install();

    tracing::info!(max_concurrency, "history writer listening for completion events");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            delivery = collaborators.bus.receive_completion(HISTORY_WRITER) => {
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(err) => {
                        tracing::error!(%err, "receive_completion failed");
                        continue;
                    }
                };

                let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
                let collaborators = collaborators.clone();
                tokio::spawn(async move {
                    chatmesh_service::history_writer::process_completion(collaborators, delivery).await;
                    drop(permit);
                });
            }
        }
    }

    tracing::info!("history writer shutting down");
    chatmesh_observe::tracing_setup::shutdown_tracing();
    Ok(())
}
