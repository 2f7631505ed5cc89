//! Generator binary: the bounded-concurrency worker pool that turns
//! `user-messages` deliveries into streamed, recorded answers.

use std::sync::Arc;

use chatmesh_core::bus::MessageBus;
use clap::Parser;
use tokio::sync::Semaphore;

use chatmesh_service::config::WorkerArgs;
use chatmesh_service::wiring::Collaborators;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = WorkerArgs::parse();
    let config = args.common.load()?;
    chatmesh_observe::tracing_setup::init_tracing(args.common.otel).map_err(|e| anyhow::anyhow!("{e}"))?;

    let max_concurrency = config.max_concurrency;
    let collaborators = Arc::new(Collaborators::build(config, &args.common.data_dir()).await?);
    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let shutdown = chatmesh_service::shutdown::install();

    tracing::info!(max_concurrency, "generator listening for user messages");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            delivery = collaborators.bus.receive_user_message() => {
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(err) => {
                        tracing::error!(%err, "receive_user_message failed");
                        continue;
                    }
                };

                let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
                let collaborators = collaborators.clone();
                tokio::spawn(async move {
                    chatmesh_service::generator::process_message(collaborators, delivery).await;
                    drop(permit);
                });
            }
        }
    }

    tracing::info!("generator shutting down");
    chatmesh_observe::tracing_setup::shutdown_tracing();
    Ok(())
}
