//! History Reader binary: read-only HTTP surface over the document store
//! for listing conversations, fetching messages, and renaming.

use std::sync::Arc;

use clap::Parser;

use chatmesh_service::config::HttpArgs;
use chatmesh_service::wiring::Collaborators;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = HttpArgs::parse();
    let config = args.common.load()?;
    chatmesh_observe::tracing_setup::init_tracing(args.common.otel).map_err(|e| anyhow::anyhow!("{e}"))?;

    let collaborators = Arc::new(Collaborators::build(config, &args.common.data_dir()).await?);
    let router = chatmesh_service::http::history_reader::router(collaborators);

    let listener = tokio::net::TcpListener::bind(args.addr()).await?;
    tracing::info!(addr = %args.addr(), "history reader listening");

    let shutdown = chatmesh_service::shutdown::install();
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    chatmesh_observe::tracing_setup::shutdown_tracing();
    Ok(())
}
