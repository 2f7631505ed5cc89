//! Ingress binary: accepts HTTP chat submissions and enqueues them on the
//! bus. Stateless -- scale-to-zero tolerant, no in-memory session table.

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
    let router = chatmesh_service::http::ingress::router(collaborators);

    let listener = tokio::net::TcpListener::bind(args.addr()).await?;
    tracing::info!(addr = %args.addr(), "ingress listening");

    let shutdown = chatmesh_service::shutdown::install();
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    chatmesh_observe::tracing_setup::shutdown_tracing();
    Ok(())
}
