//! Graceful shutdown signal shared by all seven binaries.
//!
//! Wraps Ctrl+C/SIGTERM in a [`CancellationToken`] so HTTP binaries can hand
//! it straight to `axum::serve(...).with_graceful_shutdown(...)` while
//! worker binaries select on it inside their receive loop.

use tokio_util::sync::CancellationToken;

/// Spawns a task that cancels the returned token on Ctrl+C or SIGTERM.
pub fn install() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        child.cancel();
    });
    token
}

async fn wait_for_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
