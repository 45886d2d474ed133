//! Process entry point (§6 External Interfaces, §4.8 Background Loops):
//! resolve configuration and storage through `bootstrap`, start the
//! maintenance loops, then serve the proxy router until a shutdown signal
//! drains in-flight work and closes the listener.

use std::time::Duration;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let boot = maxx_core::bootstrap::bootstrap_from_env().await?;
    let state = boot.state.clone();

    let recovered = maxx_core::background::recover_orphaned_requests(&state).await?;
    if recovered > 0 {
        tracing::info!(recovered, "recovered orphaned proxy requests at startup");
    }
    let _cooldown_gc = maxx_core::background::spawn_cooldown_gc(state.clone());
    let _stats_aggregator = maxx_core::background::spawn_stats_aggregator(state.clone());
    let _quota_refresh = maxx_core::background::spawn_quota_refresh(state.clone(), Duration::from_secs(600));

    let global = state.global_config();
    let bind_addr = parse_bind_addr(&global.addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");

    let graceful_timeout = Duration::from_secs(global.graceful_shutdown_timeout_secs);
    let http_timeout = Duration::from_secs(global.http_shutdown_timeout_secs);

    let app = maxx_router::build_router(state.clone());
    let shutdown_state = state.clone();
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received, draining in-flight requests");
        if !shutdown_state.tracker.graceful_shutdown(graceful_timeout).await {
            tracing::warn!("graceful shutdown timed out with requests still in flight");
        }
    });

    if tokio::time::timeout(graceful_timeout + http_timeout, serve).await.is_err() {
        tracing::warn!("http server did not shut down within its timeout budget");
    }

    Ok(())
}

/// `:9880`-style addresses bind every interface; anything else (`127.0.0.1:9880`)
/// is passed straight through to `TcpListener::bind`.
fn parse_bind_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => addr.to_string(),
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_expands_bare_port() {
        assert_eq!(parse_bind_addr(":9880"), "0.0.0.0:9880");
    }

    #[test]
    fn bind_addr_passes_through_explicit_host() {
        assert_eq!(parse_bind_addr("127.0.0.1:9880"), "127.0.0.1:9880");
    }
}
