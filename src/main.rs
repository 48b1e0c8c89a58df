// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use keycloak_auth_bridge::{
    api::router,
    config::BridgeConfig,
    state::AppState,
    telemetry::{init_tracing, LogFormat},
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(LogFormat::from_env());

    let config = BridgeConfig::from_env().inspect_err(|e| error!(error = %e, "invalid configuration"))?;
    if config.has_insecure_same_site_none() {
        warn!("COOKIE_SAME_SITE=None without COOKIE_SECURE; browsers will drop the session cookies");
    }

    let host = config.host.clone();
    let port = config.port;
    info!(
        realm = %config.keycloak.realm,
        client_id = %config.keycloak.client_id,
        resource_id = %config.keycloak.resource_id,
        "configuration loaded"
    );

    let state = AppState::new(config)?;
    let app = router(state);

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!(addr = %listener.local_addr()?, "keycloak auth bridge listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("server shutdown complete");
    Ok(())
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM.
async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
    shutdown.cancel();
}
