//! Uplift server library.
//!
//! Provides a reusable server function to serve Uplift either for the binary, or for the integration tests.

#![deny(missing_docs)]

mod client_identity;
mod cors;
mod health;
mod security_headers;

use std::{net::SocketAddr, time::Duration};

use anyhow::anyhow;
use axum::{Router, routing::get};
use axum_server::{Handle, tls_rustls::RustlsConfig};
use client_identity::ClientIdentityLayer;
use config::Config;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

/// Time in-flight requests get to finish once shutdown was requested.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for serving Uplift.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized Uplift TOML configuration.
    pub config: Config,
    /// Cancelled to stop accepting connections and shut down gracefully.
    pub shutdown: CancellationToken,
}

/// Starts and runs the Uplift server with the provided configuration.
pub async fn serve(
    ServeConfig {
        listen_address,
        config,
        shutdown,
    }: ServeConfig,
) -> anyhow::Result<()> {
    let cors = if let Some(cors_config) = &config.server.cors {
        cors::generate(cors_config)
    } else {
        CorsLayer::permissive()
    };

    if !config.upstream.has_credential_source() {
        log::warn!("No upstream API key available. Transform requests will fail with server_misconfigured.");
    }

    // The identity layer wraps the transform routes only, the health check is not rate limited.
    let mut app = rewrite::router(&config)?
        .layer(ClientIdentityLayer::new(config.server.client_identity.clone()))
        .layer(cors.clone());

    if config.server.health.enabled {
        if let Some(listen) = config.server.health.listen {
            let health = health::bind_health_endpoint(
                listen,
                config.server.tls.clone(),
                config.server.health.clone(),
                shutdown.clone(),
            );

            tokio::spawn(async move {
                if let Err(e) = health.await {
                    log::error!("Health endpoint failed: {e}");
                }
            });
        } else {
            let health_router = Router::new()
                .route(&config.server.health.path, get(health::health))
                .layer(cors.clone());

            app = app.merge(health_router);
        }
    }

    if config.server.security_headers.enabled {
        app = security_headers::inject_layer(app);
    }

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    let path = &config.transform.path;

    match &config.server.tls {
        Some(tls_config) => {
            install_crypto_provider();

            let rustls_config = RustlsConfig::from_pem_file(&tls_config.certificate, &tls_config.key)
                .await
                .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

            log::info!("Transform endpoint available at: https://{listen_address}{path}/transform");

            let handle = Handle::new();
            tokio::spawn(shutdown_on_cancel(handle.clone(), shutdown));

            axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                .handle(handle)
                .serve(service)
                .await
                .map_err(|e| anyhow!("Failed to start HTTPS server: {e}"))?;
        }
        None => {
            log::info!("Transform endpoint available at: http://{listen_address}{path}/transform");

            axum::serve(listener, service)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
                .map_err(|e| anyhow!("Failed to start HTTP server: {}", e))?;
        }
    }

    log::info!("Server stopped");

    Ok(())
}

/// axum-server needs a process wide rustls provider when more than one is compiled in.
pub(crate) fn install_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    }
}

async fn shutdown_on_cancel(handle: Handle, shutdown: CancellationToken) {
    shutdown.cancelled().await;
    handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
}
