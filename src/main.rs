// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use relational_cover_server::{
    api::router,
    auth::SessionIssuer,
    blockchain::ChainClient,
    config::{Config, LogFormat},
    contract::FsArtifactStore,
    models::WalletAddress,
    state::{AppState, ServiceOptions},
    storage::{CoverDatabase, ProductRepository, ProductSeed, SettingsRepository, TREASURY_ADDRESS_KEY},
};

const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Upsert every product in the JSON array at `path`.
fn seed_products(db: &CoverDatabase, path: &Path) -> Result<usize, Box<dyn Error>> {
    let raw = std::fs::read(path)?;
    let seeds: Vec<ProductSeed> = serde_json::from_slice(&raw)?;
    let repo = ProductRepository::new(db);
    let now = Utc::now();

    let count = seeds.len();
    for seed in seeds {
        let product = seed.into_product(now)?;
        tracing::info!(product_id = %product.id, active = product.active, "Seeded product");
        repo.upsert(&product)?;
    }
    Ok(count)
}

/// Store the configured treasury unless one is already stored.
fn seed_treasury(db: &CoverDatabase, treasury: &WalletAddress) -> Result<(), Box<dyn Error>> {
    let settings = SettingsRepository::new(db);
    let configured = treasury.as_canonical();
    if settings.set_if_absent(TREASURY_ADDRESS_KEY, &configured)? {
        tracing::info!(treasury = %configured, "Treasury address stored");
    } else if let Some(stored) = settings.get(TREASURY_ADDRESS_KEY)? {
        if !stored.eq_ignore_ascii_case(&configured) {
            tracing::warn!(
                stored = %stored,
                configured = %configured,
                "TREASURY_ADDRESS differs from the stored treasury; keeping the stored value"
            );
        }
    }
    Ok(())
}

async fn shutdown_signal(handle: Handle<std::net::SocketAddr>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received, draining connections");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing(LogFormat::from_env());

    let config = Config::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;
    tracing::debug!(config = ?config, "Configuration loaded");

    let db = CoverDatabase::open(&config.database_path())?;
    tracing::info!(path = %config.database_path().display(), "Database opened");

    if let Some(path) = &config.products_file {
        let count = seed_products(&db, path)?;
        tracing::info!(count, path = %path.display(), "Product catalog seeded");
    }
    if let Some(treasury) = &config.treasury_address {
        seed_treasury(&db, treasury)?;
    }

    let chain = ChainClient::new(&config.chain_rpc_url)?;
    let artifacts = FsArtifactStore::new(config.signatures_dir(), config.public_base_url.clone());
    let sessions = SessionIssuer::new(
        &config.session_secret,
        config.session_ttl_secs,
        config.admin_wallets.clone(),
    );

    let state = AppState::new(
        db,
        sessions,
        Arc::new(chain),
        Arc::new(artifacts),
        ServiceOptions {
            siwe_domain: config.siwe_domain.clone(),
            payment_window_days: config.payment_window_days,
        },
    );
    let app = router(state);

    let addr = config.bind_addr()?;
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    match &config.tls {
        Some(tls) => {
            // Must happen before any TLS operation.
            rustls::crypto::ring::default_provider()
                .install_default()
                .map_err(|_| "failed to install rustls crypto provider")?;
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;

            tracing::info!(%addr, "Relational Cover listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            tracing::info!(%addr, "Relational Cover listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}
