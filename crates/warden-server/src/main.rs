//! Warden license appliance entrypoint.
//!
//! Wires the vault, session pool, discovery transports, and HTTP control
//! surface together, and owns the shutdown sequence: every background task
//! is signalled, awaited, and the statement counter is flushed before exit.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use warden_api::{ApiSettings, AppState, build_app};
use warden_core::config::{AppConfig, Environment, artifact_path};
use warden_discovery::{DiscoveryResponder, MdnsAnnouncer};
use warden_issuer::{IssuerClient, IssuerConfig};
use warden_pool::SessionPool;
use warden_vault::{LicenseStore, machine_fingerprint};

#[derive(Parser, Debug)]
#[command(name = "warden-server")]
#[command(about = "LAN license appliance: session pool, sealed vault, discovery")]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP control-surface port
    #[arg(short, long)]
    port: Option<u16>,

    /// Deployment environment; `Development` selects the dev artifact folder
    #[arg(long, env = "WARDEN_ENVIRONMENT")]
    environment: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::default(),
    };
    if let Some(port) = args.port {
        config.http_port = port;
    }

    let environment = Environment::from_name(args.environment.as_deref());
    let path = artifact_path(environment);
    info!(?environment, artifact = %path.display(), "warden starting");

    // Vault and pool
    let store = Arc::new(LicenseStore::new(path, machine_fingerprint()));
    match store.load() {
        Ok(()) => info!("license loaded"),
        Err(warden_core::Error::ConfigMissing) => {
            warn!("no license artifact; activate via /api/activate-license")
        }
        Err(e) => error!(error = %e, "license artifact unusable"),
    }
    let pool = Arc::new(SessionPool::new(
        store.clone(),
        Duration::from_secs(config.flush_interval_secs),
    ));

    // Upstream issuer
    let issuer = Arc::new(IssuerClient::new(IssuerConfig {
        base_url: config.issuer_url.clone(),
        api_key: config.issuer_api_key.clone(),
        timeout: Duration::from_secs(config.issuer_timeout_secs),
    }));
    issuer.set_license_key(&store.record().license_key);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // mDNS announcer
    let announcer = Arc::new(MdnsAnnouncer::new().context("starting mdns daemon")?);
    announcer.set_reannounce_interval(Duration::from_secs(config.reannounce_interval_secs))?;
    if let Err(e) = announcer.advertise_license_service(config.http_port) {
        warn!(error = %e, "could not advertise license service");
    }
    if config.database_discovery
        && let Err(e) = announcer.advertise_database_service(
            &config.database_instance_id,
            config.database_port,
            &config.database_version,
        )
    {
        warn!(error = %e, "could not advertise database service");
    }
    announcer.clone().start();

    // UDP discovery responder
    let responder = Arc::new(DiscoveryResponder::new(
        "warden-license-server",
        config.http_port,
        config.database_port,
        config.database_instance_id.clone(),
        config.database_version.clone(),
    ));
    if config.database_discovery {
        responder.enable_database_discovery();
    }
    let discovery_socket = DiscoveryResponder::bind(config.discovery_port)
        .await
        .context("binding discovery port")?;
    let responder_handle = tokio::spawn(
        responder
            .clone()
            .run(discovery_socket, shutdown_rx.clone()),
    );

    // HTTP control surface
    let state = Arc::new(AppState {
        store: store.clone(),
        pool: pool.clone(),
        guard: issuer.clone(),
        issuer: issuer.clone(),
        settings: ApiSettings {
            server_name: "warden-license-server".to_string(),
            http_port: config.http_port,
            discovery_port: config.discovery_port,
            staleness_threshold: Duration::from_secs(config.staleness_threshold_secs),
            skew_threshold: Duration::from_secs(config.skew_threshold_secs),
        },
        shutdown: shutdown_rx.clone(),
    });
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("binding HTTP port {}", config.http_port))?;
    info!(port = config.http_port, "control surface listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Shutdown: stop background tasks, then flush the statement counter.
    info!("shutting down");
    let _ = shutdown_tx.send(true);
    announcer.stop().await;
    if let Err(e) = responder_handle.await {
        warn!(error = %e, "discovery responder did not exit cleanly");
    }
    match pool.flush() {
        Ok(()) => info!("statement counter flushed"),
        Err(warden_core::Error::ConfigMissing) => {}
        Err(e) => warn!(error = %e, "final flush failed"),
    }
    info!("bye");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install sigterm handler")
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
