mod api;
mod config;
mod error;
mod monitor;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use api::{AppState, RouterRegistry};
use config::Config;
use monitor::{session, RouterState, Scanner, UpdateEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string())),
        )
        .init();
    tracing::info!("babelweb starting...");

    let registry = RouterRegistry::new();
    let state = Arc::new(AppState::new(registry.clone()));

    // Sessions push accepted updates here; a relay task fans them out
    // to every connected viewer.
    let (tx, mut rx) = mpsc::channel::<UpdateEvent>(256);
    let relay_state = state.clone();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            relay_state.publish(event);
        }
    });

    for node in &config.nodes {
        tokio::spawn(monitor_router(
            node.clone(),
            registry.clone(),
            tx.clone(),
            config.reconnect_delay,
        ));
    }
    drop(tx);

    let bind_ip: IpAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.bind_address))?;
    let addr = SocketAddr::new(bind_ip, config.port);
    let app = api::create_router(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", addr);
    tracing::info!("  WS   ws://{}/ws", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Supervise one router connection: dial its monitor port, run a
/// session to completion, then reconnect after the configured delay.
/// State is rebuilt from the feed on every attempt; the session itself
/// carries no retry logic.
async fn monitor_router(
    node: String,
    registry: RouterRegistry,
    sink: mpsc::Sender<UpdateEvent>,
    reconnect_delay: Duration,
) {
    loop {
        match run_session(&node, &registry, &sink).await {
            Ok(()) => tracing::info!(node = %node, "monitor stream closed"),
            Err(e) => tracing::error!(node = %node, error = %e, "session ended"),
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}

async fn run_session(
    node: &str,
    registry: &RouterRegistry,
    sink: &mpsc::Sender<UpdateEvent>,
) -> anyhow::Result<()> {
    let stream = TcpStream::connect(node)
        .await
        .with_context(|| format!("connecting to {node}"))?;
    let mut scanner = Scanner::new(stream);

    let identity = session::handshake(&mut scanner).await?;
    tracing::info!(
        id = %identity.id,
        name = %identity.name,
        version = %identity.version,
        "handshake complete"
    );

    let state = Arc::new(RouterState::new(identity));
    registry.add(state.clone()).await;
    let outcome = session::run(&state, &mut scanner, sink).await;
    registry.remove(state.id()).await;
    Ok(outcome?)
}
