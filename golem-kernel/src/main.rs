/**
 * GOLEM KERNEL - Point d'entrée du control plane
 *
 * RÔLE : Charge .env et kernel.yaml, initialise le logging, construit les
 * dépendances hôte (runner de commandes, fetcher de scripts) et sert l'API HTTP.
 *
 * UTILITÉ : Point d'administration unique d'un nœud provider Golem.
 */

mod config;
mod http;
mod models;

use crate::config::load_config;
use crate::http::AppState;
use anyhow::Context;
use golem_host::{HttpScriptFetcher, SystemCommandRunner};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("golem_kernel=info,golem_host=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = load_config().await;
    let addr = cfg.bind_addr()?;

    let api_key = std::env::var("GOLEM_API_KEY").ok().filter(|k| !k.is_empty());
    if api_key.is_none() {
        info!("GOLEM_API_KEY not set, API is open");
    }

    let fetcher = HttpScriptFetcher::new(cfg.host.fetch_timeout()).context("building HTTP client")?;
    let app_state = AppState {
        runner: Arc::new(SystemCommandRunner::new()),
        fetcher: Arc::new(fetcher),
        host: Arc::new(cfg.host),
        api_key,
    };

    let app = http::build_router(app_state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Listening on http://{addr}");
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
