mod api;
mod auth;
mod config;
mod db;
mod error;
mod models;
mod store;

use crate::auth::Identity;
use crate::config::{AppConfig, BackendKind};
use crate::db::{CollectionBackend, MemoryBackend, ScyllaBackend};
use crate::error::handle_rejection;
use crate::models::UserId;
use crate::store::CollectionStore;
use env_logger::Builder;
use log::{error, info, warn};
use std::sync::Arc;
use warp::Filter;

async fn connect_backend(config: &AppConfig) -> Option<Arc<dyn CollectionBackend>> {
    match config.backend {
        BackendKind::Memory => {
            warn!("Using in-memory store; collections are lost on restart.");
            Some(Arc::new(MemoryBackend::new()))
        }
        BackendKind::Scylla => {
            match ScyllaBackend::connect(&config.scylla_nodes, &config.keyspace).await {
                Ok(backend) => Some(Arc::new(backend)),
                Err(e) => {
                    error!("Failed to initialize database: {}", e);
                    None
                }
            }
        }
    }
}

/// `issue-token <user-id>` prints a bearer token for local testing.
fn issue_token(identity: &Identity, user: Option<String>) {
    let user = match user.map(UserId::new) {
        Some(Ok(user)) => user,
        _ => {
            eprintln!("usage: asset_collections issue-token <user-id>");
            return;
        }
    };
    match identity.create_token(&user) {
        Ok(token) => println!("{}", token),
        Err(e) => error!("Failed to sign token: {}", e),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down...");
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            Builder::new().filter_level(log::LevelFilter::Info).init();
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    Builder::new()
        .filter_level(config.log_level)
        .format_timestamp_secs()
        .parse_default_env()
        .init();

    let identity = Arc::new(Identity::new(
        &config.jwt_secret,
        chrono::Duration::hours(config.token_ttl_hours),
    ));

    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some("issue-token") {
        issue_token(&identity, args.next());
        return;
    }

    let backend = match connect_backend(&config).await {
        Some(backend) => backend,
        None => return,
    };
    info!("Connected to {:?} store...", config.backend);

    let store = Arc::new(CollectionStore::new(backend));

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["authorization", "content-type"])
        .allow_methods(vec!["GET", "POST", "DELETE"]);

    let api = api::routes(store, identity)
        .recover(handle_rejection)
        .with(cors)
        .with(warp::log("asset_collections::api"));

    let (addr, server) =
        warp::serve(api).bind_with_graceful_shutdown(config.addr(), shutdown_signal());
    info!("Server running on http://{}", addr);
    server.await;
}
