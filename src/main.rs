use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Router,
    http::HeaderValue,
    routing::get,
};
use parley::{
    AppState,
    config::Config,
    db,
    messages::SqliteMessages,
    rooms::{self, Room},
    token::Tokens,
    users::SqliteUsers,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logs_level).context("Invalid LOGS_LEVEL")?)
        .init();

    if config.ephemeral_secret {
        warn!("TOKEN_SECRET not set, tokens issued by this process won't survive a restart");
    }

    let db_pool = db::connect(&config.database_url)
        .await
        .with_context(|| format!("Unable to open database {}", config.database_url))?;
    info!("Connected to database");

    let users = Arc::new(SqliteUsers::new(db_pool.clone()));
    let messages = Arc::new(SqliteMessages::new(db_pool, users.clone()));
    let room = Room::new(users, messages, Tokens::new(config.token_secret.clone()));

    let cors = cors_layer(config.cors_origins.as_deref());
    let addr = format!("{}:{}", config.host, config.port);
    let app_state = AppState {
        room: Arc::new(room),
        config: Arc::new(config),
    };

    let app = Router::new()
        .route("/health", get(health))
        .merge(rooms::router())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server run at {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

fn cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some(list) => {
            let origins: Vec<HeaderValue> = list
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins))
        }
        None => CorsLayer::permissive(),
    }
}
