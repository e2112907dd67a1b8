use std::sync::Arc;

mod app;
mod config;
mod db;
mod error;
mod extract;
mod health;
mod openapi;
mod state;
mod users;

use crate::{
    config::AppConfig, db::Database, state::AppState, users::repo::MongoUserRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "user_service=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let addr = config.bind_addr()?;

    let db = Database::connect(&config.mongodb).await?;
    db.ensure_indexes().await?;

    let state = AppState::new(Arc::new(MongoUserRepository::new(&db)));
    app::serve(app::build_app(state), addr).await?;

    db.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}
