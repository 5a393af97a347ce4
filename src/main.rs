//! Quill server binary.
//!
//! Run with: cargo run

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quill::auth::TokenCodec;
use quill::config::Config;
use quill::{db, graphql};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing::info!("Connecting to database...");
    let db = db::connect(&config.database_url).await?;
    tracing::info!("Database connected!");

    tracing::info!("Syncing database schema...");
    db::init_schema(&db).await?;
    tracing::info!("Schema synced!");

    let tokens = TokenCodec::new(&config.jwt_secret);
    let schema = graphql::build_schema(db.clone(), tokens.clone());
    let app = graphql::router(schema, tokens);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("GraphQL server listening on http://{}", addr);
    tracing::info!("Apollo Sandbox available at http://{}/", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
