#![forbid(unsafe_code)]

use std::net::SocketAddr;

use chatdesk_server::{build_router, init_tracing, AppConfig};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let database_url = std::env::var("CHATDESK_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("CHATDESK_DATABASE_URL is required for runtime"))?;
    let app_config = AppConfig {
        bootstrap_admin_email: std::env::var("CHATDESK_BOOTSTRAP_ADMIN_EMAIL").ok(),
        bootstrap_admin_name: std::env::var("CHATDESK_BOOTSTRAP_ADMIN_NAME")
            .unwrap_or_else(|_| String::from("Administrator")),
        bootstrap_admin_password: std::env::var("CHATDESK_BOOTSTRAP_ADMIN_PASSWORD").ok(),
        database_url: Some(database_url),
        ..AppConfig::default()
    };
    let app = build_router(&app_config)?;
    let addr = std::env::var("CHATDESK_BIND_ADDR")
        .unwrap_or_else(|_| String::from("0.0.0.0:3000"))
        .parse::<SocketAddr>()
        .map_err(|e| anyhow::anyhow!("invalid CHATDESK_BIND_ADDR: {e}"))?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "chatdesk-server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
