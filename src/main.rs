use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use flow_gateway::app;
use flow_gateway::config::AppConfig;
use flow_gateway::middleware::RecorderSink;
use flow_gateway::pipeline::Pipeline;
use flow_gateway::services::HttpPermissionChecker;

#[derive(Parser)]
#[command(name = "flow-gateway", about = "Flow API request pipeline")]
struct Args {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up JWT_SECRET, AUTH_SERVICE_URL, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env();
    tracing::info!("Starting Flow gateway in {:?} mode", config.environment);

    let permissions = HttpPermissionChecker::new(&config.auth_service.url, config.auth_service.timeout())
        .context("failed to build permission service client")?;
    let services = app::services(&config, Arc::new(RecorderSink), Arc::new(permissions))
        .context("failed to initialize token authority (is JWT_SECRET set?)")?;

    let pipeline = Pipeline::new(services);
    let router = app::router(&pipeline, &config);

    let port = args.port.unwrap_or(config.server.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Flow gateway listening on http://{}", bind_addr);

    axum::serve(listener, router).await.context("server error")?;
    Ok(())
}
