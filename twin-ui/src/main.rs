//! Twin UI server - HTTP chat interface for the profile agent.

mod routes;
mod sse;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;
use twin::bootstrap::{Overrides, build_agent, load_settings};
use twin::io::config::DEFAULT_CONFIG_FILE;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "twin-ui")]
#[command(about = "HTTP chat server for the recruiter-facing profile agent")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "3001")]
    port: u16,

    /// Path to the agent config file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the configured model name
    #[arg(long)]
    model: Option<String>,

    /// Directory containing UI static files (defaults to ./ui/dist next to the config)
    #[arg(long)]
    ui_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("twin_ui=info".parse()?),
        )
        .init();

    let args = Args::parse();
    info!(config = %args.config.display(), "starting twin-ui");

    // The model and sheets clients are blocking; build them off the async runtime.
    let config_path = args.config.clone();
    let overrides = Overrides {
        model: args.model.clone(),
    };
    let agent = tokio::task::spawn_blocking(move || {
        let config = load_settings(&config_path, &overrides)?;
        build_agent(&config_path, &config)
    })
    .await
    .context("agent setup task")??;

    let state = AppState::new(Arc::new(agent));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .nest("/api", routes::api_router())
        .route("/events", get(sse::events_handler))
        .layer(cors)
        .with_state(state);

    let ui_dir = args.ui_dir.unwrap_or_else(|| {
        args.config
            .parent()
            .map(|dir| dir.join("ui").join("dist"))
            .unwrap_or_else(|| PathBuf::from("ui/dist"))
    });

    if ui_dir.exists() {
        info!(ui_dir = %ui_dir.display(), "serving static UI files");
        app = app.fallback_service(ServeDir::new(ui_dir).append_index_html_on_directories(true));
    } else {
        info!(ui_dir = %ui_dir.display(), "UI directory not found, API-only mode");
    }

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
