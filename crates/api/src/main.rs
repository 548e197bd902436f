//! Twin API server binary.
//!
//! Usage:
//!   twin-api --config twin.toml
//!   twin-api --port 8080
//!   twin-api --port 8080 --bind 0.0.0.0
//!
//! # Environment Variables
//!
//! - `TWIN_BIND_ADDR` - Server bind address (default: from config, then 127.0.0.1)
//! - `TWIN_CORS_ORIGINS` - CORS allowed origins (comma-separated)
//! - `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GEMINI_API_KEY` - provider keys
//! - `TWIN_STORE_API_KEY` - vector store key for the REST backend

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twin_api::{serve, AppState};
use twin_orchestrator::TwinConfig;

fn print_help() {
    println!("Twin API Server");
    println!();
    println!("Usage: twin-api [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -p, --port <PORT>        Port to listen on (default: 8080)");
    println!("  -b, --bind <ADDR>        Bind address (default: 127.0.0.1, env: TWIN_BIND_ADDR)");
    println!("  -c, --config <FILE>      Path to a TOML config file");
    println!("  -h, --help               Show this help message");
    println!();
    println!("Environment variables:");
    println!("  TWIN_BIND_ADDR           Server bind address (overridden by --bind flag)");
    println!("  TWIN_CORS_ORIGINS        CORS allowed origins (comma-separated)");
    println!("  OPENAI_API_KEY           Key for OpenAI-compatible providers");
    println!("  ANTHROPIC_API_KEY        Key for Anthropic");
    println!("  GEMINI_API_KEY           Key for Gemini generation and embeddings");
    println!("  TWIN_STORE_API_KEY       Key for the REST vector store");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,twin_api=debug,twin_orchestrator=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut port: Option<u16> = None;
    let mut config_path: Option<String> = None;
    let mut bind_addr: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port = Some(args[i + 1].parse().map_err(|_| {
                        anyhow::anyhow!("Invalid port number: {}", args[i + 1])
                    })?);
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    bind_addr = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                tracing::warn!(argument = %other, "Ignoring unknown argument");
            }
        }
        i += 1;
    }

    let config = if let Some(path) = config_path {
        tracing::info!(path = %path, "Loading configuration");
        TwinConfig::from_file(&path)?
    } else {
        tracing::info!("Using default configuration");
        TwinConfig::default()
    };

    // CLI flag > env var > config file
    let host = bind_addr
        .or_else(|| std::env::var("TWIN_BIND_ADDR").ok())
        .unwrap_or_else(|| config.server.bind_addr.clone());
    let port = port.unwrap_or(config.server.port);

    if host == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0 exposes the API to all network interfaces. \
             There is no authentication layer, so put it behind a gateway or firewall."
        );
    }

    let cors_origins: Vec<String> = std::env::var("TWIN_CORS_ORIGINS")
        .ok()
        .map(|s| {
            s.split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect()
        })
        .unwrap_or_else(|| config.server.cors_origins.clone());

    let state = AppState::new(&config)?;

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    serve(Arc::new(state), addr, &cors_origins).await?;

    Ok(())
}
