use anyhow::{Context, Result};
use clap::Parser;
use mcp_atlassian::{
    adapters::server::AtlassianServer,
    app::dispatcher::Dispatcher,
    domain::ports::{ConfluenceApi, JiraApi},
    infra::{
        config::AppConfig, confluence_client::ConfluenceClient, jira_client::JiraClient, metrics,
    },
};
use rmcp::{ServiceExt, transport::stdio};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "MCP server exposing Confluence and Jira operations over stdio."
)]
struct Cli {
    /// Dotenv file loaded before reading the environment (missing file is fine)
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Hide and refuse every write operation
    #[arg(long)]
    read_only: bool,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn log_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env_loaded = dotenvy::from_path(&cli.env_file).is_ok();

    // stdout carries the MCP JSON-RPC stream; logs go to stderr only
    fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .compact()
        .init();
    if env_loaded {
        tracing::debug!(path = %cli.env_file.display(), "environment file loaded");
    }

    let mut config = AppConfig::load().context("load configuration")?;
    if cli.read_only {
        config.read_only_mode = Some(true);
    }

    if let Some(metrics_cfg) = config.metrics_server_config()? {
        if metrics_cfg.allow_insecure && metrics_cfg.tls.is_none() {
            tracing::warn!(
                addr = %metrics_cfg.addr,
                "metrics server running without TLS (dev override)"
            );
        } else if metrics_cfg.auth_token.is_none() {
            tracing::warn!(
                addr = %metrics_cfg.addr,
                "metrics auth token missing; set METRICS_AUTH_TOKEN for production"
            );
        }
        metrics::spawn_metrics_server(metrics_cfg).await;
    }

    let jira: Option<Arc<dyn JiraApi>> = match config.jira_settings() {
        Some(settings) => {
            tracing::info!(url = %settings.url, cloud = settings.is_cloud, "Jira configured");
            Some(Arc::new(JiraClient::new(&settings)?))
        }
        None => None,
    };
    let confluence: Option<Arc<dyn ConfluenceApi>> = match config.confluence_settings() {
        Some(settings) => {
            tracing::info!(url = %settings.url, cloud = settings.is_cloud, "Confluence configured");
            Some(Arc::new(ConfluenceClient::new(&settings)?))
        }
        None => None,
    };
    if jira.is_none() && confluence.is_none() {
        tracing::warn!("neither Confluence nor Jira is configured; no tools will be listed");
    }

    let dispatcher = Dispatcher::new(jira, confluence, config.read_only());
    tracing::info!(read_only = dispatcher.read_only(), "starting MCP server on stdio");

    let server = AtlassianServer::new(Arc::new(dispatcher))
        .serve(stdio())
        .await?;
    server.waiting().await?;
    Ok(())
}
