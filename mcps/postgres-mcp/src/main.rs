//! PostgreSQL MCP - Database adapter server
//!
//! Serves PostgreSQL tools and schema resources over stdio. Credentials are
//! fixed at startup (environment or flags) unless `--per-call` is given, in
//! which case every tool call must carry its own.

use clap::Parser;
use rmcp::ServiceExt;

use postgres_mcp::{ConnectionConfig, PostgresMcpServer};

#[derive(Parser)]
#[command(name = "postgres-mcp", version, about = "PostgreSQL MCP server")]
struct Cli {
    /// Take connection credentials from each tool call instead of the environment
    #[arg(long, conflicts_with_all = ["url", "username", "password"])]
    per_call: bool,

    /// PostgreSQL connection URL
    #[arg(long, env = "POSTGRES_URL")]
    url: Option<String>,

    /// Database username
    #[arg(long, env = "POSTGRES_USERNAME")]
    username: Option<String>,

    /// Database password
    #[arg(long, env = "POSTGRES_PASSWORD")]
    password: Option<String>,

    /// Connection pool size (fixed-credential mode only)
    #[arg(long, default_value_t = 5)]
    pool_size: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    mcp_common::init_tracing("postgres_mcp")?;
    tracing::info!("Starting postgres-mcp MCP Server");

    let server = if cli.per_call {
        tracing::info!("per-call credential mode: each tool call must supply url/username/password");
        PostgresMcpServer::per_call()
    } else {
        let config = ConnectionConfig::new(
            cli.url.unwrap_or_default(),
            cli.username.unwrap_or_default(),
            cli.password.unwrap_or_default(),
        )?;
        tracing::info!(pool_size = cli.pool_size, "fixed credential mode");
        PostgresMcpServer::fixed(config, cli.pool_size).await?
    };

    let service = server.serve(rmcp::transport::stdio()).await?;

    tracing::info!("Server running, waiting for requests...");

    // Close the transport cleanly on interrupt instead of dying mid-request
    let ct = service.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            ct.cancel();
        }
    });

    service.waiting().await?;

    tracing::info!("Server shutting down");
    Ok(())
}
