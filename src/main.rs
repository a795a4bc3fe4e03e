use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mcp_chat::agent::{Orchestrator, TriggerDetector};
use mcp_chat::config::Config;
use mcp_chat::core::ConversationStore;
use mcp_chat::llm::ClaudeProvider;
use mcp_chat::mcp::{McpGateway, ToolGateway};
use mcp_chat::transport;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mcp-chat")]
#[command(author, version, about = "Chat server for an AI assistant with MCP tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP + WebSocket chat server
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Connect to the tool server and print its tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "mcp_chat=debug,tower_http=debug"
    } else {
        "mcp_chat=info,tower_http=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Err(e) = run_server(config).await {
                tracing::error!("Failed to start server: {:#}", e);
                return Err(e);
            }
        }
        Commands::Tools => {
            let gateway = McpGateway::new(config.mcp.clone());
            gateway.connect().await?;
            let tools = gateway.list_tools().await;
            gateway.disconnect().await;
            for tool in tools? {
                let canned = if tool.supports_canned_reply {
                    " [canned]"
                } else {
                    ""
                };
                println!("{}{}: {}", tool.name, canned, tool.description);
            }
        }
    }

    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    config.validate()?;

    let model = Arc::new(ClaudeProvider::from_config(&config.llm)?);
    let gateway = Arc::new(McpGateway::new(config.mcp.clone()));
    gateway.connect().await?;

    let orchestrator = Arc::new(
        Orchestrator::new(
            Arc::new(ConversationStore::new()),
            gateway.clone(),
            model,
            Arc::new(TriggerDetector::from_config(&config.agent.triggers)),
        )
        .with_direct_reply(config.agent.direct_reply),
    );

    let app = transport::router(orchestrator, &config.server.cors_origin)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let served = transport::serve(listener, app, shutdown_signal()).await;
    tracing::info!("Shutting down...");
    gateway.disconnect().await;
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
