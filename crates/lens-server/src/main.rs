//! `loglens` - log ingestion, search and pattern mining service.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use lens_server::{LogServer, ServerConfig, ServerError};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "loglens")]
#[command(version, about = "Log ingestion, search and pattern mining service", long_about = None)]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the service
    Serve {
        /// Path to a TOML config file
        #[arg(short, long, env = "LOGLENS_CONFIG")]
        config: Option<PathBuf>,

        /// Address to listen on, overriding the config file
        #[arg(short, long, env = "LOGLENS_BIND")]
        bind: Option<SocketAddr>,
    },

    /// Validate a config file and print the effective configuration
    CheckConfig {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ServerConfig> {
    Ok(match path {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Serve { config, bind } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(addr) = bind {
                config = config.with_bind_addr(addr);
            }
            config.validate()?;

            info!(
                addr = %config.bind_addr,
                max_connections = config.max_connections,
                max_entries = config.max_entries,
                "Starting LogLens"
            );

            let addr = config.bind_addr;
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| ServerError::BindFailed(addr, e))?;
            let server = LogServer::new(config);
            server
                .serve_listener(listener, async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %e, "Failed to listen for shutdown signal");
                        std::future::pending::<()>().await;
                    }
                })
                .await?;
        }

        Commands::CheckConfig { config } => {
            let config = ServerConfig::from_file(&config)?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
