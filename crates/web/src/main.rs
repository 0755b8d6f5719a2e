//! Courseware editor service

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use courseware_common::Database;
use courseware_web::{WebConfig, WebServer};

#[derive(Parser)]
#[command(name = "courseware-web")]
#[command(about = "Courseware REST editor service")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// SQLite database path (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Enable the development login endpoint
    #[arg(long)]
    dev_login: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(courseware_common::default_config_path);
    let mut config = WebConfig::load(&config_path)?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if let Some(db) = cli.db {
        config.store.db_path = Some(db);
    }
    if cli.dev_login {
        config.auth.dev_login = true;
    }

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };
    if config.logging.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    info!("Courseware editor service v{}", courseware_common::VERSION);

    let db_path = config.db_path();
    info!("Database: {}", db_path.display());
    let db = Database::open(&db_path)?;

    let addr: SocketAddr = config.server.listen.parse()?;
    WebServer::new(config, db)?.serve(addr).await
}
