//! poli-display server
//!
//! Run with: poli-display [--memory] [BIND_ADDR]
//!
//! Configuration comes from the environment (`PORT`, `DB_HOST`, `DB_PORT`,
//! `DB_USERNAME`, `DB_PASSWORD`, `DB_DATABASE`, `CORS_ORIGIN`, ...). A bind
//! address given on the command line overrides `PORT`.
//!
//! `--memory` runs against an empty in-process store instead of MySQL, which
//! is enough to try the display boards and settings screens.

use std::net::SocketAddr;

use poli_display::server::ServerConfig;
use poli_display::store::{MemoryStore, MySqlStore, QueueStore};
use poli_display::tts::GoogleTranslateTts;
use poli_display::QueueServer;

fn print_usage() {
    eprintln!("Usage: poli-display [--memory] [BIND_ADDR]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --memory     Use an in-memory store instead of MySQL");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:$PORT or 0.0.0.0:8080)");
}

async fn serve<S: QueueStore>(config: ServerConfig, store: S) -> poli_display::Result<()> {
    let tts = GoogleTranslateTts::new(config.tts_language.clone()).timeout(config.tts_timeout);
    let server = QueueServer::new(config, store, tts);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::from_env()?;
    let in_memory = args.iter().any(|a| a == "--memory");

    if let Some(addr) = args.iter().find(|a| !a.starts_with("--")) {
        let normalized = addr.replace("localhost", "127.0.0.1");
        match normalized.parse::<SocketAddr>() {
            Ok(addr) => config = config.bind(addr),
            Err(_) => {
                eprintln!("Error: invalid bind address '{}'", addr);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    if in_memory {
        tracing::warn!("Using in-memory store; data is lost on exit");
        serve(config, MemoryStore::new()).await?;
    } else {
        let store = MySqlStore::connect(
            config.database.connect_options(),
            config.database.max_connections,
        )
        .await?;
        tracing::info!(
            host = %config.database.host,
            database = %config.database.database,
            "Connected to hospital database"
        );
        serve(config, store).await?;
    }

    tracing::info!("Server stopped");
    Ok(())
}
