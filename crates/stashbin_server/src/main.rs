//! stashbin command-line entrypoint: HTTP server and maintenance commands.

use clap::{Parser, Subcommand};
use stashbin_core::models::paste::{ExpiryRequest, NewFile, NewPaste};
use stashbin_server::{config::Config, db::Database, reaper, serve_router, AppState};
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "stashbin", about = "Pastebin server", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML configuration file
    #[arg(long, env = "STASHBIN_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the website and API
    Http {
        /// Port to listen on, overriding the configuration
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create a paste from standard input
    Add {
        #[arg(long, default_value = "text")]
        lexer: String,
        #[arg(long, default_value = "1day")]
        expiry: String,
    },
    /// Delete a paste by slug
    Delete {
        #[arg(long)]
        paste: String,
    },
    /// Remove every expired paste once
    Reap,
}

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "stashbin=info,tower_http=warn",
        1 => "stashbin=debug,tower_http=info",
        _ => "stashbin=trace,tower_http=debug",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let database = Database::new(&config.db_path)?;
    let state = AppState::new(config, database);

    match cli.command {
        Commands::Http { port } => run_http(state, port).await,
        Commands::Add { lexer, expiry } => run_add(&state, lexer, expiry),
        Commands::Delete { paste } => {
            state.service.delete(&paste)?;
            println!("Deleted paste {}", paste);
            Ok(())
        }
        Commands::Reap => {
            let removed = state.service.reap()?;
            println!("Removed {} expired paste(s)", removed);
            Ok(())
        }
    }
}

async fn run_http(state: AppState, port: Option<u16>) -> anyhow::Result<()> {
    let bind_addr = stashbin_server::resolve_bind_address(&state.config, port);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let actual_addr = listener.local_addr().unwrap_or(bind_addr);
    tracing::info!("stashbin running at http://{}", actual_addr);

    let sweeper = reaper::spawn_reaper(state.service.reaper(), state.config.reap_interval());
    let serve_result = serve_router(listener, state, shutdown_signal()).await;
    sweeper.abort();

    serve_result?;
    Ok(())
}

fn run_add(state: &AppState, lexer: String, expiry: String) -> anyhow::Result<()> {
    let mut content = String::new();
    std::io::stdin().read_to_string(&mut content)?;

    let receipt = state.service.create(NewPaste {
        files: vec![NewFile {
            lexer: Some(lexer),
            content,
            filename: None,
        }],
        expiry: ExpiryRequest::Named(expiry),
        long: false,
        source: "cli".to_string(),
    })?;
    println!("Paste slug:    {}", receipt.slug);
    println!("Removal token: {}", receipt.removal);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
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
    tracing::info!("Shutdown signal received");
}
