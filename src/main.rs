use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ga4_dashboard_api::config::Config;
use ga4_dashboard_api::server::{build_app, AppState};

#[derive(Parser, Debug)]
#[command(name = "ga4-dashboard-api")]
#[command(author, version, about = "Google Analytics dashboard backend", long_about = None)]
struct Args {
    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Enable debug logging for this crate
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve GET /api/analytics (default)
    Serve {
        /// Listen port, overriding PORT
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print credential diagnostics
    Check {
        /// Also exchange a token and run a small report
        #[arg(long)]
        live: bool,
    },
}

fn load_env_file(path: Option<&PathBuf>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load env file {}", path.display()))?;
        }
        None => {
            // A missing .env is fine; the process environment may already be set.
            if let Err(e) = dotenvy::dotenv() {
                if !e.not_found() {
                    return Err(e).context("failed to parse .env");
                }
            }
        }
    }
    Ok(())
}

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let default_directive = if debug {
        "info,ga4_dashboard_api=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    load_env_file(args.env_file.as_ref())?;
    init_tracing(args.debug)?;

    let mut config = Config::from_env()?;

    match args.command.unwrap_or(Command::Serve { port: None }) {
        Command::Check { live } => {
            if !ga4_dashboard_api::check::run(&config, live).await {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        service_account = config.service_account_email.as_deref().unwrap_or("<unset>"),
        property_id = config.property_id.as_deref().unwrap_or("<unset>"),
        "loaded configuration"
    );
    if config.service_account_email.is_none()
        || config.private_key.is_none()
        || config.property_id.is_none()
    {
        tracing::warn!("service account configuration is incomplete; /api/analytics will fail");
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let app = build_app(AppState::new(config)?);

    tracing::info!("Backend listening on http://{}", addr);
    tracing::info!("Analytics endpoint: http://{}/api/analytics", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
