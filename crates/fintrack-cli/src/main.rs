//! fintrack - command line access to the personal finance dashboard.
//!
//! Logs in against the identity provider, keeps a valid session token, and
//! talks to the transaction backend with it.

mod app;
mod format;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fintrack_core::models::TransactionRow;
use fintrack_core::Config;

use app::App;

/// Log file name inside the cache directory
const LOG_FILE: &str = "fintrack.log";

/// Transactions shown on the dashboard
const DASHBOARD_RECENT: usize = 10;

#[derive(Parser)]
#[command(name = "fintrack", version, about = "Personal finance dashboard client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in to the identity provider
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// End the session and forget stored credentials
    Logout,
    /// Show the logged-in account
    Whoami,
    /// Print a currently-valid bearer token
    Token,
    /// Upload statement rows from a JSON array of objects
    Upload { file: PathBuf },
    /// List stored transactions
    Transactions {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show this month's balance, expenses and savings
    Summary,
    /// Show the landing page: greeting, summary and recent transactions
    Dashboard,
}

/// Initialize the tracing subscriber for logging.
/// Logs go to stderr and, when a log directory is available, to a daily file.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load()?;

    let log_dir = config.cache_dir().ok().filter(|dir| std::fs::create_dir_all(dir).is_ok());
    let _guard = init_tracing(log_dir.as_deref());
    info!("fintrack starting");

    let mut app = App::new(config)?;
    let result = run(&mut app, cli.command).await;

    if let Err(ref e) = result {
        warn!(error = %e, "Command failed");
    }
    result
}

async fn run(app: &mut App, command: Command) -> Result<()> {
    match command {
        Command::Login { email } => {
            let account = app.login(email).await?;
            println!("Logged in as {} <{}>", account.name, account.email);
        }
        Command::Logout => {
            app.logout().await?;
            println!("Logged out.");
        }
        Command::Whoami => {
            let account = app.account().await?;
            println!("{} <{}> ({})", account.name, account.email, account.id);
        }
        Command::Token => {
            let account = app.account().await?;
            let token = app.sessions().get_valid_token(&account.identity()).await?;
            if let Ok(expiry) = token.expires_at() {
                eprintln!("Valid until {}", expiry.to_rfc3339());
            }
            println!("{}", token);
        }
        Command::Upload { file } => upload(app, &file).await?,
        Command::Transactions { limit } => {
            let account = app.account().await?;
            let transactions = app.api().fetch_transactions(&account.identity()).await?;
            for tx in transactions.iter().take(limit) {
                println!("{}", format::transaction_line(tx, account.currency()));
            }
            if transactions.len() > limit {
                println!("... {} more", transactions.len() - limit);
            }
        }
        Command::Summary => {
            let account = app.account().await?;
            let summary = app.api().fetch_summary(&account.identity()).await?;
            for line in format::summary_lines(&summary, account.currency()) {
                println!("{}", line);
            }
        }
        Command::Dashboard => {
            let account = app.account().await?;
            let snapshot = app.api().load_dashboard(account).await?;
            let currency = snapshot.account.currency();

            println!("Welcome, {}", snapshot.account.first_name());
            println!("Access and manage your spending and savings\n");
            if snapshot.summary.is_none() {
                eprintln!("Summary unavailable, showing zeros");
            }
            for line in format::summary_lines(&snapshot.summary_or_default(), currency) {
                println!("{}", line);
            }
            println!();
            for tx in snapshot.transactions.iter().take(DASHBOARD_RECENT) {
                println!("{}", format::transaction_line(tx, currency));
            }
        }
    }
    Ok(())
}

async fn upload(app: &App, file: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let rows: Vec<TransactionRow> = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a JSON array of row objects", file.display()))?;
    if rows.is_empty() {
        return Err(anyhow::anyhow!("{} contains no rows", file.display()));
    }

    let account = app.account().await?;
    match app.api().upload_transactions(&account.identity(), &rows).await {
        Ok(_) => {
            println!("Data is sent! Your {} rows are being saved.", rows.len());
            Ok(())
        }
        Err(e) => {
            eprintln!("Uh oh! Something went wrong. There was a problem with your request.");
            Err(e.into())
        }
    }
}
