use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use redcell::application::{App, Stores};
use redcell::config::CheckoutConfig;
use redcell::domain::identity::Email;
use redcell::domain::request::DonationStatus;
use redcell::domain::user::{Role, UserStatus};
use redcell::infrastructure::gateway::InMemoryGateway;
use redcell::infrastructure::identity::OperatorIdentityProvider;
use redcell::interfaces::csv::ledger_writer::LedgerWriter;
use redcell::interfaces::csv::request_writer::RequestWriter;
use redcell::interfaces::csv::user_reader::UserReader;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "REDCELL_DB_PATH", global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register accounts from a CSV file (email,name,phone,blood_group,district,upazila)
    ImportUsers { input: PathBuf },
    /// Promote a registered user to admin; only allowed while no admin exists
    BootstrapAdmin { email: String },
    /// Change a user's role
    SetRole {
        /// Email of the acting admin
        #[arg(long = "as")]
        actor: String,
        email: String,
        role: Role,
    },
    /// Block or unblock a user
    SetStatus {
        /// Email of the acting admin
        #[arg(long = "as")]
        actor: String,
        email: String,
        status: UserStatus,
    },
    /// Print dashboard totals as JSON
    Stats {
        #[arg(long = "as")]
        actor: String,
    },
    /// Write the settlement ledger as CSV
    ExportLedger {
        #[arg(long = "as")]
        actor: String,
    },
    /// Write donation requests as CSV, newest first
    ExportRequests {
        #[arg(long = "as")]
        actor: String,
        #[arg(long)]
        status: Option<DonationStatus>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .init();

    let cli = Cli::parse();
    let config = CheckoutConfig::from_env().into_diagnostic()?;
    let stores = open_stores(cli.db_path)?;

    // Operator commands run against a local gateway; no checkout is opened here.
    let app = App::new(
        stores,
        Arc::new(OperatorIdentityProvider),
        Arc::new(InMemoryGateway::new()),
        config,
    );

    let outcome = run(&app, cli.command).await;
    app.shutdown().await.into_diagnostic()?;
    outcome
}

async fn run(app: &App, command: Command) -> Result<()> {
    match command {
        Command::ImportUsers { input } => {
            let file = File::open(input).into_diagnostic()?;
            let (mut created, mut existing) = (0, 0);
            for row in UserReader::new(file).users() {
                let (email, profile) = match row {
                    Ok(row) => row,
                    Err(e) => {
                        warn!(error = %e, "Error reading user");
                        continue;
                    }
                };
                let identity = app.authenticate(email.as_str()).await.into_diagnostic()?;
                match app.users.register(&identity, profile).await {
                    Ok(registration) if registration.is_created() => created += 1,
                    Ok(_) => existing += 1,
                    Err(e) => warn!(email = %email, error = %e, "Error registering user"),
                }
            }
            println!(
                "imported {} users ({} already registered)",
                created, existing
            );
        }
        Command::BootstrapAdmin { email } => {
            let email = Email::parse(&email).into_diagnostic()?;
            let admin = app.users.bootstrap_admin(&email).await.into_diagnostic()?;
            println!("{} is now {}", admin.email, admin.role);
        }
        Command::SetRole { actor, email, role } => {
            let identity = app.authenticate(&actor).await.into_diagnostic()?;
            let email = Email::parse(&email).into_diagnostic()?;
            let user = app
                .users
                .set_role(&identity, &email, role)
                .await
                .into_diagnostic()?;
            println!("{} is now {}", user.email, user.role);
        }
        Command::SetStatus {
            actor,
            email,
            status,
        } => {
            let identity = app.authenticate(&actor).await.into_diagnostic()?;
            let email = Email::parse(&email).into_diagnostic()?;
            let user = app
                .users
                .set_status(&identity, &email, status)
                .await
                .into_diagnostic()?;
            println!("{} is now {}", user.email, user.status);
        }
        Command::Stats { actor } => {
            let identity = app.authenticate(&actor).await.into_diagnostic()?;
            let stats = app.stats.snapshot(&identity).await.into_diagnostic()?;
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).into_diagnostic()?
            );
        }
        Command::ExportLedger { actor } => {
            let identity = app.authenticate(&actor).await.into_diagnostic()?;
            let entries = app
                .payments
                .list_payments(&identity)
                .await
                .into_diagnostic()?;
            LedgerWriter::new(io::stdout().lock())
                .write_entries(entries)
                .into_diagnostic()?;
        }
        Command::ExportRequests { actor, status } => {
            let identity = app.authenticate(&actor).await.into_diagnostic()?;
            let requests = app
                .requests
                .list_all(&identity, status)
                .await
                .into_diagnostic()?;
            RequestWriter::new(io::stdout().lock())
                .write_requests(requests)
                .into_diagnostic()?;
        }
    }
    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    use redcell::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            // Use persistent storage (RocksDB)
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok(Stores {
                users: Arc::new(store.clone()),
                requests: Arc::new(store.clone()),
                ledger: Arc::new(store),
            })
        }
        None => Ok(Stores::in_memory()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    if db_path.is_some() {
        warn!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Stores::in_memory())
}
