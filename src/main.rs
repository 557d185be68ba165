//! Brokerage ledger service
//!
//! Keeps user cash balances, stock positions and the transaction log
//! consistent across buy, sell, deposit and withdraw operations.

mod api;
mod config;
mod db;
mod error;
mod ledger;
mod models;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::ServerConfig;
use crate::db::Database;
use crate::ledger::Ledger;
use crate::models::{NewUser, TransactionKind};

/// Brokerage ledger CLI.
#[derive(Parser)]
#[command(name = "ledgerd")]
#[command(about = "Cash, positions and transaction ledger for a brokerage", long_about = None)]
struct Cli {
    /// Database URL
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:./ledger.db?mode=rwc")]
    database: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "LEDGER_BIND", default_value = "127.0.0.1:8000")]
        bind: String,

        /// Maximum pooled database connections
        #[arg(long, env = "DB_MAX_CONNECTIONS", default_value = "5")]
        max_connections: u32,

        /// Comma-separated allowed CORS origins
        #[arg(long, env = "CORS_ORIGINS", default_value = "*")]
        cors_origins: String,
    },

    /// Register a user
    AddUser {
        /// Login e-mail
        email: String,

        /// Opaque credential stored as given
        #[arg(long)]
        credential: String,

        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// Opening cash balance
        #[arg(long, default_value = "0")]
        balance: Decimal,
    },

    /// List a new instrument
    AddInstrument {
        /// Instrument name or ticker
        name: String,

        /// Current price per share
        #[arg(long)]
        price: Decimal,

        /// Day change in percent
        #[arg(long, default_value = "0")]
        change: Decimal,
    },

    /// Record a new price for an instrument
    SetPrice {
        instrument_id: i64,

        /// Price per share
        #[arg(long)]
        price: Decimal,

        /// Day change in percent
        #[arg(long, default_value = "0")]
        change: Decimal,
    },

    /// Add a preset deposit or withdrawal amount
    AddAmount {
        /// DEPOSIT or WITHDRAW
        kind: TransactionKind,

        /// Amount in cash units
        amount: Decimal,

        /// Label shown to users
        #[arg(long)]
        label: Option<String>,
    },

    /// List instruments and amount presets
    Catalog,

    /// Show a user's portfolio
    Portfolio { user_id: i64 },

    /// Show a user's transaction history, newest first
    History {
        user_id: i64,

        /// Maximum number of entries
        #[arg(short = 'n', long, default_value = "20")]
        limit: i64,
    },

    /// Check that transaction logs chain and match balances
    Reconcile {
        /// Only check this user
        #[arg(long)]
        user: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Serve {
            bind,
            max_connections,
            cors_origins,
        } => {
            let config = ServerConfig {
                bind,
                max_connections,
                cors_origins: ServerConfig::parse_origins(&cors_origins),
            };
            info!(
                bind = %config.bind,
                max_connections = config.max_connections,
                origins = ?config.cors_origins,
                "Starting ledger service"
            );

            let db = Database::connect(&cli.database, config.max_connections).await?;
            api::serve(Ledger::new(db), config).await?;
        }

        Commands::AddUser {
            email,
            credential,
            name,
            balance,
        } => {
            let db = Database::new(&cli.database).await?;
            let user = db
                .create_user(&NewUser {
                    email,
                    credential,
                    name,
                    opening_balance: balance,
                })
                .await?;
            info!(user_id = user.id, "User created");
            println!("Created user {} <{}> with balance ${}", user.id, user.email, user.balance);
        }

        Commands::AddInstrument {
            name,
            price,
            change,
        } => {
            let db = Database::new(&cli.database).await?;
            let instrument = db.create_instrument(&name, price, change).await?;
            println!("Listed {} as #{} at ${}", instrument.name, instrument.id, instrument.price);
        }

        Commands::SetPrice {
            instrument_id,
            price,
            change,
        } => {
            let db = Database::new(&cli.database).await?;
            let instrument = db.set_instrument_price(instrument_id, price, change).await?;
            println!(
                "{} now ${} ({}%)",
                instrument.name, instrument.price, instrument.percent_change
            );
        }

        Commands::AddAmount {
            kind,
            amount,
            label,
        } => {
            let db = Database::new(&cli.database).await?;
            let config = db.create_amount_config(amount, kind, label.as_deref()).await?;
            println!("Added {} preset #{} for ${}", config.kind, config.id, config.amount);
        }

        Commands::Catalog => {
            let db = Database::new(&cli.database).await?;

            println!("\n{:<6} {:<20} {:>12} {:>9}", "ID", "INSTRUMENT", "PRICE", "CHANGE");
            println!("{}", "-".repeat(50));
            for instrument in db.list_instruments().await? {
                println!(
                    "{:<6} {:<20} {:>12} {:>8}%",
                    instrument.id,
                    truncate(&instrument.name, 20),
                    instrument.price,
                    instrument.percent_change
                );
            }

            println!("\n{:<6} {:<10} {:>12}  {}", "ID", "KIND", "AMOUNT", "LABEL");
            println!("{}", "-".repeat(50));
            for config in db.list_amount_configs(None).await? {
                println!(
                    "{:<6} {:<10} {:>12}  {}",
                    config.id,
                    config.kind,
                    config.amount,
                    config.label.unwrap_or_default()
                );
            }
        }

        Commands::Portfolio { user_id } => {
            let db = Database::new(&cli.database).await?;
            let portfolio = db.get_portfolio(user_id).await?;

            println!(
                "\n{:<20} {:>8} {:>12} {:>12} {:>12} {:>12}",
                "INSTRUMENT", "QTY", "AVG COST", "PRICE", "VALUE", "P&L"
            );
            println!("{}", "-".repeat(81));
            for entry in &portfolio.positions {
                println!(
                    "{:<20} {:>8} {:>12} {:>12} {:>12} {:>12}",
                    truncate(&entry.instrument.name, 20),
                    entry.position.quantity,
                    entry.position.average_cost,
                    entry.instrument.price,
                    entry.market_value,
                    entry.unrealized_pnl
                );
            }

            println!("\nCash:          ${}", portfolio.cash);
            println!("Market value:  ${}", portfolio.market_value);
            println!("Cost basis:    ${}", portfolio.cost_basis);
            println!("Unrealized:    ${}", portfolio.unrealized_pnl);
        }

        Commands::History { user_id, limit } => {
            let db = Database::new(&cli.database).await?;
            let transactions = db.list_transactions(user_id, limit).await?;

            if transactions.is_empty() {
                println!("No transactions for user {}.", user_id);
                return Ok(());
            }

            println!(
                "\n{:<8} {:<20} {:<9} {:>12} {:>12} {:>12}  {}",
                "ID", "WHEN", "KIND", "AMOUNT", "BEFORE", "AFTER", "DESCRIPTION"
            );
            println!("{}", "-".repeat(100));
            for t in transactions {
                println!(
                    "{:<8} {:<20} {:<9} {:>12} {:>12} {:>12}  {}",
                    t.id,
                    t.created_at.format("%Y-%m-%d %H:%M:%S"),
                    t.kind,
                    t.amount,
                    t.balance_before,
                    t.balance_after,
                    t.description
                );
            }
        }

        Commands::Reconcile { user } => {
            let db = Database::new(&cli.database).await?;
            let user_ids = match user {
                Some(id) => vec![id],
                None => db.list_user_ids().await?,
            };

            let ledger = Ledger::new(db);
            let mut mismatches = 0;
            for user_id in user_ids {
                let reconciliation = ledger.reconcile(user_id).await?;
                if !reconciliation.is_consistent() {
                    mismatches += 1;
                }
                println!("{}", reconciliation);
            }

            if mismatches > 0 {
                anyhow::bail!("{} user(s) failed reconciliation", mismatches);
            }
        }
    }

    Ok(())
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
