//! Centime CLI - Automatic transaction categorization
//!
//! Usage:
//!   centime init                 Initialize database and seed defaults
//!   centime import --file CSV    Import transactions (auto-detects layout)
//!   centime classify             Categorize unassigned transactions
//!   centime learn                Learn patterns from manual assignments
//!   centime status               Show database status

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, &cli.config),
        Commands::Import {
            file,
            account,
            date_col,
            description_col,
            amount_col,
            debit_col,
            credit_col,
            merchant_col,
            category_col,
            no_classify,
        } => commands::cmd_import(
            &cli.db,
            &cli.config,
            &cli.user,
            &file,
            &account,
            commands::ColumnOverrides {
                date: date_col,
                description: description_col,
                amount: amount_col,
                debit: debit_col,
                credit: credit_col,
                merchant: merchant_col,
                category: category_col,
            },
            no_classify,
        ),
        Commands::Classify { limit } => {
            commands::cmd_classify(&cli.db, &cli.config, &cli.user, limit)
        }
        Commands::Learn => commands::cmd_learn(&cli.db, &cli.config, &cli.user),
        Commands::Patterns { json } => commands::cmd_patterns(&cli.db, &cli.user, json),
        Commands::Status => commands::cmd_status(&cli.db, &cli.user),
    }
}
