//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Centime - Automatic transaction categorization
#[derive(Parser)]
#[command(name = "centime")]
#[command(about = "Self-hosted personal finance categorizer", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "centime.db", global = true)]
    pub db: PathBuf,

    /// Engine config file (TOML); defaults apply if missing
    #[arg(long, default_value = "centime.toml", global = true)]
    pub config: PathBuf,

    /// User profile name
    #[arg(long, default_value = "default", global = true)]
    pub user: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and seed default categories and patterns
    Init,

    /// Import transactions from a CSV bank export
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Account name
        #[arg(short, long, default_value = "main")]
        account: String,

        /// Date column index (overrides header detection)
        #[arg(long)]
        date_col: Option<usize>,

        /// Description column index (overrides header detection)
        #[arg(long)]
        description_col: Option<usize>,

        /// Signed amount column index
        #[arg(long)]
        amount_col: Option<usize>,

        /// Debit column index (with --credit-col, instead of --amount-col)
        #[arg(long)]
        debit_col: Option<usize>,

        /// Credit column index
        #[arg(long)]
        credit_col: Option<usize>,

        /// Merchant column index
        #[arg(long)]
        merchant_col: Option<usize>,

        /// Bank category label column index
        #[arg(long)]
        category_col: Option<usize>,

        /// Skip auto-classification of imported transactions
        #[arg(long)]
        no_classify: bool,
    },

    /// Classify unassigned transactions
    Classify {
        /// Maximum transactions to process
        #[arg(short, long, default_value = "500")]
        limit: i64,
    },

    /// Learn personal patterns from manual assignments and prune bad ones
    Learn,

    /// List personal patterns
    Patterns {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show database and pattern store status
    Status,
}
