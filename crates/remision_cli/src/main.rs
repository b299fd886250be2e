//! Remision CLI
//!
//! Command-line tool for a remision ledger kept in a directory of JSON
//! documents or in a SQLite database.
//!
//! # Commands
//!
//! - `init` - Create an empty ledger
//! - `next` - Show the last issued and the next number
//! - `issue` - Issue a new document
//! - `list` - List documents
//! - `delete` / `restore` - Toggle the soft-delete flag
//! - `customers` - List known customers
//! - `report` - Sales summary for a period
//! - `reconcile` - Check the counter against the stored documents

mod commands;

use clap::{Parser, Subcommand};
use commands::{Layout, LedgerTarget, OutputFormat};
use remision_core::{LineItem, SequenceNumber};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Remision ledger tools.
#[derive(Parser)]
#[command(name = "remision")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the ledger documents
    #[arg(global = true, short, long, conflicts_with = "sqlite")]
    path: Option<PathBuf>,

    /// SQLite database holding the ledger
    #[arg(global = true, long)]
    sqlite: Option<PathBuf>,

    /// Document layout inside --path
    #[arg(global = true, long, value_enum, default_value = "split")]
    layout: Layout,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty ledger
    Init,

    /// Show the last issued and the next number
    Next {
        /// Output format (text, json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Issue a new document
    Issue {
        /// Customer name
        #[arg(short, long)]
        customer: Option<String>,

        /// Customer city
        #[arg(long, default_value = "")]
        city: String,

        /// Issue date (YYYY-MM-DD); defaults to today
        #[arg(short, long)]
        date: Option<chrono::NaiveDate>,

        /// Line item as QTY:DESCRIPTION:UNIT_PRICE (repeatable)
        #[arg(short, long = "item", value_parser = commands::issue::parse_item)]
        items: Vec<LineItem>,

        /// Tax rate, e.g. 0.16
        #[arg(long)]
        tax_rate: Option<f64>,

        /// Absolute discount
        #[arg(long, default_value = "0")]
        discount: f64,

        /// Delivery e-mail
        #[arg(long)]
        email: Option<String>,

        /// Read the draft as JSON from this file instead ("-" for stdin)
        #[arg(long, conflicts_with_all = ["customer", "items"])]
        json: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List documents, newest first
    List {
        /// Include deleted documents
        #[arg(short, long)]
        all: bool,

        /// Oldest first
        #[arg(long)]
        asc: bool,

        /// Only customers whose name contains this text
        #[arg(short, long)]
        customer: Option<String>,

        /// First date to include
        #[arg(long, requires = "to")]
        from: Option<chrono::NaiveDate>,

        /// Last date to include
        #[arg(long, requires = "from")]
        to: Option<chrono::NaiveDate>,

        /// Output format (text, json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Mark a document as deleted
    Delete {
        /// Document number
        number: SequenceNumber,
    },

    /// Clear the deleted mark of a document
    Restore {
        /// Document number
        number: SequenceNumber,
    },

    /// List known customers
    Customers {
        /// Output format (text, json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Sales summary for a period
    Report {
        /// Period: this-month, last-month or range (with --from/--to)
        #[arg(long, value_enum, default_value = "this-month")]
        period: commands::report::Period,

        /// First date of a custom range
        #[arg(long)]
        from: Option<chrono::NaiveDate>,

        /// Last date of a custom range
        #[arg(long)]
        to: Option<chrono::NaiveDate>,

        /// Output format (text, json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Check the counter against the stored documents
    Reconcile,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let target = LedgerTarget {
        path: cli.path,
        sqlite: cli.sqlite,
        layout: cli.layout,
    };

    match cli.command {
        Commands::Init => commands::init::run(&target)?,
        Commands::Next { format } => commands::next::run(&target, format)?,
        Commands::Issue {
            customer,
            city,
            date,
            items,
            tax_rate,
            discount,
            email,
            json,
            format,
        } => {
            let draft = match json {
                Some(path) => commands::issue::read_draft(&path)?,
                None => commands::issue::build_draft(commands::issue::DraftArgs {
                    customer: customer.ok_or("--customer is required unless --json is given")?,
                    city,
                    date,
                    items,
                    tax_rate,
                    discount,
                    email,
                }),
            };
            commands::issue::run(&target, &draft, format)?;
        }
        Commands::List {
            all,
            asc,
            customer,
            from,
            to,
            format,
        } => {
            let filter = commands::list::filter(all, asc, customer, from.zip(to));
            commands::list::run(&target, &filter, format)?;
        }
        Commands::Delete { number } => commands::update::run(&target, number, true)?,
        Commands::Restore { number } => commands::update::run(&target, number, false)?,
        Commands::Customers { format } => commands::customers::run(&target, format)?,
        Commands::Report {
            period,
            from,
            to,
            format,
        } => commands::report::run(&target, period, from.zip(to), format)?,
        Commands::Reconcile => commands::reconcile::run(&target)?,
        Commands::Version => {
            println!("Remision CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
