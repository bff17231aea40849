use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::error;

use photo_orders::models::row::LEDGER_DATETIME_FORMAT;
use photo_orders::services::{FileAgeCleaner, OrderFilter, PaymentUpdate};
use photo_orders::{ledger_service, AppConfig, ServiceError};

/// Staff-side admin tool over the order ledger.
#[derive(Parser)]
#[command(name = "photo-orders", version, about)]
struct Cli {
    /// Orders directory overriding the configured one.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List orders under a named status filter.
    List {
        #[arg(long, default_value = "all")]
        filter: String,
    },
    /// Summary statistics for a named status filter.
    Stats {
        #[arg(long, default_value = "all")]
        filter: String,
    },
    /// Record a payment and advance the order to `paid`.
    Pay {
        reference: String,
        #[arg(long, default_value = "card")]
        mode: String,
        /// Desired deposit date (check payments only).
        #[arg(long)]
        desired_date: Option<String>,
        /// Deposit date (check payments only).
        #[arg(long)]
        deposit_date: Option<String>,
    },
    /// Mark an order as retrieved, recording the retrieval date.
    Retrieve {
        reference: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Set the expected retrieval date of an order.
    Expect { reference: String, date: String },
    /// Mark references as exported, continuing past failures.
    MarkExported { references: Vec<String> },
    /// Append an order to the paid-orders export file.
    ExportReglees { reference: String },
    /// Append an order's line items to the preparation export file.
    ExportPreparer { reference: String },
    /// Show the customer contact of an order.
    Contact { reference: String },
    /// Move orders created before the cutoff date into an archive file.
    ArchiveOld {
        /// Cutoff day, `YYYY-MM-DD`.
        cutoff: String,
    },
    /// Back up then remove a single order from the ledger.
    ArchiveOrder { reference: String },
    /// Delete abandoned temp carts.
    CleanupTemp {
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.data_dir {
        Some(ref dir) => AppConfig::with_orders_dir(dir.clone()),
        None => match AppConfig::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("configuration error: {e}");
                return ExitCode::FAILURE;
            }
        },
    };
    photo_orders::logging::init_tracing(&config.log_level);

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: AppConfig) -> Result<(), ServiceError> {
    let ledger = ledger_service(config);

    match cli.command {
        Command::List { filter } => {
            let view = ledger.load_orders_data(OrderFilter::parse(&filter))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&view.orders)?);
            } else {
                for order in &view.orders {
                    let flag = if order.is_overdue {
                        "!!"
                    } else if order.is_urgent {
                        " !"
                    } else {
                        "  "
                    };
                    println!(
                        "{flag} {}  {} {}  {:>3} photos  {:>2} USB  {:>8}  {}  {}",
                        order.reference,
                        order.last_name,
                        order.first_name,
                        order.photos_count,
                        order.usb_keys_count,
                        order.total_amount,
                        order.command_status,
                        order.expected_retrieval_date,
                    );
                }
                println!("{} order(s)", view.orders.len());
            }
        }
        Command::Stats { filter } => {
            let view = ledger.load_orders_data(OrderFilter::parse(&filter))?;
            let stats = ledger.calculate_stats(&view.orders);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("orders: {}", stats.total_orders);
                for (status, count) in &stats.status_counts {
                    println!("  status {status}: {count}");
                }
                for (mode, count) in &stats.payment_counts {
                    println!("  payment {mode}: {count}");
                }
                println!("exported: {} / not exported: {}", stats.exported_count, stats.not_exported_count);
                println!("paid today: {}  retrieved today: {}", stats.paid_today, stats.retrieved_today);
                println!(
                    "total: {} ({} photos, {} USB keys)",
                    stats.total_amount, stats.total_photos, stats.total_usb_keys
                );
            }
        }
        Command::Pay {
            reference,
            mode,
            desired_date,
            deposit_date,
        } => {
            let payment_mode = mode
                .parse()
                .map_err(|_| ServiceError::InvalidInput(format!("unknown payment mode {mode:?}")))?;
            let updated = ledger.orders().update_payment_status(
                &reference,
                PaymentUpdate {
                    payment_mode,
                    desired_payment_date: desired_date,
                    deposit_date,
                },
            )?;
            println!("{reference}: {updated} line(s) marked paid");
        }
        Command::Retrieve { reference, date } => {
            let date =
                date.unwrap_or_else(|| Local::now().format(LEDGER_DATETIME_FORMAT).to_string());
            let updated = ledger.mark_order_as_retrieved(&reference, &date)?;
            println!("{reference}: {updated} line(s) marked retrieved");
        }
        Command::Expect { reference, date } => {
            ledger
                .orders()
                .update_expected_retrieval_date(&reference, &date)?;
            println!("{reference}: expected retrieval date set to {date}");
        }
        Command::MarkExported { references } => {
            let outcome = ledger.mark_multiple_as_exported(&references);
            println!(
                "exported: {} ok, {} failed",
                outcome.success_count, outcome.error_count
            );
            for e in &outcome.errors {
                eprintln!("  {e}");
            }
            if !outcome.is_success() {
                return Err(ServiceError::InvalidInput(
                    "some references could not be exported".to_string(),
                ));
            }
        }
        Command::ExportReglees { reference } => {
            let path = ledger.orders().export_to_reglees(&reference)?;
            println!("{reference} appended to {}", path.display());
        }
        Command::ExportPreparer { reference } => {
            let path = ledger.orders().export_to_preparer(&reference)?;
            println!("{reference} appended to {}", path.display());
        }
        Command::Contact { reference } => {
            let contact = ledger.get_order_contact(&reference)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&contact)?);
            } else {
                println!(
                    "{} {} <{}> {}",
                    contact.last_name, contact.first_name, contact.email, contact.phone
                );
            }
        }
        Command::ArchiveOld { cutoff } => {
            let day = NaiveDate::parse_from_str(&cutoff, "%Y-%m-%d").map_err(|_| {
                ServiceError::InvalidInput(format!("invalid cutoff date {cutoff:?}, expected YYYY-MM-DD"))
            })?;
            let cutoff = day.and_hms_opt(0, 0, 0).expect("midnight is valid");
            let outcome = ledger.archive_old_orders(cutoff)?;
            match outcome.archive_path {
                Some(path) => println!(
                    "archived {} row(s) to {}, {} kept",
                    outcome.archived_count,
                    path.display(),
                    outcome.kept_count
                ),
                None => println!("nothing to archive, {} row(s) kept", outcome.kept_count),
            }
        }
        Command::ArchiveOrder { reference } => {
            let removed = ledger.orders().archive(&reference)?;
            println!("{reference}: {removed} row(s) archived and removed");
        }
        Command::CleanupTemp { force } => {
            let deleted = ledger.cleanup_temp_orders(&FileAgeCleaner, force)?;
            println!("{deleted} temp cart(s) deleted");
        }
    }
    Ok(())
}
