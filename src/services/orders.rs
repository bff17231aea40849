use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::row::{format_csv_decimal, parse_ledger_datetime, LEDGER_DATETIME_FORMAT};
use crate::models::{columns, CommandStatus, OrderRow, PaymentMode, EXPORTED_LITERAL, LEDGER_HEADER};
use crate::services::catalog::ActivityCatalog;
use crate::services::ledger::build_order;
use crate::table::{self, LedgerLock, TableOptions, WriteMode};

/// Prefix of every order reference; the digits after it embed the
/// creation timestamp (`CMD<YYYYMMDD><HHMMSS>` plus an entropy suffix).
pub const REFERENCE_PREFIX: &str = "CMD";

static REFERENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^CMD(\d{8})(\d{6})").expect("reference pattern is valid"));

/// Header of the paid-orders export sink (`commandes_reglees.csv`).
pub const REGLEES_HEADER: [&str; 12] = [
    "Ref",
    "Nom",
    "Prenom",
    "Email",
    "Tel",
    "Nb photos",
    "Nb USB",
    "Montant",
    "Reglement",
    "Date reglement",
    "Date encaissement souhaitee",
    "Date encaissement reelle",
];

/// Header of the preparation export sink (`commandes_a_preparer.csv`).
pub const PREPARER_HEADER: [&str; 10] = [
    "Ref",
    "Nom",
    "Prenom",
    "Email",
    "Tel",
    "Nom du dossier",
    "Nom de la photo",
    "Quantite",
    "Date de preparation",
    "Date de recuperation",
];

/// Generates a new order reference embedding the current timestamp plus
/// a two-digit random suffix. Uniqueness at scale is the responsibility
/// of the caller's generator; this format only guarantees the timestamp
/// stays parseable by [`creation_date_from_reference`].
pub fn generate_reference() -> String {
    let now = Local::now();
    let suffix: u8 = rand::thread_rng().gen_range(0..100);
    format!("{REFERENCE_PREFIX}{}{suffix:02}", now.format("%Y%m%d%H%M%S"))
}

/// Parses the timestamp embedded in a reference, if any.
pub fn creation_date_from_reference(reference: &str) -> Option<NaiveDateTime> {
    let caps = REFERENCE_PATTERN.captures(reference)?;
    let date = NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok()?;
    let time = NaiveTime::parse_from_str(&caps[2], "%H%M%S").ok()?;
    Some(NaiveDateTime::new(date, time))
}

/// Creation timestamp of a ledger row: the date column when parseable,
/// else the timestamp embedded in the reference, else "now".
pub fn creation_date_for(row: &OrderRow) -> NaiveDateTime {
    parse_ledger_datetime(&row.created_at)
        .or_else(|| creation_date_from_reference(&row.reference))
        .unwrap_or_else(|| Local::now().naive_local())
}

fn now_stamp() -> String {
    Local::now().format(LEDGER_DATETIME_FORMAT).to_string()
}

/// Payment details applied by [`OrderService::update_payment_status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub payment_mode: PaymentMode,
    /// Desired deposit date; only honored for check payments.
    #[serde(default)]
    pub desired_payment_date: Option<String>,
    /// Deposit (encashment) date; only honored for check payments.
    #[serde(default)]
    pub deposit_date: Option<String>,
}

/// Reference-scoped view over one order's ledger rows. Rebuilt from the
/// file on every load; never persisted directly.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRecord {
    /// Order-level fields, taken from the first row of the reference
    /// (identical across rows apart from the per-line columns).
    pub summary: OrderRow,
    /// All rows of the reference, one per photo line item.
    pub rows: Vec<OrderRow>,
}

/// Single-order view and mutation operations over the ledger file.
#[derive(Clone)]
pub struct OrderService {
    config: Arc<AppConfig>,
    catalog: Arc<dyn ActivityCatalog>,
    options: TableOptions,
}

impl OrderService {
    pub fn new(config: Arc<AppConfig>, catalog: Arc<dyn ActivityCatalog>) -> Self {
        Self {
            config,
            catalog,
            options: TableOptions::default(),
        }
    }

    fn ledger_path(&self) -> PathBuf {
        self.config.ledger_path()
    }

    /// Scans the ledger for the reference's rows and assembles the order
    /// record, padding short rows and applying the retrieval-date
    /// compatibility fallback.
    #[instrument(skip(self), fields(reference = %reference))]
    pub fn load(&self, reference: &str) -> Result<OrderRecord, ServiceError> {
        if reference.is_empty() {
            return Err(ServiceError::InvalidInput("empty order reference".to_string()));
        }
        let data = table::read_table(&self.ledger_path(), true, None, &self.options)?;

        let mut rows: Vec<OrderRow> = data
            .rows
            .iter()
            .filter(|row| row.fields.get(columns::REFERENCE).map(String::as_str) == Some(reference))
            .map(|row| OrderRow::from_fields(&row.fields))
            .collect();
        if rows.is_empty() {
            return Err(ServiceError::NotFound(format!("order {reference} not found")));
        }
        for row in &mut rows {
            row.apply_retrieval_compat();
        }

        let summary = rows[0].clone();
        Ok(OrderRecord { summary, rows })
    }

    fn warn_on_illegal_transition(&self, record: &OrderRecord, next: CommandStatus) {
        match record.summary.command_status.parse::<CommandStatus>() {
            Ok(current) if !current.can_transition_to(next) => {
                // Permissive on purpose: manual corrections of hand-edited
                // ledgers go through the same code path.
                warn!(
                    reference = %record.summary.reference,
                    from = %current,
                    to = %next,
                    "Status write outside the normal lifecycle"
                );
            }
            Err(_) if !record.summary.command_status.is_empty() => {
                warn!(
                    reference = %record.summary.reference,
                    status = %record.summary.command_status,
                    "Unknown status value in ledger"
                );
            }
            _ => {}
        }
    }

    /// Records a payment: payment mode, the payment timestamp, and the
    /// deposit dates, advancing the status to `paid`.
    ///
    /// Every mode except check settles instantly, so desired and deposit
    /// dates are forced to the payment timestamp; check payments honor
    /// the dates supplied by the caller.
    #[instrument(skip(self, update), fields(reference = %reference, payment_mode = %update.payment_mode))]
    pub fn update_payment_status(
        &self,
        reference: &str,
        update: PaymentUpdate,
    ) -> Result<usize, ServiceError> {
        let record = self.load(reference)?;
        self.warn_on_illegal_transition(&record, CommandStatus::Paid);

        let now = now_stamp();
        let (desired, deposit) = if update.payment_mode.settles_instantly() {
            (now.clone(), now.clone())
        } else {
            (
                update.desired_payment_date.unwrap_or_else(|| now.clone()),
                update.deposit_date.unwrap_or_default(),
            )
        };

        let updates = vec![
            (columns::PAYMENT_MODE, update.payment_mode.to_string()),
            (columns::DESIRED_PAYMENT_DATE, desired),
            (columns::ACTUAL_PAYMENT_DATE, now),
            (columns::DEPOSIT_DATE, deposit),
            (columns::COMMAND_STATUS, CommandStatus::Paid.to_string()),
        ];
        let updated = table::update_by_value(
            &self.ledger_path(),
            columns::REFERENCE,
            reference,
            &updates,
            &self.options,
        )?;
        info!(reference, updated, "Payment recorded");
        Ok(updated)
    }

    /// Sets the exported flag on every row of the reference.
    #[instrument(skip(self), fields(reference = %reference))]
    pub fn mark_as_exported(&self, reference: &str) -> Result<usize, ServiceError> {
        let record = self.load(reference)?;
        if matches!(
            record.summary.command_status.parse(),
            Ok(CommandStatus::Temp) | Ok(CommandStatus::Validated) | Ok(CommandStatus::Cancelled)
        ) {
            warn!(reference, status = %record.summary.command_status, "Exporting an order that was never paid");
        }

        let updated = table::update_by_value(
            &self.ledger_path(),
            columns::REFERENCE,
            reference,
            &[(columns::EXPORTED, EXPORTED_LITERAL.to_string())],
            &self.options,
        )?;
        info!(reference, updated, "Order marked as exported");
        Ok(updated)
    }

    /// Sets the command status; when the new status is `retrieved` and a
    /// date is supplied, the actual retrieval date is recorded with it.
    #[instrument(skip(self), fields(reference = %reference, status = %status))]
    pub fn update_retrieval_status(
        &self,
        reference: &str,
        status: CommandStatus,
        actual_date: Option<String>,
    ) -> Result<usize, ServiceError> {
        let record = self.load(reference)?;
        self.warn_on_illegal_transition(&record, status);

        let mut updates = vec![(columns::COMMAND_STATUS, status.to_string())];
        if status == CommandStatus::Retrieved {
            if let Some(date) = actual_date {
                updates.push((columns::ACTUAL_RETRIEVAL_DATE, date));
            }
        }
        let updated = table::update_by_value(
            &self.ledger_path(),
            columns::REFERENCE,
            reference,
            &updates,
            &self.options,
        )?;
        info!(reference, %status, updated, "Retrieval status updated");
        Ok(updated)
    }

    /// Sets the expected-retrieval column only.
    #[instrument(skip(self), fields(reference = %reference))]
    pub fn update_expected_retrieval_date(
        &self,
        reference: &str,
        date: &str,
    ) -> Result<usize, ServiceError> {
        table::update_by_value(
            &self.ledger_path(),
            columns::REFERENCE,
            reference,
            &[(columns::EXPECTED_RETRIEVAL_DATE, date.to_string())],
            &self.options,
        )
    }

    /// Appends the order's summary line to the paid-orders sink,
    /// creating the file with its header and BOM on first use.
    #[instrument(skip(self), fields(reference = %reference))]
    pub fn export_to_reglees(&self, reference: &str) -> Result<PathBuf, ServiceError> {
        let record = self.load_for_export(reference)?;
        let order = build_order(
            &record.rows,
            self.catalog.as_ref(),
            &self.config.usb_activity_key,
            &self.config.usb_marker,
        );

        let row = vec![
            order.reference.clone(),
            order.last_name.clone(),
            order.first_name.clone(),
            order.email.clone(),
            order.phone.clone(),
            order.photos_count.to_string(),
            order.usb_keys_count.to_string(),
            format_csv_decimal(order.total_amount),
            order.payment_mode.clone(),
            order.actual_payment_date.clone(),
            order.desired_payment_date.clone(),
            order.deposit_date.clone(),
        ];

        let path = self.config.reglees_path();
        let header: Vec<String> = REGLEES_HEADER.iter().map(|s| s.to_string()).collect();
        table::write_table(&path, Some(&header), &[row], WriteMode::Append, true, &self.options)?;
        info!(reference, file = %path.display(), "Exported to paid-orders sink");
        Ok(path)
    }

    /// Appends one preparation line per photo line item to the
    /// preparation sink, creating the file with its header and BOM on
    /// first use.
    #[instrument(skip(self), fields(reference = %reference))]
    pub fn export_to_preparer(&self, reference: &str) -> Result<PathBuf, ServiceError> {
        let record = self.load_for_export(reference)?;
        let today = now_stamp();

        let rows: Vec<Vec<String>> = record
            .rows
            .iter()
            .map(|row| {
                vec![
                    row.reference.clone(),
                    row.last_name.clone(),
                    row.first_name.clone(),
                    row.email.clone(),
                    row.phone.clone(),
                    row.activity_key.clone(),
                    row.photo_name.clone(),
                    row.quantity.clone(),
                    today.clone(),
                    row.expected_retrieval_date.clone(),
                ]
            })
            .collect();

        let path = self.config.preparer_path();
        let header: Vec<String> = PREPARER_HEADER.iter().map(|s| s.to_string()).collect();
        table::write_table(&path, Some(&header), &rows, WriteMode::Append, true, &self.options)?;
        info!(reference, lines = rows.len(), file = %path.display(), "Exported to preparation sink");
        Ok(path)
    }

    fn load_for_export(&self, reference: &str) -> Result<OrderRecord, ServiceError> {
        self.load(reference).map_err(|e| match e {
            ServiceError::NotFound(_) => {
                ServiceError::DataNotLoaded(format!("order {reference} is not loaded"))
            }
            other => other,
        })
    }

    /// Removes every row of the reference from the ledger, after a full
    /// backup. The live file is untouched when the backup cannot be
    /// created or the reference does not exist.
    #[instrument(skip(self), fields(reference = %reference))]
    pub fn archive(&self, reference: &str) -> Result<usize, ServiceError> {
        let ledger = self.ledger_path();
        let _lock = LedgerLock::acquire(&ledger)?;

        let data = table::read_table(&ledger, true, None, &self.options)?;
        let removed = data
            .rows
            .iter()
            .filter(|row| row.fields.get(columns::REFERENCE).map(String::as_str) == Some(reference))
            .count();
        if removed == 0 {
            return Err(ServiceError::NotFound(format!("order {reference} not found")));
        }

        table::create_backup(&ledger, &self.config.archive_dir)
            .map_err(|e| ServiceError::BackupFailed(e.to_string()))?;

        let kept: Vec<Vec<String>> = data
            .rows
            .iter()
            .filter(|row| row.fields.get(columns::REFERENCE).map(String::as_str) != Some(reference))
            .map(|row| row.fields.clone())
            .collect();
        let header: Vec<String> = data
            .header
            .unwrap_or_else(|| LEDGER_HEADER.iter().map(|s| s.to_string()).collect());

        table::write_table(&ledger, Some(&header), &kept, WriteMode::Overwrite, true, &self.options)?;
        info!(reference, removed, "Order archived out of the ledger");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_references_embed_a_parseable_timestamp() {
        let reference = generate_reference();
        assert!(reference.starts_with(REFERENCE_PREFIX));
        assert_eq!(reference.len(), 3 + 8 + 6 + 2);
        assert!(creation_date_from_reference(&reference).is_some());
    }

    #[test]
    fn creation_date_parses_the_embedded_timestamp() {
        let dt = creation_date_from_reference("CMD2025072516124301").unwrap();
        assert_eq!(dt.to_string(), "2025-07-25 16:12:43");
    }

    #[test]
    fn malformed_references_yield_none() {
        assert!(creation_date_from_reference("ORD-12345").is_none());
        assert!(creation_date_from_reference("CMD2025").is_none());
        assert!(creation_date_from_reference("").is_none());
    }

    #[test]
    fn row_creation_date_prefers_the_date_column() {
        let row = OrderRow {
            reference: "CMD2025072516124301".into(),
            created_at: "2025-01-01 08:00:00".into(),
            ..OrderRow::default()
        };
        assert_eq!(creation_date_for(&row).to_string(), "2025-01-01 08:00:00");

        let row = OrderRow {
            reference: "CMD2025072516124301".into(),
            created_at: "not a date".into(),
            ..OrderRow::default()
        };
        assert_eq!(creation_date_for(&row).to_string(), "2025-07-25 16:12:43");
    }
}
