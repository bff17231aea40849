use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::errors::{BulkOutcome, ServiceError};
use crate::models::{columns, CommandStatus, Order, OrderLineItem, OrderRow, LEDGER_HEADER};
use crate::services::catalog::{ActivityCatalog, TempOrderCleaner};
use crate::services::filters::OrderFilter;
use crate::services::orders::{creation_date_for, OrderService};
use crate::table::{self, bom, LedgerLock, TableOptions, TableRow, WriteMode};

/// Result of a bulk ledger load: reconstructed aggregates plus the raw
/// rows that matched the filter, in file order.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerView {
    pub orders: Vec<Order>,
    pub raw_data: Vec<TableRow>,
}

/// Single-pass tallies over an order list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerStats {
    pub total_orders: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub payment_counts: BTreeMap<String, usize>,
    pub exported_count: usize,
    pub not_exported_count: usize,
    pub paid_today: usize,
    pub retrieved_today: usize,
    pub total_amount: Decimal,
    pub total_photos: u64,
    pub total_usb_keys: u64,
}

/// Result of [`LedgerService::archive_old_orders`].
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveOutcome {
    pub archived_count: usize,
    pub kept_count: usize,
    /// `None` when no row qualified; the ledger is untouched then.
    pub archive_path: Option<PathBuf>,
}

/// Customer contact fields of one order.
#[derive(Debug, Clone, Serialize)]
pub struct ContactInfo {
    pub reference: String,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub phone: String,
}

/// Builds one order aggregate from the rows sharing a reference. The
/// first row seeds the customer/status/date fields; every row adds a
/// line item and accumulates the tallies. Line items of the recognized
/// USB activity whose photo name carries the USB marker count as USB
/// keys, not photos.
pub(crate) fn build_order(
    rows: &[OrderRow],
    catalog: &dyn ActivityCatalog,
    usb_activity_key: &str,
    usb_marker: &str,
) -> Order {
    let mut first = rows[0].clone();
    first.apply_retrieval_compat();
    let created_at = creation_date_for(&first);
    let mut order = Order::seed_from_row(&first, created_at);

    for row in rows {
        let quantity = row.parsed_quantity();
        let type_info = catalog.type_info(&row.activity_key);
        let subtotal = type_info.unit_price * Decimal::from(quantity);

        let is_usb_key = row.activity_key == usb_activity_key && row.photo_name.contains(usb_marker);
        if is_usb_key {
            order.usb_keys_count += quantity;
        } else {
            order.photos_count += quantity;
        }
        order.total_amount += subtotal;

        order.line_items.push(OrderLineItem {
            activity_key: row.activity_key.clone(),
            photo_name: row.photo_name.clone(),
            quantity,
            unit_price: type_info.unit_price,
            subtotal,
            pricing_label: type_info.display_name,
        });
    }
    order
}

/// Bulk reconstruction of order aggregates from the ledger, with derived
/// urgency ordering, summary statistics and the bulk staff operations.
#[derive(Clone)]
pub struct LedgerService {
    config: Arc<AppConfig>,
    catalog: Arc<dyn ActivityCatalog>,
    orders: OrderService,
    options: TableOptions,
}

impl LedgerService {
    pub fn new(config: Arc<AppConfig>, catalog: Arc<dyn ActivityCatalog>) -> Self {
        let orders = OrderService::new(config.clone(), catalog.clone());
        Self {
            config,
            catalog,
            orders,
            options: TableOptions::default(),
        }
    }

    /// The single-order service sharing this ledger's configuration.
    pub fn orders(&self) -> &OrderService {
        &self.orders
    }

    /// Loads the ledger under a named filter and reconstructs the
    /// matching order aggregates, sorted by urgency:
    /// overdue first, then urgent, then ascending expected retrieval
    /// date (orders without one last), then most recent creation first.
    #[instrument(skip(self), fields(filter = ?filter))]
    pub fn load_orders_data(&self, filter: OrderFilter) -> Result<LedgerView, ServiceError> {
        let data = table::read_table(
            &self.config.ledger_path(),
            true,
            Some(columns::COUNT),
            &self.options,
        )?;

        let mut raw_data: Vec<TableRow> = Vec::new();
        let mut groups: Vec<Vec<OrderRow>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for raw in &data.rows {
            let row = OrderRow::from_fields(&raw.fields);
            if !filter.matches(&row) {
                continue;
            }
            raw_data.push(raw.clone());
            match index.get(&row.reference) {
                Some(&slot) => groups[slot].push(row),
                None => {
                    index.insert(row.reference.clone(), groups.len());
                    groups.push(vec![row]);
                }
            }
        }

        let today = Local::now().date_naive();
        let mut orders: Vec<Order> = groups
            .iter()
            .map(|rows| {
                let mut order = build_order(
                    rows,
                    self.catalog.as_ref(),
                    &self.config.usb_activity_key,
                    &self.config.usb_marker,
                );
                order.compute_urgency(today);
                order
            })
            .collect();

        orders.sort_by_key(|o| {
            (
                !o.is_overdue,
                !o.is_urgent,
                o.expected_day_or_max(),
                Reverse(o.created_at),
            )
        });

        info!(matched_rows = raw_data.len(), orders = orders.len(), "Ledger loaded");
        Ok(LedgerView { orders, raw_data })
    }

    /// Single-pass tallies over an already-loaded order list.
    pub fn calculate_stats(&self, orders: &[Order]) -> LedgerStats {
        let today_prefix = Local::now().format("%Y-%m-%d").to_string();
        let mut stats = LedgerStats {
            total_orders: orders.len(),
            ..LedgerStats::default()
        };

        for order in orders {
            *stats
                .status_counts
                .entry(order.command_status.clone())
                .or_default() += 1;
            *stats
                .payment_counts
                .entry(order.payment_mode.clone())
                .or_default() += 1;
            if order.exported {
                stats.exported_count += 1;
            } else {
                stats.not_exported_count += 1;
            }
            if order.actual_payment_date.starts_with(&today_prefix) {
                stats.paid_today += 1;
            }
            if order.actual_retrieval_date.starts_with(&today_prefix) {
                stats.retrieved_today += 1;
            }
            stats.total_amount += order.total_amount;
            stats.total_photos += u64::from(order.photos_count);
            stats.total_usb_keys += u64::from(order.usb_keys_count);
        }
        stats
    }

    /// Marks every given reference as exported, continuing past
    /// individual failures and reporting per-item errors.
    #[instrument(skip(self, references), fields(count = references.len()))]
    pub fn mark_multiple_as_exported(&self, references: &[String]) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for reference in references {
            match self.orders.mark_as_exported(reference) {
                Ok(_) => outcome.record_success(),
                Err(e) => {
                    warn!(reference = %reference, error = %e, "Export marking failed");
                    outcome.record_failure(format!("{reference}: {e}"));
                }
            }
        }
        info!(
            success = outcome.success_count,
            failed = outcome.error_count,
            "Bulk export marking finished"
        );
        outcome
    }

    /// Moves every row created strictly before `cutoff` into a new
    /// timestamped archive file and rewrites the ledger with the rest.
    /// When nothing qualifies, the ledger is left untouched and no
    /// archive file is created.
    #[instrument(skip(self), fields(cutoff = %cutoff))]
    pub fn archive_old_orders(&self, cutoff: NaiveDateTime) -> Result<ArchiveOutcome, ServiceError> {
        let ledger = self.config.ledger_path();
        let _lock = LedgerLock::acquire(&ledger)?;

        let data = table::read_table(&ledger, true, None, &self.options)?;
        let mut archived: Vec<Vec<String>> = Vec::new();
        let mut kept: Vec<Vec<String>> = Vec::new();
        for raw in &data.rows {
            let row = OrderRow::from_fields(&raw.fields);
            if creation_date_for(&row) < cutoff {
                archived.push(raw.fields.clone());
            } else {
                kept.push(raw.fields.clone());
            }
        }

        if archived.is_empty() {
            info!("No order older than cutoff, ledger untouched");
            return Ok(ArchiveOutcome {
                archived_count: 0,
                kept_count: kept.len(),
                archive_path: None,
            });
        }

        let header: Vec<String> = data
            .header
            .clone()
            .unwrap_or_else(|| LEDGER_HEADER.iter().map(|s| s.to_string()).collect());
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let archive_path = self.config.archive_dir.join(format!("commandes_{stamp}.csv"));

        table::write_table(
            &archive_path,
            Some(&header),
            &archived,
            WriteMode::Overwrite,
            true,
            &self.options,
        )?;
        table::write_table(&ledger, Some(&header), &kept, WriteMode::Overwrite, true, &self.options)?;

        info!(
            archived = archived.len(),
            kept = kept.len(),
            archive = %archive_path.display(),
            "Old orders archived"
        );
        Ok(ArchiveOutcome {
            archived_count: archived.len(),
            kept_count: kept.len(),
            archive_path: Some(archive_path),
        })
    }

    /// Marks an order retrieved via a streaming row-by-row rewrite:
    /// rows are copied one at a time into a temp file which then
    /// replaces the ledger. Rows whose width disagrees with the header
    /// are copied through unchanged and logged, never fatal.
    #[instrument(skip(self), fields(reference = %reference))]
    pub fn mark_order_as_retrieved(
        &self,
        reference: &str,
        actual_date: &str,
    ) -> Result<usize, ServiceError> {
        let ledger = self.config.ledger_path();
        let _lock = LedgerLock::acquire(&ledger)?;

        if !ledger.is_file() {
            return Err(ServiceError::NotFound(format!(
                "ledger {} does not exist",
                ledger.display()
            )));
        }
        let raw = std::fs::read(&ledger)?;
        let content = bom::strip_boms(&raw).to_vec();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .quote(self.options.quote)
            .flexible(true)
            .has_headers(false)
            .from_reader(std::io::Cursor::new(content));

        let parent = ledger.parent().unwrap_or_else(|| std::path::Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(&bom::UTF8_BOM)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.options.delimiter)
            .quote(self.options.quote)
            .flexible(true)
            .from_writer(&mut tmp);

        let mut header_width: Option<usize> = None;
        let mut updated = 0usize;
        for result in reader.records() {
            let record = result?;
            let mut fields: Vec<String> = record.iter().map(|f| f.to_string()).collect();
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            match header_width {
                None => header_width = Some(fields.len()),
                Some(width) => {
                    if fields.len() != width {
                        warn!(line, width = fields.len(), expected = width, "Malformed row, copied unchanged");
                        writer.write_record(&fields)?;
                        continue;
                    }
                    if fields.get(columns::REFERENCE).map(String::as_str) == Some(reference) {
                        if fields.len() < columns::COUNT {
                            fields.resize(columns::COUNT, String::new());
                        }
                        fields[columns::COMMAND_STATUS] = CommandStatus::Retrieved.to_string();
                        fields[columns::ACTUAL_RETRIEVAL_DATE] = actual_date.to_string();
                        updated += 1;
                    }
                }
            }
            writer.write_record(&fields)?;
        }
        writer.flush()?;
        drop(writer);

        if updated == 0 {
            // Temp file is discarded on drop; ledger stays as it was.
            return Err(ServiceError::NotFound(format!("order {reference} not found")));
        }
        tmp.persist(&ledger).map_err(|e| ServiceError::Io(e.error))?;
        info!(reference, updated, "Order marked as retrieved");
        Ok(updated)
    }

    /// Streams the ledger for the first row of the reference and returns
    /// the customer contact fields. Malformed rows are skipped.
    #[instrument(skip(self), fields(reference = %reference))]
    pub fn get_order_contact(&self, reference: &str) -> Result<ContactInfo, ServiceError> {
        let data = table::read_table(&self.config.ledger_path(), true, None, &self.options)?;
        let width = data.header.as_ref().map(Vec::len);

        for raw in &data.rows {
            if let Some(width) = width {
                if raw.fields.len() != width {
                    warn!(line = raw.line_number, "Malformed row skipped during contact lookup");
                    continue;
                }
            }
            if raw.fields.get(columns::REFERENCE).map(String::as_str) == Some(reference) {
                let row = OrderRow::from_fields(&raw.fields);
                return Ok(ContactInfo {
                    reference: row.reference,
                    last_name: row.last_name,
                    first_name: row.first_name,
                    email: row.email,
                    phone: row.phone,
                });
            }
        }
        Err(ServiceError::NotFound(format!("order {reference} not found")))
    }

    /// Delegates abandoned temp-cart cleanup to the collaborator.
    pub fn cleanup_temp_orders(
        &self,
        cleaner: &dyn TempOrderCleaner,
        force: bool,
    ) -> Result<usize, ServiceError> {
        cleaner.cleanup(
            &self.config.temp_orders_dir,
            self.config.temp_order_max_age_hours,
            force,
        )
    }
}
