use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Column positions of the order ledger. One row per photo line item; rows
/// sharing column 0 belong to one logical order. Every component goes
/// through these constants instead of bare indices.
pub mod columns {
    pub const REFERENCE: usize = 0;
    pub const LAST_NAME: usize = 1;
    pub const FIRST_NAME: usize = 2;
    pub const EMAIL: usize = 3;
    pub const PHONE: usize = 4;
    pub const CREATED_AT: usize = 5;
    pub const ACTIVITY_KEY: usize = 6;
    pub const PHOTO_NAME: usize = 7;
    pub const QUANTITY: usize = 8;
    pub const LINE_TOTAL: usize = 9;
    pub const PAYMENT_MODE: usize = 10;
    pub const DESIRED_PAYMENT_DATE: usize = 11;
    pub const ACTUAL_PAYMENT_DATE: usize = 12;
    pub const DEPOSIT_DATE: usize = 13;
    pub const ACTUAL_RETRIEVAL_DATE: usize = 14;
    pub const COMMAND_STATUS: usize = 15;
    pub const EXPORTED: usize = 16;
    pub const EXPECTED_RETRIEVAL_DATE: usize = 17;

    /// Expected width of a ledger row. Shorter rows (hand-edited files)
    /// are padded with empty strings on read.
    pub const COUNT: usize = 18;
}

/// Literal stored in the exported column when an order has been exported.
pub const EXPORTED_LITERAL: &str = "exported";

/// Header row of the ledger file.
pub const LEDGER_HEADER: [&str; columns::COUNT] = [
    "Ref",
    "Nom",
    "Prenom",
    "Email",
    "Tel",
    "Date commande",
    "Dossier",
    "Photo",
    "Quantite",
    "Total",
    "Reglement",
    "Date encaissement souhaitee",
    "Date reglement",
    "Date encaissement",
    "Date recuperation",
    "Statut",
    "Exporte",
    "Date recuperation prevue",
];

/// Canonical timestamp format used in the ledger's date columns.
pub const LEDGER_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One ledger row under its column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
    pub reference: String,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub phone: String,
    pub created_at: String,
    pub activity_key: String,
    pub photo_name: String,
    pub quantity: String,
    pub line_total: String,
    pub payment_mode: String,
    pub desired_payment_date: String,
    pub actual_payment_date: String,
    pub deposit_date: String,
    pub actual_retrieval_date: String,
    pub command_status: String,
    pub exported: String,
    pub expected_retrieval_date: String,
}

impl OrderRow {
    /// Builds a row from raw fields, padding missing trailing columns with
    /// empty strings. Extra columns beyond the schema are dropped.
    pub fn from_fields(fields: &[String]) -> Self {
        let get = |idx: usize| fields.get(idx).cloned().unwrap_or_default();
        Self {
            reference: get(columns::REFERENCE),
            last_name: get(columns::LAST_NAME),
            first_name: get(columns::FIRST_NAME),
            email: get(columns::EMAIL),
            phone: get(columns::PHONE),
            created_at: get(columns::CREATED_AT),
            activity_key: get(columns::ACTIVITY_KEY),
            photo_name: get(columns::PHOTO_NAME),
            quantity: get(columns::QUANTITY),
            line_total: get(columns::LINE_TOTAL),
            payment_mode: get(columns::PAYMENT_MODE),
            desired_payment_date: get(columns::DESIRED_PAYMENT_DATE),
            actual_payment_date: get(columns::ACTUAL_PAYMENT_DATE),
            deposit_date: get(columns::DEPOSIT_DATE),
            actual_retrieval_date: get(columns::ACTUAL_RETRIEVAL_DATE),
            command_status: get(columns::COMMAND_STATUS),
            exported: get(columns::EXPORTED),
            expected_retrieval_date: get(columns::EXPECTED_RETRIEVAL_DATE),
        }
    }

    pub fn to_fields(&self) -> Vec<String> {
        vec![
            self.reference.clone(),
            self.last_name.clone(),
            self.first_name.clone(),
            self.email.clone(),
            self.phone.clone(),
            self.created_at.clone(),
            self.activity_key.clone(),
            self.photo_name.clone(),
            self.quantity.clone(),
            self.line_total.clone(),
            self.payment_mode.clone(),
            self.desired_payment_date.clone(),
            self.actual_payment_date.clone(),
            self.deposit_date.clone(),
            self.actual_retrieval_date.clone(),
            self.command_status.clone(),
            self.exported.clone(),
            self.expected_retrieval_date.clone(),
        ]
    }

    /// Older ledgers recorded only the actual retrieval date. When the
    /// expected date is missing but the actual one is set, the actual date
    /// stands in for the expected one.
    pub fn apply_retrieval_compat(&mut self) {
        if self.expected_retrieval_date.is_empty() && !self.actual_retrieval_date.is_empty() {
            self.expected_retrieval_date = self.actual_retrieval_date.clone();
        }
    }

    pub fn parsed_quantity(&self) -> u32 {
        self.quantity.trim().parse().unwrap_or(0)
    }

    pub fn parsed_line_total(&self) -> Option<Decimal> {
        parse_csv_decimal(&self.line_total)
    }

    pub fn is_exported(&self) -> bool {
        self.exported == EXPORTED_LITERAL
    }
}

/// Parses a ledger decimal, which uses a comma as decimal separator
/// (`"12,50"`). A plain dot is tolerated for hand-edited files.
pub fn parse_csv_decimal(raw: &str) -> Option<Decimal> {
    let normalized = raw.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized.parse().ok()
}

/// Renders a decimal in the ledger's comma-separated form.
pub fn format_csv_decimal(value: Decimal) -> String {
    value.to_string().replace('.', ",")
}

/// Parses a ledger date column: full timestamp first, bare date accepted
/// as midnight. Returns `None` for empty or unparseable text.
pub fn parse_ledger_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, LEDGER_DATETIME_FORMAT) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Date part of a ledger date column, used for day-granularity comparisons
/// (urgency, "paid today").
pub fn parse_ledger_day(raw: &str) -> Option<NaiveDate> {
    parse_ledger_datetime(raw).map(|dt| dt.date())
}
