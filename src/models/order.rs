use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::row::{parse_ledger_day, OrderRow};

/// Lifecycle stage of an order.
///
/// Happy path: `temp → validated → paid → prepared → retrieved`;
/// `cancelled` is reachable from any pre-retrieved state. The exported
/// marker is an orthogonal flag on the row, not a status value.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Temp,
    Validated,
    Paid,
    Prepared,
    Retrieved,
    Cancelled,
}

impl CommandStatus {
    /// Whitelist of forward transitions. Mutations do not reject writes
    /// that fall outside it (manual corrections on hand-edited ledgers are
    /// a supported workflow) but they log when one happens.
    pub fn can_transition_to(self, next: CommandStatus) -> bool {
        use CommandStatus::*;
        match (self, next) {
            (Temp, Validated) => true,
            (Validated, Paid) => true,
            (Paid, Prepared) => true,
            (Paid, Retrieved) => true,
            (Prepared, Retrieved) => true,
            (Temp | Validated | Paid | Prepared, Cancelled) => true,
            _ if self == next => true,
            _ => false,
        }
    }
}

/// Payment modes accepted by the payment workflow. The ledger column is
/// free text (hand-edited files happen); this enum is the vocabulary of
/// new writes.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    Unpaid,
    Check,
    Card,
    Cash,
    Transfer,
}

impl PaymentMode {
    /// Only check payments settle later than the payment itself; every
    /// other mode is treated as settling instantly.
    pub fn settles_instantly(self) -> bool {
        !matches!(self, PaymentMode::Check)
    }
}

/// One photo line item of an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub activity_key: String,
    pub photo_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    /// Pricing tier label, e.g. "Photo" or "Cle USB".
    pub pricing_label: String,
}

/// In-memory reconstruction of one logical order from its ledger rows.
///
/// Never persisted directly: it is rebuilt on every read by grouping rows
/// sharing a reference, and any mutation is expressed as a rewrite of the
/// underlying rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub reference: String,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub phone: String,

    /// Creation timestamp, parsed from the date column with fallback to
    /// the timestamp embedded in the reference, then to "now".
    pub created_at: NaiveDateTime,

    /// Raw status column. Hand-edited ledgers may hold values outside the
    /// `CommandStatus` vocabulary; `status()` gives the parsed view.
    pub command_status: String,
    pub payment_mode: String,
    pub desired_payment_date: String,
    pub actual_payment_date: String,
    pub deposit_date: String,
    pub actual_retrieval_date: String,
    pub exported: bool,
    pub expected_retrieval_date: String,

    pub line_items: Vec<OrderLineItem>,
    pub photos_count: u32,
    pub usb_keys_count: u32,
    pub total_amount: Decimal,

    /// Whole days between today and the expected retrieval date. `None`
    /// when no expected date is recorded; urgency flags stay false then.
    pub days_until_retrieval: Option<i64>,
    pub is_urgent: bool,
    pub is_overdue: bool,
}

impl Order {
    /// Seeds an aggregate from the first row found for a reference. Line
    /// items and totals accumulate afterwards, row by row.
    pub fn seed_from_row(row: &OrderRow, created_at: NaiveDateTime) -> Self {
        Self {
            reference: row.reference.clone(),
            last_name: row.last_name.clone(),
            first_name: row.first_name.clone(),
            email: row.email.clone(),
            phone: row.phone.clone(),
            created_at,
            command_status: row.command_status.clone(),
            payment_mode: row.payment_mode.clone(),
            desired_payment_date: row.desired_payment_date.clone(),
            actual_payment_date: row.actual_payment_date.clone(),
            deposit_date: row.deposit_date.clone(),
            actual_retrieval_date: row.actual_retrieval_date.clone(),
            exported: row.is_exported(),
            expected_retrieval_date: row.expected_retrieval_date.clone(),
            line_items: Vec::new(),
            photos_count: 0,
            usb_keys_count: 0,
            total_amount: Decimal::ZERO,
            days_until_retrieval: None,
            is_urgent: false,
            is_overdue: false,
        }
    }

    /// Status column parsed against the known vocabulary.
    pub fn status(&self) -> Option<CommandStatus> {
        self.command_status.parse().ok()
    }

    /// Computes `days_until_retrieval` and the urgency flags relative to
    /// `today`. Orders without an expected retrieval date are left as-is.
    pub fn compute_urgency(&mut self, today: NaiveDate) {
        let Some(expected) = parse_ledger_day(&self.expected_retrieval_date) else {
            return;
        };
        let days = (expected - today).num_days();
        self.days_until_retrieval = Some(days);
        self.is_urgent = days <= 1;
        self.is_overdue = days < 0;
    }

    /// Expected retrieval day for sorting; orders without one sort last.
    pub fn expected_day_or_max(&self) -> NaiveDate {
        parse_ledger_day(&self.expected_retrieval_date)
            .unwrap_or_else(|| NaiveDate::from_ymd_opt(9999, 12, 31).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_lowercase() {
        assert_eq!(CommandStatus::Paid.to_string(), "paid");
        assert_eq!("retrieved".parse::<CommandStatus>().unwrap(), CommandStatus::Retrieved);
        assert!("shipped".parse::<CommandStatus>().is_err());
    }

    #[test]
    fn happy_path_transitions_are_allowed() {
        use CommandStatus::*;
        for (from, to) in [(Temp, Validated), (Validated, Paid), (Paid, Prepared), (Prepared, Retrieved), (Paid, Retrieved)] {
            assert!(from.can_transition_to(to), "{from} -> {to}");
        }
    }

    #[test]
    fn cancelled_reachable_from_pre_retrieved_only() {
        use CommandStatus::*;
        for from in [Temp, Validated, Paid, Prepared] {
            assert!(from.can_transition_to(Cancelled), "{from} -> cancelled");
        }
        assert!(!Retrieved.can_transition_to(Cancelled));
        assert!(!Retrieved.can_transition_to(Temp));
    }

    #[test]
    fn only_check_settles_later() {
        assert!(!PaymentMode::Check.settles_instantly());
        assert!(PaymentMode::Card.settles_instantly());
        assert!(PaymentMode::Cash.settles_instantly());
    }

    #[test]
    fn urgency_from_expected_date() {
        let today = NaiveDate::from_ymd_opt(2025, 7, 25).unwrap();
        let row = OrderRow {
            reference: "CMD2025072516124301".into(),
            expected_retrieval_date: "2025-07-24".into(),
            ..OrderRow::default()
        };
        let mut order = Order::seed_from_row(&row, today.and_hms_opt(0, 0, 0).unwrap());
        order.compute_urgency(today);
        assert_eq!(order.days_until_retrieval, Some(-1));
        assert!(order.is_urgent);
        assert!(order.is_overdue);

        order.expected_retrieval_date = "2025-07-26".into();
        order.is_urgent = false;
        order.is_overdue = false;
        order.compute_urgency(today);
        assert_eq!(order.days_until_retrieval, Some(1));
        assert!(order.is_urgent);
        assert!(!order.is_overdue);
    }

    #[test]
    fn missing_expected_date_keeps_flags_unset() {
        let today = NaiveDate::from_ymd_opt(2025, 7, 25).unwrap();
        let row = OrderRow::default();
        let mut order = Order::seed_from_row(&row, today.and_hms_opt(0, 0, 0).unwrap());
        order.compute_urgency(today);
        assert_eq!(order.days_until_retrieval, None);
        assert!(!order.is_urgent);
        assert!(!order.is_overdue);
        assert_eq!(order.expected_day_or_max().to_string(), "9999-12-31");
    }
}
