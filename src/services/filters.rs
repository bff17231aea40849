use serde::{Deserialize, Serialize};

use crate::models::{CommandStatus, OrderRow};

/// Named status filters exposed to callers of the ledger engine.
///
/// Each name decomposes into a set of atomic predicates combined with
/// AND; unrecognized names normalize to [`OrderFilter::All`] rather than
/// failing, so a stale link in the admin screens degrades to the full
/// list instead of an error page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderFilter {
    Unpaid,
    Paid,
    ToRetrieve,
    Temp,
    Validated,
    Prepared,
    Retrieved,
    Cancelled,
    /// Paid and not yet retrieved: the preparation queue.
    ToPrepare,
    /// Retrieved and exported: nothing left to do.
    Closed,
    All,
}

impl OrderFilter {
    /// Maps a filter name to its filter; unrecognized names accept all.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "unpaid" => Self::Unpaid,
            "paid" => Self::Paid,
            "to_retrieve" => Self::ToRetrieve,
            "temp" => Self::Temp,
            "validated" => Self::Validated,
            "prepared" => Self::Prepared,
            "retrieved" => Self::Retrieved,
            "cancelled" => Self::Cancelled,
            "toprepare" => Self::ToPrepare,
            "closed" => Self::Closed,
            _ => Self::All,
        }
    }

    /// Atomic predicate decomposition (AND semantics).
    pub fn predicates(self) -> Vec<AtomicPredicate> {
        use AtomicPredicate as P;
        match self {
            Self::Unpaid => vec![P::Unpaid],
            Self::Paid => vec![P::Status(CommandStatus::Paid)],
            Self::ToRetrieve => vec![P::ToRetrieve],
            Self::Temp => vec![P::Status(CommandStatus::Temp)],
            Self::Validated => vec![P::Status(CommandStatus::Validated)],
            Self::Prepared => vec![P::Status(CommandStatus::Prepared)],
            Self::Retrieved => vec![P::Status(CommandStatus::Retrieved)],
            Self::Cancelled => vec![P::Status(CommandStatus::Cancelled)],
            Self::ToPrepare => vec![P::Status(CommandStatus::Paid), P::NotRetrieved],
            Self::Closed => vec![P::Status(CommandStatus::Retrieved), P::Exported],
            Self::All => vec![],
        }
    }

    /// True when the row passes every atomic predicate of this filter.
    pub fn matches(self, row: &OrderRow) -> bool {
        self.predicates().iter().all(|p| p.matches(row))
    }
}

/// Atomic predicates over raw ledger row fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtomicPredicate {
    /// Command-status column equals the literal.
    Status(CommandStatus),
    /// Paid and the actual-retrieval-date column is still empty.
    ToRetrieve,
    /// Payment mode says unpaid, or the order is still in a pre-payment
    /// status without a recorded payment.
    Unpaid,
    Exported,
    NotExported,
    NotRetrieved,
}

impl AtomicPredicate {
    pub fn matches(&self, row: &OrderRow) -> bool {
        match self {
            Self::Status(status) => row.command_status == status.to_string(),
            Self::ToRetrieve => {
                row.command_status == CommandStatus::Paid.to_string()
                    && row.actual_retrieval_date.is_empty()
            }
            Self::Unpaid => {
                row.payment_mode == "unpaid"
                    || ((row.command_status == CommandStatus::Temp.to_string()
                        || row.command_status == CommandStatus::Validated.to_string())
                        && row.payment_mode != "paid")
            }
            Self::Exported => row.is_exported(),
            Self::NotExported => !row.is_exported(),
            Self::NotRetrieved => row.actual_retrieval_date.is_empty(),
        }
    }
}
