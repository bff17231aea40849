pub mod catalog;
pub mod filters;
pub mod ledger;
pub mod orders;

pub use catalog::{ActivityCatalog, ActivityTypeInfo, ConfigCatalog, FileAgeCleaner, TempOrderCleaner};
pub use filters::{AtomicPredicate, OrderFilter};
pub use ledger::{ArchiveOutcome, ContactInfo, LedgerService, LedgerStats, LedgerView};
pub use orders::{OrderRecord, OrderService, PaymentUpdate};
