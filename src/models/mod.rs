pub mod order;
pub mod row;

pub use order::{CommandStatus, Order, OrderLineItem, PaymentMode};
pub use row::{columns, OrderRow, EXPORTED_LITERAL, LEDGER_HEADER};
