//! Order lifecycle and CSV-backed ledger engine for a photo-sales
//! application.
//!
//! Customers build carts against activity photo collections and submit
//! orders; staff drive payment, preparation, retrieval and export
//! workflows. The single source of truth is a flat `;`-delimited CSV
//! ledger, one row per photo line item; order aggregates are disposable
//! in-memory projections rebuilt on every read. Mutations are whole-file
//! rewrites behind an advisory lock and an atomic rename.
//!
//! Rendering, mail, downloads and authentication live elsewhere; this
//! crate only exposes the services those layers call.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod services;
pub mod table;

use std::sync::Arc;

pub use config::AppConfig;
pub use errors::{BulkOutcome, ServiceError};

/// Wires a [`services::LedgerService`] (and its nested order service)
/// from a configuration, using the config-backed activity catalog.
pub fn ledger_service(config: AppConfig) -> services::LedgerService {
    let config = Arc::new(config);
    let catalog = Arc::new(services::ConfigCatalog::new(config.pricing.clone()));
    services::LedgerService::new(config, catalog)
}
