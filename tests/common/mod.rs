//! Shared fixtures: tempdir-backed ledgers and wired services.

use std::path::PathBuf;

use photo_orders::config::AppConfig;
use photo_orders::models::{columns, LEDGER_HEADER};
use photo_orders::services::LedgerService;
use photo_orders::table::{self, TableOptions, WriteMode};
use tempfile::TempDir;

/// A ledger row with sensible defaults; tests override columns through
/// the `columns` constants.
pub fn base_row(reference: &str) -> Vec<String> {
    let mut fields = vec![String::new(); columns::COUNT];
    fields[columns::REFERENCE] = reference.to_string();
    fields[columns::LAST_NAME] = "Durand".to_string();
    fields[columns::FIRST_NAME] = "Alice".to_string();
    fields[columns::EMAIL] = "alice@example.com".to_string();
    fields[columns::PHONE] = "0601020304".to_string();
    fields[columns::CREATED_AT] = "2025-07-25 16:12:43".to_string();
    fields[columns::ACTIVITY_KEY] = "classe_2025".to_string();
    fields[columns::PHOTO_NAME] = "IMG_0042.jpg".to_string();
    fields[columns::QUANTITY] = "1".to_string();
    fields[columns::LINE_TOTAL] = "2,00".to_string();
    fields[columns::PAYMENT_MODE] = "unpaid".to_string();
    fields[columns::COMMAND_STATUS] = "temp".to_string();
    fields
}

pub struct Fixture {
    // Held for its Drop: the ledger lives inside it.
    _dir: TempDir,
    pub config: AppConfig,
}

impl Fixture {
    /// Writes a fresh ledger holding `rows` under a tempdir.
    pub fn with_rows(rows: &[Vec<String>]) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let config = AppConfig::with_orders_dir(dir.path().join("commandes"));
        let header: Vec<String> = LEDGER_HEADER.iter().map(|s| s.to_string()).collect();
        table::write_table(
            &config.ledger_path(),
            Some(&header),
            rows,
            WriteMode::Overwrite,
            true,
            &TableOptions::default(),
        )
        .expect("write fixture ledger");
        Self { _dir: dir, config }
    }

    pub fn service(&self) -> LedgerService {
        photo_orders::ledger_service(self.config.clone())
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.config.ledger_path()
    }

    /// Raw ledger rows as currently on disk.
    pub fn read_rows(&self) -> Vec<Vec<String>> {
        table::read_table(&self.ledger_path(), true, None, &TableOptions::default())
            .expect("read fixture ledger")
            .rows
            .into_iter()
            .map(|r| r.fields)
            .collect()
    }
}
