//! End-to-end order lifecycle: payment, export sinks, retrieval and
//! per-order archival against a real (temp) ledger file.

mod common;

use std::fs;

use common::{base_row, Fixture};
use photo_orders::models::{columns, CommandStatus, PaymentMode};
use photo_orders::services::{OrderFilter, PaymentUpdate};
use photo_orders::table::bom;

const REF: &str = "CMD2025072516124301";

#[test]
fn unpaid_temp_order_becomes_paid_with_instant_settlement() {
    let fixture = Fixture::with_rows(&[base_row(REF)]);
    let ledger = fixture.service();

    // temp + unpaid: visible under `unpaid`, invisible under `paid`
    assert_eq!(ledger.load_orders_data(OrderFilter::Unpaid).unwrap().orders.len(), 1);
    assert_eq!(ledger.load_orders_data(OrderFilter::Paid).unwrap().orders.len(), 0);

    let updated = ledger
        .orders()
        .update_payment_status(
            REF,
            PaymentUpdate {
                payment_mode: PaymentMode::Card,
                desired_payment_date: None,
                deposit_date: None,
            },
        )
        .unwrap();
    assert_eq!(updated, 1);

    let record = ledger.orders().load(REF).unwrap();
    assert_eq!(record.summary.command_status, "paid");
    assert_eq!(record.summary.payment_mode, "card");
    // card settles instantly: both dates equal the payment timestamp
    assert!(!record.summary.actual_payment_date.is_empty());
    assert_eq!(record.summary.desired_payment_date, record.summary.actual_payment_date);
    assert_eq!(record.summary.deposit_date, record.summary.actual_payment_date);

    assert_eq!(ledger.load_orders_data(OrderFilter::Unpaid).unwrap().orders.len(), 0);
    assert_eq!(ledger.load_orders_data(OrderFilter::Paid).unwrap().orders.len(), 1);
}

#[test]
fn check_payments_honor_distinct_deposit_dates() {
    let fixture = Fixture::with_rows(&[base_row(REF)]);
    let ledger = fixture.service();

    ledger
        .orders()
        .update_payment_status(
            REF,
            PaymentUpdate {
                payment_mode: PaymentMode::Check,
                desired_payment_date: Some("2025-09-01".to_string()),
                deposit_date: Some("2025-09-15".to_string()),
            },
        )
        .unwrap();

    let record = ledger.orders().load(REF).unwrap();
    assert_eq!(record.summary.payment_mode, "check");
    assert_eq!(record.summary.desired_payment_date, "2025-09-01");
    assert_eq!(record.summary.deposit_date, "2025-09-15");
    assert_ne!(record.summary.actual_payment_date, record.summary.desired_payment_date);
}

#[test]
fn mark_as_exported_touches_only_the_target_reference() {
    let mut other = base_row("CMD2025072010000002");
    other[columns::COMMAND_STATUS] = "paid".to_string();
    let fixture = Fixture::with_rows(&[base_row(REF), other, base_row(REF)]);
    let ledger = fixture.service();

    let updated = ledger.orders().mark_as_exported(REF).unwrap();
    assert_eq!(updated, 2);

    for fields in fixture.read_rows() {
        let expected = if fields[columns::REFERENCE] == REF { "exported" } else { "" };
        assert_eq!(fields[columns::EXPORTED], expected);
    }
}

#[test]
fn load_fails_for_unknown_reference_and_exports_refuse_to_write() {
    let fixture = Fixture::with_rows(&[base_row(REF)]);
    let ledger = fixture.service();

    let err = ledger.orders().load("CMD2099010100000000").unwrap_err();
    assert!(err.is_not_found());

    let err = ledger.orders().export_to_reglees("CMD2099010100000000").unwrap_err();
    assert!(matches!(err, photo_orders::ServiceError::DataNotLoaded(_)));
    // failed before any write: the sink was never created
    assert!(!fixture.config.reglees_path().exists());
}

#[test]
fn reglees_export_creates_sink_with_header_and_single_bom() {
    let mut usb = base_row(REF);
    usb[columns::ACTIVITY_KEY] = "film_gala".to_string();
    usb[columns::PHOTO_NAME] = "gala_USB.mp4".to_string();
    let mut print = base_row(REF);
    print[columns::QUANTITY] = "3".to_string();
    let fixture = Fixture::with_rows(&[print, usb]);
    let ledger = fixture.service();

    let path = ledger.orders().export_to_reglees(REF).unwrap();
    let raw = fs::read(&path).unwrap();
    assert!(bom::has_bom(&raw));

    let text = String::from_utf8(bom::strip_boms(&raw).to_vec()).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("Ref;Nom;Prenom;Email;Tel;Nb photos;Nb USB;Montant"));
    let data_line = lines.next().unwrap();
    // 3 prints + 1 USB key, default prices 2.00 each in the test config
    assert!(data_line.starts_with(&format!("{REF};Durand;Alice;alice@example.com;0601020304;3;1;8,00")));

    // a second export appends without duplicating the header
    ledger.orders().export_to_reglees(REF).unwrap();
    let raw = fs::read(&path).unwrap();
    let text = String::from_utf8(bom::strip_boms(&raw).to_vec()).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert_eq!(text.lines().filter(|l| l.starts_with("Ref;")).count(), 1);
}

#[test]
fn preparer_export_writes_one_line_per_photo() {
    let mut second = base_row(REF);
    second[columns::PHOTO_NAME] = "IMG_0043.jpg".to_string();
    second[columns::QUANTITY] = "2".to_string();
    let fixture = Fixture::with_rows(&[base_row(REF), second]);
    let ledger = fixture.service();

    let path = ledger.orders().export_to_preparer(REF).unwrap();
    let text = String::from_utf8(bom::strip_boms(&fs::read(&path).unwrap()).to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Ref;Nom;Prenom;Email;Tel;Nom du dossier;Nom de la photo"));
    assert!(lines[1].contains("IMG_0042.jpg"));
    assert!(lines[2].contains("IMG_0043.jpg;2;"));
}

#[test]
fn retrieval_status_records_the_actual_date() {
    let mut row = base_row(REF);
    row[columns::COMMAND_STATUS] = "prepared".to_string();
    let fixture = Fixture::with_rows(&[row]);
    let ledger = fixture.service();

    ledger
        .orders()
        .update_retrieval_status(REF, CommandStatus::Retrieved, Some("2025-08-01 10:00:00".to_string()))
        .unwrap();

    let record = ledger.orders().load(REF).unwrap();
    assert_eq!(record.summary.command_status, "retrieved");
    assert_eq!(record.summary.actual_retrieval_date, "2025-08-01 10:00:00");
}

#[test]
fn expected_date_falls_back_to_actual_on_load() {
    let mut row = base_row(REF);
    row[columns::COMMAND_STATUS] = "retrieved".to_string();
    row[columns::ACTUAL_RETRIEVAL_DATE] = "2025-08-01 10:00:00".to_string();
    let fixture = Fixture::with_rows(&[row]);
    let ledger = fixture.service();

    let record = ledger.orders().load(REF).unwrap();
    assert_eq!(record.summary.expected_retrieval_date, "2025-08-01 10:00:00");
}

#[test]
fn update_expected_retrieval_date_touches_only_that_column() {
    let fixture = Fixture::with_rows(&[base_row(REF)]);
    let ledger = fixture.service();

    ledger
        .orders()
        .update_expected_retrieval_date(REF, "2025-08-10")
        .unwrap();

    let record = ledger.orders().load(REF).unwrap();
    assert_eq!(record.summary.expected_retrieval_date, "2025-08-10");
    assert_eq!(record.summary.command_status, "temp");
    assert_eq!(record.summary.actual_retrieval_date, "");
}

#[test]
fn streaming_retrieval_updates_rows_and_passes_malformed_lines_through() {
    let other = base_row("CMD2025072010000002");
    let fixture = Fixture::with_rows(&[base_row(REF), other]);

    // hand-edited garbage line, narrower than the header
    let mut raw = fs::read(fixture.ledger_path()).unwrap();
    raw.extend_from_slice(b"broken;line\n");
    fs::write(fixture.ledger_path(), raw).unwrap();

    let ledger = fixture.service();
    let updated = ledger.mark_order_as_retrieved(REF, "2025-08-01 09:30:00").unwrap();
    assert_eq!(updated, 1);

    let rows = fixture.read_rows();
    assert_eq!(rows.len(), 3);
    let target = rows.iter().find(|r| r[columns::REFERENCE] == REF).unwrap();
    assert_eq!(target[columns::COMMAND_STATUS], "retrieved");
    assert_eq!(target[columns::ACTUAL_RETRIEVAL_DATE], "2025-08-01 09:30:00");
    // malformed line survived untouched
    assert!(rows.iter().any(|r| r.len() == 2 && r[0] == "broken"));

    let err = ledger.mark_order_as_retrieved("CMD2099010100000000", "2025-08-01").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn contact_lookup_returns_customer_fields() {
    let fixture = Fixture::with_rows(&[base_row(REF)]);
    let ledger = fixture.service();

    let contact = ledger.get_order_contact(REF).unwrap();
    assert_eq!(contact.reference, REF);
    assert_eq!(contact.last_name, "Durand");
    assert_eq!(contact.email, "alice@example.com");

    assert!(ledger.get_order_contact("CMD2099010100000000").unwrap_err().is_not_found());
}

#[test]
fn archive_backs_up_then_removes_the_reference() {
    let other = base_row("CMD2025072010000002");
    let fixture = Fixture::with_rows(&[base_row(REF), other, base_row(REF)]);
    let ledger = fixture.service();

    let removed = ledger.orders().archive(REF).unwrap();
    assert_eq!(removed, 2);

    let rows = fixture.read_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][columns::REFERENCE], "CMD2025072010000002");

    // the backup holds the pre-mutation state
    let backups: Vec<_> = fs::read_dir(&fixture.config.archive_dir).unwrap().collect();
    assert_eq!(backups.len(), 1);

    let err = ledger.orders().archive("CMD2099010100000000").unwrap_err();
    assert!(err.is_not_found());
}
