//! Property-based tests for the CSV layer and reference format,
//! verifying invariants across a wide range of inputs.

use photo_orders::services::orders::creation_date_from_reference;
use photo_orders::table::{self, bom, TableOptions, WriteMode};
use proptest::prelude::*;
use tempfile::tempdir;

// Strategies for generating test data

/// Field content covering delimiters, quotes, backslashes and accents.
fn field_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9;:,. '\"\\\\àéèu-]{0,16}".prop_map(|s| s)
}

fn row_strategy() -> impl Strategy<Value = Vec<String>> {
    // a non-empty first field keeps the row from looking like a blank line
    ("[a-z]{1,8}", prop::collection::vec(field_strategy(), 3))
        .prop_map(|(id, mut rest)| {
            let mut row = vec![id];
            row.append(&mut rest);
            row
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn csv_round_trip_preserves_fields(rows in prop::collection::vec(row_strategy(), 1..6)) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roundtrip.csv");
        let options = TableOptions::default();
        let header: Vec<String> = vec!["a".into(), "b".into(), "c".into(), "d".into()];

        table::write_table(&path, Some(&header), &rows, WriteMode::Overwrite, true, &options).unwrap();
        let data = table::read_table(&path, true, None, &options).unwrap();

        prop_assert_eq!(data.header.as_ref(), Some(&header));
        prop_assert_eq!(data.rows.len(), rows.len());
        for (read, written) in data.rows.iter().zip(&rows) {
            prop_assert_eq!(&read.fields, written);
        }
    }

    #[test]
    fn ensure_single_bom_is_idempotent(content in prop::collection::vec(any::<u8>(), 0..256)) {
        let once = bom::ensure_single_bom(&content);
        let twice = bom::ensure_single_bom(&once);
        prop_assert_eq!(&once, &twice);
        prop_assert!(bom::has_bom(&once));
        // exactly one BOM: stripping the first leaves none at the front
        prop_assert!(!bom::has_bom(&once[3..]));
    }

    #[test]
    fn reference_timestamps_round_trip(
        year in 2000i32..2100,
        month in 1u32..13,
        day in 1u32..29,
        hour in 0u32..24,
        minute in 0u32..60,
        second in 0u32..60,
        suffix in 0u8..100,
    ) {
        let reference = format!(
            "CMD{year:04}{month:02}{day:02}{hour:02}{minute:02}{second:02}{suffix:02}"
        );
        let parsed = creation_date_from_reference(&reference).unwrap();
        prop_assert_eq!(
            parsed.format("%Y%m%d%H%M%S").to_string(),
            format!("{year:04}{month:02}{day:02}{hour:02}{minute:02}{second:02}")
        );
    }
}
