//! Canonical text form of a transaction record

use crate::types::TransactionRecord;

/// Separator placed between field values
pub const FIELD_SEPARATOR: &str = " | ";

/// Render a record as one line: field values in source order joined by
/// [`FIELD_SEPARATOR`]. Equal records always produce equal text.
pub fn normalize(record: &TransactionRecord) -> String {
    record.fields().join(FIELD_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TransactionRecord {
        TransactionRecord::from_fields(&[
            "17", "Taj Mall", "Abdoun", "2023-11-02", "3", "12.75", "Return", "Pending",
        ])
        .unwrap()
    }

    #[test]
    fn test_normalize_format() {
        assert_eq!(
            normalize(&record()),
            "17 | Taj Mall | Abdoun | 2023-11-02 | 3 | 12.75 | Return | Pending"
        );
    }

    #[test]
    fn test_normalize_is_stable() {
        let a = record();
        let b = a.clone();
        assert_eq!(normalize(&a), normalize(&b));
        assert_eq!(normalize(&a), normalize(&a));
    }

    #[test]
    fn test_empty_values_keep_their_slot() {
        let record =
            TransactionRecord::from_fields(&["1", "", "Branch", "", "1", "2", "Sale", ""]).unwrap();
        assert_eq!(normalize(&record), "1 |  | Branch |  | 1 | 2 | Sale | ");
    }
}
