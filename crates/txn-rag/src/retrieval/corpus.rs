//! Ordered records and their text representations

use crate::ingestion::normalize;
use crate::types::TransactionRecord;

/// Records in ingestion order with their normalized texts.
/// `texts[i]` is always `normalize(&records[i])`.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    records: Vec<TransactionRecord>,
    texts: Vec<String>,
}

impl Corpus {
    pub fn from_records(records: Vec<TransactionRecord>) -> Self {
        let texts = records.iter().map(normalize).collect();
        Self { records, texts }
    }

    /// Record and text at `position`
    pub fn get(&self, position: usize) -> Option<(&TransactionRecord, &str)> {
        let record = self.records.get(position)?;
        let text = self.texts.get(position)?;
        Some((record, text.as_str()))
    }

    pub fn text(&self, position: usize) -> Option<&str> {
        self.texts.get(position).map(String::as_str)
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texts_follow_records() {
        let record = TransactionRecord::from_fields(&[
            "7", "City Mall", "Amman", "2024-03-01", "3", "12.50", "Sale", "Completed",
        ])
        .unwrap();
        let corpus = Corpus::from_records(vec![record.clone()]);

        assert_eq!(corpus.len(), 1);
        let (stored, text) = corpus.get(0).unwrap();
        assert_eq!(stored, &record);
        assert_eq!(text, "7 | City Mall | Amman | 2024-03-01 | 3 | 12.50 | Sale | Completed");
        assert!(corpus.get(1).is_none());
    }
}
