//! Transaction record schema

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of columns every record must have
pub const FIELD_COUNT: usize = 8;

/// Column names in source order
pub const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "ID", "Mall", "Branch", "Date", "Quantity", "Price", "Type", "Status",
];

/// One transaction row. Values are kept exactly as read from the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub mall: String,
    pub branch: String,
    pub date: String,
    pub quantity: String,
    pub price: String,
    pub transaction_type: String,
    pub status: String,
}

impl TransactionRecord {
    /// Build a record from exactly [`FIELD_COUNT`] values in source order
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Result<Self> {
        if fields.len() != FIELD_COUNT {
            return Err(Error::schema(format!(
                "expected {} fields ({}), found {}",
                FIELD_COUNT,
                FIELD_NAMES.join(", "),
                fields.len()
            )));
        }

        let field = |i: usize| fields[i].as_ref().to_string();

        Ok(Self {
            id: field(0),
            mall: field(1),
            branch: field(2),
            date: field(3),
            quantity: field(4),
            price: field(5),
            transaction_type: field(6),
            status: field(7),
        })
    }

    /// Field values in source order
    pub fn fields(&self) -> [&str; FIELD_COUNT] {
        [
            &self.id,
            &self.mall,
            &self.branch,
            &self.date,
            &self.quantity,
            &self.price,
            &self.transaction_type,
            &self.status,
        ]
    }
}
