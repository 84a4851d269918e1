use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Canonical column order shared by every national source. Position is the
/// identity of a field; the table below is the single source of truth for
/// resolving a name to its slot.
pub const FIELD_NAMES: [&str; 10] = [
    "BankCode", "BIC", "Name", "Address", "PostCode", "City", "Phone", "Fax", "Email", "Website",
];

/// Number of slots in a normalized record.
pub const FIELD_COUNT: usize = FIELD_NAMES.len();

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PackError {
    #[error("column name \"{0}\" not found in field names")]
    UnknownField(String),
}

static FIELD_POSITIONS: Lazy<HashMap<String, usize>> = Lazy::new(|| {
    FIELD_NAMES
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.to_ascii_lowercase(), idx))
        .collect()
});

/// Resolve a field name (case-insensitive) to its record position.
pub fn field_position(name: &str) -> Result<usize, PackError> {
    FIELD_POSITIONS
        .get(&name.to_ascii_lowercase())
        .copied()
        .ok_or_else(|| PackError::UnknownField(name.to_string()))
}

/// One normalized bank row. Empty string means "unknown"; a slot is never
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankRecord(pub [String; FIELD_COUNT]);

impl BankRecord {
    pub fn field(&self, name: &str) -> Result<&str, PackError> {
        Ok(self.0[field_position(name)?].as_str())
    }

    /// Project the record through `field_names`, in projection order.
    pub fn project(&self, field_names: &[String]) -> Result<Vec<String>, PackError> {
        field_names
            .iter()
            .map(|name| self.field(name).map(str::to_owned))
            .collect()
    }
}

impl From<[String; FIELD_COUNT]> for BankRecord {
    fn from(cells: [String; FIELD_COUNT]) -> Self {
        BankRecord(cells)
    }
}
