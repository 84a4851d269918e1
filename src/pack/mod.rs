//! Packs normalized rows into one of three dataset encodings, traded off by
//! payload size and lookup complexity: `Flat` (no key, linear scan), `Keyed`
//! (one key field, direct map) and `Serialized` (several key fields sharing
//! one row store through per-field index maps).

pub mod fields;

pub use fields::{field_position, BankRecord, PackError, FIELD_COUNT, FIELD_NAMES};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Payload of one keyed entry: the bare value when exactly one field was
/// projected, the projected row otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyedValue {
    Scalar(String),
    Row(Vec<String>),
}

/// A packed dataset. The serde representation is the on-disk JSON shape:
/// a `type` discriminant next to the variant's own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Dataset {
    Flat {
        fields: Vec<String>,
        banks: Vec<Vec<String>>,
    },
    Keyed {
        key: String,
        fields: Vec<String>,
        banks: BTreeMap<String, KeyedValue>,
    },
    Serialized {
        keys: BTreeMap<String, BTreeMap<String, usize>>,
        fields: Vec<String>,
        banks: Vec<Vec<String>>,
    },
}

impl Dataset {
    pub fn type_name(&self) -> &'static str {
        match self {
            Dataset::Flat { .. } => "flat",
            Dataset::Keyed { .. } => "keyed",
            Dataset::Serialized { .. } => "serialized",
        }
    }

    /// Field names projected into the payload, in projection order.
    pub fn fields(&self) -> &[String] {
        match self {
            Dataset::Flat { fields, .. }
            | Dataset::Keyed { fields, .. }
            | Dataset::Serialized { fields, .. } => fields,
        }
    }

    /// Number of packed entries.
    pub fn len(&self) -> usize {
        match self {
            Dataset::Flat { banks, .. } | Dataset::Serialized { banks, .. } => banks.len(),
            Dataset::Keyed { banks, .. } => banks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pack `rows` into the encoding selected by the number of key fields:
/// none gives `Flat`, exactly one gives `Keyed`, two or more give
/// `Serialized`. Field names resolve lazily as each row is projected, so an
/// unknown name only surfaces once a row actually reaches it.
pub fn pack(
    rows: &[BankRecord],
    key_names: &[String],
    field_names: &[String],
) -> Result<Dataset, PackError> {
    match key_names {
        [] => Ok(Dataset::Flat {
            fields: field_names.to_vec(),
            banks: rows
                .iter()
                .map(|row| row.project(field_names))
                .collect::<Result<_, _>>()?,
        }),
        [key_name] => {
            let single_field = field_names.len() == 1;
            let mut banks = BTreeMap::new();
            for row in rows {
                let key = row.field(key_name)?.to_string();
                let value = if single_field {
                    KeyedValue::Scalar(row.field(&field_names[0])?.to_string())
                } else {
                    KeyedValue::Row(row.project(field_names)?)
                };
                // last occurrence wins
                banks.insert(key, value);
            }
            Ok(Dataset::Keyed {
                key: key_name.clone(),
                fields: field_names.to_vec(),
                banks,
            })
        }
        _ => {
            let mut keys: BTreeMap<String, BTreeMap<String, usize>> = key_names
                .iter()
                .map(|name| (name.clone(), BTreeMap::new()))
                .collect();
            let mut banks = Vec::with_capacity(rows.len());
            for (index, row) in rows.iter().enumerate() {
                for (key_name, key_map) in &mut keys {
                    key_map.insert(row.field(key_name)?.to_string(), index);
                }
                banks.push(row.project(field_names)?);
            }
            Ok(Dataset::Serialized {
                keys,
                fields: field_names.to_vec(),
                banks,
            })
        }
    }
}
