//! Exact-match retrieval over packed datasets. Each encoding gets its own
//! lookup; issuing a lookup against the wrong encoding is an error, a missing
//! key value is not.

use crate::pack::{Dataset, KeyedValue};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("data is not in keyed format")]
    NotKeyed,
    #[error("data is not in serialized format")]
    NotSerialized,
    #[error("key \"{0}\" not found in data keys")]
    KeyFieldNotFound(String),
    #[error("row index {0} out of range")]
    RowIndex(usize),
    #[error("fields length mismatch: row has {row}, dataset declares {fields}")]
    RowShape { row: usize, fields: usize },
}

/// Zip field names to row values positionally. Positions past the end of the
/// row map to `None` rather than failing; a row may legitimately be shorter
/// than its field list.
pub fn row_to_object<'a>(
    values: &'a [String],
    fields: &'a [String],
) -> BTreeMap<&'a str, Option<&'a str>> {
    fields
        .iter()
        .enumerate()
        .map(|(idx, field)| (field.as_str(), values.get(idx).map(String::as_str)))
        .collect()
}

/// Like [`row_to_object`], but a scalar payload binds to the first field name.
pub fn to_object<'a>(
    value: &'a KeyedValue,
    fields: &'a [String],
) -> BTreeMap<&'a str, Option<&'a str>> {
    match value {
        KeyedValue::Scalar(scalar) => fields
            .first()
            .map(|field| (field.as_str(), Some(scalar.as_str())))
            .into_iter()
            .collect(),
        KeyedValue::Row(row) => row_to_object(row, fields),
    }
}

/// Linear scan over a flat dataset: every row whose `field_name` value equals
/// `value`, lazily. A field name outside the dataset's projection matches
/// nothing, and so does any non-flat dataset.
pub fn lookup_flat<'a>(
    data: &'a Dataset,
    field_name: &str,
    value: &'a str,
) -> impl Iterator<Item = &'a [String]> + 'a {
    let (fields, banks) = match data {
        Dataset::Flat { fields, banks } => (fields.as_slice(), banks.as_slice()),
        _ => (&[][..], &[][..]),
    };
    let position = fields.iter().position(|field| field == field_name);
    banks
        .iter()
        .filter(move |row| {
            position.is_some_and(|idx| row.get(idx).map(String::as_str) == Some(value))
        })
        .map(Vec::as_slice)
}

/// Direct map access on a keyed dataset; `None` when the key value is absent.
pub fn lookup_keyed<'a>(
    data: &'a Dataset,
    key_value: &str,
) -> Result<Option<&'a KeyedValue>, QueryError> {
    match data {
        Dataset::Keyed { banks, .. } => Ok(banks.get(key_value)),
        _ => Err(QueryError::NotKeyed),
    }
}

/// Index-map lookup on a serialized dataset. An unindexed key field is an
/// error; an absent key value is `None`. The returned row is checked against
/// the declared field list so a corrupted file cannot hand back a misshapen
/// row.
pub fn lookup_serialized<'a>(
    data: &'a Dataset,
    key_name: &str,
    key_value: &str,
) -> Result<Option<&'a Vec<String>>, QueryError> {
    let Dataset::Serialized { keys, fields, banks } = data else {
        return Err(QueryError::NotSerialized);
    };
    let key_map = keys
        .get(key_name)
        .ok_or_else(|| QueryError::KeyFieldNotFound(key_name.to_string()))?;
    let Some(&index) = key_map.get(key_value) else {
        return Ok(None);
    };
    let row = banks.get(index).ok_or(QueryError::RowIndex(index))?;
    if row.len() != fields.len() {
        return Err(QueryError::RowShape {
            row: row.len(),
            fields: fields.len(),
        });
    }
    Ok(Some(row))
}
