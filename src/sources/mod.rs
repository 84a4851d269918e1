//! Registered national sources. Each country module knows where its register
//! is published, how to fetch the file and how to normalize it into
//! [`BankRecord`] rows; the [`Country`] enum is the explicit registry, so an
//! unsupported code is an ordinary error rather than a failed lookup deep in
//! the pipeline.

pub mod at;
pub mod be;
pub mod de;
pub mod fr;

use anyhow::{Context, Result};
use csv::StringRecord;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::fetch::DownloadInfo;
use crate::pack::BankRecord;

/// A downloaded source body in its cacheable form: decoded text for
/// delimited feeds, raw archive bytes for spreadsheet feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawBody {
    Text(String),
    Binary(Vec<u8>),
}

impl RawBody {
    pub fn len(&self) -> usize {
        match self {
            RawBody::Text(text) => text.len(),
            RawBody::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RawBody::Text(text) => text.as_bytes(),
            RawBody::Binary(bytes) => bytes,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported country code \"{0}\"")]
pub struct UnsupportedCountry(pub String);

/// Countries with a registered source adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Country {
    At,
    Be,
    De,
    Fr,
}

pub const DEFAULT_COUNTRIES: [Country; 4] = [Country::At, Country::Be, Country::De, Country::Fr];

impl Country {
    pub fn from_code(code: &str) -> Result<Self, UnsupportedCountry> {
        match code.to_ascii_lowercase().as_str() {
            "at" => Ok(Country::At),
            "be" => Ok(Country::Be),
            "de" => Ok(Country::De),
            "fr" => Ok(Country::Fr),
            other => Err(UnsupportedCountry(other.to_string())),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Country::At => "at",
            Country::Be => "be",
            Country::De => "de",
            Country::Fr => "fr",
        }
    }

    /// Logical cache key for this country's download-URL entry.
    pub fn cache_key(self) -> String {
        format!("bankcode-bic-{}", self.code())
    }

    /// Discover where the register currently lives, scraping the publication
    /// page when the source rotates its paths.
    pub async fn download_url(self, client: &Client) -> Result<DownloadInfo> {
        match self {
            Country::At => at::download_url(client).await,
            Country::Be => be::download_url(client).await,
            Country::De => de::download_url(client).await,
            Country::Fr => fr::download_url(client).await,
        }
    }

    /// Fetch the register file and decode it into its cacheable body form.
    pub async fn download(self, client: &Client, url: &str) -> Result<RawBody> {
        match self {
            Country::At => at::download(client, url).await,
            Country::Be => be::download(client, url).await,
            Country::De => de::download(client, url).await,
            Country::Fr => fr::download(client, url).await,
        }
    }

    /// Normalize the body into canonical records.
    pub fn parse_rows(self, body: &RawBody) -> Result<Vec<BankRecord>> {
        match self {
            Country::At => at::parse_rows(body),
            Country::Be => be::parse_rows(body),
            Country::De => de::parse_rows(body),
            Country::Fr => fr::parse_rows(body, self.code()),
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Read a delimited body and map trimmed header names to column positions.
/// Returns the header map and the data records in file order.
pub(crate) fn read_delimited(
    text: &str,
    delimiter: u8,
) -> Result<(HashMap<String, usize>, Vec<StringRecord>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut records = rdr
        .records()
        .collect::<Result<Vec<_>, _>>()
        .context("parsing delimited body")?;
    if records.is_empty() {
        anyhow::bail!("delimited body has no header row");
    }
    let header = records.remove(0);
    let columns = header
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_string(), idx))
        .collect();
    Ok((columns, records))
}

/// Value of a named column in `record`, trimmed; empty string when the
/// column does not exist in this file.
pub(crate) fn col<'a>(
    record: &'a StringRecord,
    columns: &HashMap<String, usize>,
    name: &str,
) -> &'a str {
    columns
        .get(name)
        .and_then(|&idx| record.get(idx))
        .unwrap_or("")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_known_codes_case_insensitively() {
        assert_eq!(Country::from_code("de").unwrap(), Country::De);
        assert_eq!(Country::from_code("DE").unwrap(), Country::De);
        assert_eq!(Country::from_code("Fr").unwrap(), Country::Fr);
    }

    #[test]
    fn unknown_code_is_a_clear_error() {
        let err = Country::from_code("es").unwrap_err();
        assert_eq!(err.to_string(), "unsupported country code \"es\"");
    }

    #[test]
    fn cache_keys_are_per_country() {
        assert_eq!(Country::De.cache_key(), "bankcode-bic-de");
        assert_eq!(Country::At.cache_key(), "bankcode-bic-at");
    }

    #[test]
    fn delimited_reader_maps_headers_and_skips_blank_lines() -> Result<()> {
        let (columns, records) = read_delimited("A;B ;C\n1;2;3\n\nx;y;z\n", b';')?;
        assert_eq!(columns["B"], 1);
        assert_eq!(records.len(), 2);
        assert_eq!(col(&records[1], &columns, "C"), "z");
        assert_eq!(col(&records[1], &columns, "Missing"), "");
        Ok(())
    }

    #[test]
    fn raw_body_reports_its_size() {
        assert_eq!(RawBody::Text("abc".to_string()).len(), 3);
        assert!(RawBody::Binary(Vec::new()).is_empty());
    }
}
