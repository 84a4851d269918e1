//! Deutsche Bundesbank Bankleitzahlen file. The download path embeds a blob
//! id that changes with every release, so the link is scraped off the
//! publication page.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;

use super::{col, read_delimited, RawBody};
use crate::fetch::{self, DataFormat, DownloadInfo};
use crate::pack::BankRecord;

const WEBSITE_URL: &str = "https://www.bundesbank.de/de/aufgaben/unbarer-zahlungsverkehr/serviceangebot/bankleitzahlen/download-bankleitzahlen-602592";

// href="/resource/blob/926192/<hash>/<hash>/blz-aktuell-csv-data.csv"
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<url>.*/resource/blob/(?P<version>\d+)/.*/blz-aktuell-csv-data\.csv)$")
        .expect("Bundesbank link pattern should be valid")
});

pub async fn download_url(client: &Client) -> Result<DownloadInfo> {
    let (url, version) = fetch::scrape_download_url(client, WEBSITE_URL, &LINK_RE).await?;
    Ok(DownloadInfo {
        website_url: WEBSITE_URL.to_string(),
        url,
        data_format: DataFormat::Csv,
        version,
        notes: "Deutsche Bundesbank Bankleitzahlendatei".to_string(),
    })
}

pub async fn download(client: &Client, url: &str) -> Result<RawBody> {
    let bytes = fetch::download_bytes(client, url).await?;
    Ok(RawBody::Text(fetch::decode_latin1(&bytes)))
}

/// Bankleitzahlen columns in canonical record order; empty slots have no
/// counterpart in this file.
const WANTED_COLS: [&str; 10] = [
    "Bankleitzahl",
    "BIC",
    "Bezeichnung",
    "",
    "PLZ",
    "Ort",
    "",
    "",
    "",
    "",
];

pub fn parse_rows(body: &RawBody) -> Result<Vec<BankRecord>> {
    let RawBody::Text(text) = body else {
        bail!("Bundesbank source delivers text, got a binary body");
    };
    let (columns, records) = read_delimited(text, b';')?;
    let mut seen_bics = HashSet::new();
    let mut rows = Vec::new();
    for record in &records {
        // A = added, M = modified, D = deleted
        if col(record, &columns, "Änderungskennzeichen") == "D" {
            continue;
        }
        // Zahlungsdienstleister: 1 = ja, 2 = nein
        if col(record, &columns, "Merkmal") != "1" {
            continue;
        }
        let bic = col(record, &columns, "BIC");
        if bic.is_empty() || !seen_bics.insert(bic.to_string()) {
            continue;
        }
        let cells = WANTED_COLS.map(|name| {
            if name.is_empty() {
                String::new()
            } else {
                col(record, &columns, name).to_string()
            }
        });
        rows.push(BankRecord(cells));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Bankleitzahl;Merkmal;Bezeichnung;PLZ;Ort;BIC;Änderungskennzeichen\n\
10000000;1;Bundesbank;10591;Berlin;MARKDEF1100;U\n\
10010010;1;\"Postbank Ndl der Deutsche Bank\";10559;Berlin;PBNKDEFFXXX;U\n\
10010111;2;Kein Zahlungsdienstleister;10117;Berlin;NOPAYDE1XXX;U\n\
10011001;1;Geloeschte Bank;10117;Berlin;GONEDE1XXXX;D\n\
10020000;1;Ohne BIC;10117;Berlin;;U\n\
10030000;1;Doppelter BIC;10117;Berlin;MARKDEF1100;U\n";

    #[test]
    fn keeps_only_live_payment_providers_with_fresh_bics() -> Result<()> {
        let rows = parse_rows(&RawBody::Text(SAMPLE.to_string()))?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].field("BankCode")?, "10000000");
        assert_eq!(rows[0].field("BIC")?, "MARKDEF1100");
        assert_eq!(rows[0].field("City")?, "Berlin");
        // columns the file does not carry stay unknown
        assert_eq!(rows[0].field("Phone")?, "");
        assert_eq!(rows[1].field("Name")?, "Postbank Ndl der Deutsche Bank");
        Ok(())
    }

    #[test]
    fn link_pattern_accepts_versioned_blob_paths() {
        let caps = LINK_RE
            .captures("/resource/blob/926192/bdb8c7e624fa/472B63F073F0/blz-aktuell-csv-data.csv")
            .expect("href should match");
        assert_eq!(&caps["version"], "926192");
    }

    #[test]
    fn binary_body_is_rejected() {
        assert!(parse_rows(&RawBody::Binary(vec![0, 1])).is_err());
    }
}
