//! French institutions out of the European Central Bank's monthly MFI list.
//! The list ships as a gzipped tab-separated file covering every member
//! state, so rows are filtered down to the registration country.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;

use super::{col, read_delimited, RawBody};
use crate::fetch::{self, DataFormat, DownloadInfo};
use crate::pack::BankRecord;

const WEBSITE_URL: &str = "https://www.ecb.europa.eu/stats/financial_corporations/list_of_financial_institutions/html/monthly_list-MID.en.html";

// href=".../fi_mrr_csv_250630.csv.gz"
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<url>.+/fi_mrr_csv_(?P<version>\d{6})\.csv\.gz)$")
        .expect("ECB link pattern should be valid")
});

pub async fn download_url(client: &Client) -> Result<DownloadInfo> {
    let (url, version) = fetch::scrape_download_url(client, WEBSITE_URL, &LINK_RE).await?;
    Ok(DownloadInfo {
        website_url: WEBSITE_URL.to_string(),
        url,
        data_format: DataFormat::Csv,
        version,
        notes: "European Central Bank Financial Institutions".to_string(),
    })
}

pub async fn download(client: &Client, url: &str) -> Result<RawBody> {
    let bytes = fetch::download_bytes(client, url).await?;
    // the list is a .gz file, not transport-compressed
    let text = if url.ends_with(".gz") || bytes.starts_with(&[0x1f, 0x8b]) {
        fetch::gunzip_text(&bytes)?
    } else {
        fetch::decode_with_bom(&bytes)
    };
    Ok(RawBody::Text(text))
}

const WANTED_COLS: [&str; 10] = [
    "RIAD_CODE", "BIC", "NAME", "ADDRESS", "POSTAL", "CITY", "", "", "", "",
];

pub fn parse_rows(body: &RawBody, country_code: &str) -> Result<Vec<BankRecord>> {
    let RawBody::Text(text) = body else {
        bail!("ECB source delivers text, got a binary body");
    };
    let (columns, records) = read_delimited(text, b'\t')?;
    let filter_country = country_code.to_uppercase();
    let mut seen_bics = HashSet::new();
    let mut rows = Vec::new();
    for record in &records {
        if col(record, &columns, "COUNTRY_OF_REGISTRATION") != filter_country {
            continue;
        }
        let bic = col(record, &columns, "BIC");
        if bic.is_empty() || !seen_bics.insert(bic.to_string()) {
            continue;
        }
        let mut cells = WANTED_COLS.map(|name| {
            if name.is_empty() {
                String::new()
            } else {
                col(record, &columns, name).to_string()
            }
        });
        // RIAD codes carry a 2-letter country prefix the bank code drops
        cells[0] = cells[0].get(2..).unwrap_or("").to_string();
        rows.push(BankRecord(cells));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
RIAD_CODE\tBIC\tNAME\tADDRESS\tPOSTAL\tCITY\tCOUNTRY_OF_REGISTRATION\n\
FR30003\tSOGEFRPP\tSociete Generale\t29 bd Haussmann\t75009\tParis\tFR\n\
FR30004\tBNPAFRPP\tBNP Paribas\t16 bd des Italiens\t75009\tParis\tFR\n\
DE10000\tMARKDEF1100\tBundesbank\tWilhelm-Epstein-Str.\t60431\tFrankfurt\tDE\n\
FR30005\t\tSans BIC\t1 rue de la Paix\t75002\tParis\tFR\n\
FR30006\tSOGEFRPP\tDouble BIC\t2 rue de la Paix\t75002\tParis\tFR\n";

    #[test]
    fn filters_to_country_and_strips_riad_prefix() -> Result<()> {
        let rows = parse_rows(&RawBody::Text(SAMPLE.to_string()), "fr")?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].field("BankCode")?, "30003");
        assert_eq!(rows[0].field("BIC")?, "SOGEFRPP");
        assert_eq!(rows[1].field("Name")?, "BNP Paribas");
        assert_eq!(rows[1].field("Fax")?, "");
        Ok(())
    }

    #[test]
    fn link_pattern_accepts_dated_archives() {
        let caps = LINK_RE
            .captures("/stats/money/mfi/general/html/dla/mfi_mrr_MID/fi_mrr_csv_250630.csv.gz")
            .expect("href should match");
        assert_eq!(&caps["version"], "250630");
    }
}
