//! Österreichische Nationalbank Bankstellenverzeichnis. Published at a fixed
//! URL, so nothing is scraped; the file opens with a free-text preamble that
//! has to be cut off before the real header row.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use reqwest::Client;
use std::collections::HashSet;

use super::{col, read_delimited, RawBody};
use crate::fetch::{self, DataFormat, DownloadInfo};
use crate::pack::BankRecord;

const WEBSITE_URL: &str =
    "https://www.oenb.at/Statistik/Klassifikationen/Bankstellenverzeichnis.html";
const DOWNLOAD_URL: &str = "https://www.oenb.at/docroot/downloads_observ/sepa-zv-vz_gesamt.csv";

pub async fn download_url(_client: &Client) -> Result<DownloadInfo> {
    Ok(DownloadInfo {
        website_url: WEBSITE_URL.to_string(),
        url: DOWNLOAD_URL.to_string(),
        data_format: DataFormat::Csv,
        version: String::new(),
        notes: "Österreichische Nationalbank Bankstellenverzeichnis".to_string(),
    })
}

pub async fn download(client: &Client, url: &str) -> Result<RawBody> {
    let bytes = fetch::download_bytes(client, url).await?;
    let text = fetch::decode_latin1(&bytes);
    let Some(start) = text.find("Kennzeichen;") else {
        bail!("CSV header not found in OeNB download");
    };
    Ok(RawBody::Text(text[start..].to_string()))
}

const WANTED_COLS: [&str; 10] = [
    "Bankleitzahl",
    "SWIFT-Code",
    "Bankenname",
    "Straße",
    "PLZ",
    "Ort",
    "Telefon",
    "Fax",
    "E-Mail",
    "Homepage",
];

static ALLOWED_SECTORS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "Raiffeisen",
        "Aktienbanken",
        "§ 9 Institute",
        "Sparkassen",
        "Volksbanken",
    ])
});

pub fn parse_rows(body: &RawBody) -> Result<Vec<BankRecord>> {
    let RawBody::Text(text) = body else {
        bail!("OeNB source delivers text, got a binary body");
    };
    let (columns, records) = read_delimited(text, b';')?;
    let mut rows = Vec::new();
    for record in &records {
        if !ALLOWED_SECTORS.contains(col(record, &columns, "Sektor")) {
            continue;
        }
        rows.push(BankRecord(
            WANTED_COLS.map(|name| col(record, &columns, name).to_string()),
        ));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Kennzeichen;Bankleitzahl;Bankenname;Sektor;Straße;PLZ;Ort;Telefon;Fax;E-Mail;Homepage;SWIFT-Code\n\
1;20111;Erste Bank;Sparkassen;Am Belvedere 1;1100;Wien;+43 1 0000;;office@erste.at;erstebank.at;GIBAATWWXXX\n\
2;32000;Raiffeisen NOe-Wien;Raiffeisen;F.-W.-Raiffeisen-Platz 1;1020;Wien;;;;raiffeisen.at;RLNWATWWXXX\n\
3;99999;Sonderinstitut;Sonstige;Irgendwo 1;1010;Wien;;;;;\n";

    #[test]
    fn keeps_only_allowed_sectors() -> Result<()> {
        let rows = parse_rows(&RawBody::Text(SAMPLE.to_string()))?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].field("BankCode")?, "20111");
        assert_eq!(rows[0].field("BIC")?, "GIBAATWWXXX");
        assert_eq!(rows[0].field("Address")?, "Am Belvedere 1");
        assert_eq!(rows[1].field("Website")?, "raiffeisen.at");
        Ok(())
    }

    #[tokio::test]
    async fn fixed_url_needs_no_scraping() -> Result<()> {
        let info = download_url(&Client::new()).await?;
        assert_eq!(info.url, DOWNLOAD_URL);
        assert_eq!(info.data_format, DataFormat::Csv);
        assert!(info.version.is_empty());
        Ok(())
    }
}
