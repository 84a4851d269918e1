//! National Bank of Belgium identification codes. The register is an XLSX
//! workbook behind a monthly-rotated link, so the body stays binary until
//! parse time and then runs through the worksheet decoder.

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::{HashMap, HashSet};

use super::RawBody;
use crate::fetch::{self, DataFormat, DownloadInfo};
use crate::pack::BankRecord;
use crate::xlsx;

const WEBSITE_URL: &str = "https://www.nbb.be/en/activities/payments-and-securities/payment-standards/bank-identification-codes";

// href="/sites/default/files/2025-07/r_fulllist_of_codes_current_1.xlsx"
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<url>.*/sites/default/files/(?P<version>\d{4}-\d{2})/r_fulllist_of_codes_current_\d\.xlsx)$",
    )
    .expect("NBB link pattern should be valid")
});

/// Header cell that marks the start of the real table below the banner rows.
const HEADER_MARKER: &str = "T_Identification_Number";

/// Placeholder entries the register uses for unassigned code ranges.
static PLACEHOLDER_BICS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["VRIJ", "VRIJ-LIBRE", "NAV", "NAP", "NYA", "-"]));

pub async fn download_url(client: &Client) -> Result<DownloadInfo> {
    let (url, version) = fetch::scrape_download_url(client, WEBSITE_URL, &LINK_RE).await?;
    Ok(DownloadInfo {
        website_url: WEBSITE_URL.to_string(),
        url,
        data_format: DataFormat::Xlsx,
        version,
        notes: "National Bank of Belgium Bank Identification Codes".to_string(),
    })
}

pub async fn download(client: &Client, url: &str) -> Result<RawBody> {
    Ok(RawBody::Binary(fetch::download_bytes(client, url).await?))
}

fn cell<'a>(line: &'a [String], columns: &HashMap<String, usize>, name: &str) -> &'a str {
    columns
        .get(name)
        .and_then(|&idx| line.get(idx))
        .map(|value| value.trim())
        .unwrap_or("")
}

pub fn parse_rows(body: &RawBody) -> Result<Vec<BankRecord>> {
    let RawBody::Binary(bytes) = body else {
        bail!("NBB source delivers a workbook, got a text body");
    };
    let parts = xlsx::unpack_workbook(bytes)?;
    let shared = xlsx::shared_strings(&parts)?;
    let sheet = xlsx::sheet_xml(&parts, 1)?;
    let lines = xlsx::parse_rows(&sheet, Some(shared.as_slice()));

    let header_idx = lines
        .iter()
        .position(|line| line.first().is_some_and(|c| c == HEADER_MARKER))
        .context("header row not found in NBB worksheet")?;
    let columns: HashMap<String, usize> = lines[header_idx]
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_string(), idx))
        .collect();

    let mut seen_bics = HashSet::new();
    let mut rows = Vec::new();
    for line in &lines[header_idx + 1..] {
        let bic = cell(line, &columns, "Biccode")
            .replace(' ', "")
            .to_uppercase();
        if bic.is_empty() || PLACEHOLDER_BICS.contains(bic.as_str()) {
            continue;
        }
        if !seen_bics.insert(bic.clone()) {
            continue;
        }
        let bank_code = cell(line, &columns, HEADER_MARKER);
        if bank_code.is_empty() {
            continue;
        }
        let mut name = cell(line, &columns, "T_Institutions_English");
        if name.is_empty() {
            name = cell(line, &columns, "T_Institutions_Dutch");
        }
        if name.is_empty() {
            name = cell(line, &columns, "T_Institutions_French");
        }

        let mut record = BankRecord::default();
        record.0[0] = bank_code.to_string();
        record.0[1] = bic;
        record.0[2] = name.to_string();
        rows.push(record);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;
    use std::io::Write as _;
    use zip::write::FileOptions;
    use zip::CompressionMethod;

    fn sheet_from(rows: &[&[&str]]) -> String {
        let mut xml = String::from("<worksheet><sheetData>");
        for (r, row) in rows.iter().enumerate() {
            let _ = write!(xml, "<row r=\"{}\">", r + 1);
            for (c, value) in row.iter().enumerate() {
                let letter = (b'A' + c as u8) as char;
                let _ = write!(xml, "<c r=\"{}{}\"><v>{}</v></c>", letter, r + 1, value);
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        xml
    }

    fn workbook(rows: &[&[&str]]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let options: FileOptions<'_, ()> =
                FileOptions::default().compression_method(CompressionMethod::Stored);
            writer.start_file("xl/sharedStrings.xml", options).unwrap();
            writer.write_all(b"<sst/>").unwrap();
            writer.start_file("xl/worksheets/sheet1.xml", options).unwrap();
            writer.write_all(sheet_from(rows).as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn skips_banner_rows_and_placeholder_bics() -> Result<()> {
        let body = RawBody::Binary(workbook(&[
            &["Version 15/07/2025"],
            &[
                "T_Identification_Number",
                "Biccode",
                "T_Institutions_English",
                "T_Institutions_Dutch",
                "T_Institutions_French",
            ],
            &["000", "VRIJ", "", "", ""],
            &["050", "gkcc bebb", "", "Belfius Bank", "Banque Belfius"],
            &["300", "BBRUBEBB", "ING Belgium", "ING Belgie", "ING Belgique"],
            &["301", "BBRUBEBB", "Duplicate of ING", "", ""],
            &["", "NONAMEBB", "Codeless", "", ""],
        ]));
        let rows = parse_rows(&body)?;
        assert_eq!(rows.len(), 2);
        // BICs are normalized before dedup
        assert_eq!(rows[0].field("BIC")?, "GKCCBEBB");
        assert_eq!(rows[0].field("BankCode")?, "050");
        // name falls back through the languages
        assert_eq!(rows[0].field("Name")?, "Belfius Bank");
        assert_eq!(rows[1].field("Name")?, "ING Belgium");
        assert_eq!(rows[1].field("Address")?, "");
        Ok(())
    }

    #[test]
    fn missing_header_row_is_an_error() {
        let body = RawBody::Binary(workbook(&[&["just", "noise"]]));
        assert!(parse_rows(&body).is_err());
    }

    #[test]
    fn link_pattern_accepts_monthly_paths() {
        let caps = LINK_RE
            .captures("/sites/default/files/2025-07/r_fulllist_of_codes_current_1.xlsx")
            .expect("href should match");
        assert_eq!(&caps["version"], "2025-07");
    }

    #[test]
    fn text_body_is_rejected() {
        assert!(parse_rows(&RawBody::Text("csv".to_string())).is_err());
    }
}
