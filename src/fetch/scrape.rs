use anyhow::{anyhow, Context, Result};
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Publication format of a national source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Csv,
    Xlsx,
}

impl DataFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DataFormat::Csv => "csv",
            DataFormat::Xlsx => "xlsx",
        }
    }
}

/// Where a national dataset currently lives. Sources that rotate their
/// download paths are re-scraped when this falls out of the cache, so the
/// whole struct round-trips through serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadInfo {
    pub website_url: String,
    pub url: String,
    pub data_format: DataFormat,
    pub version: String,
    pub notes: String,
}

/// Scan `html` for the first anchor whose href matches `pattern`, resolving
/// it against `base`. The pattern's `url` group is the link itself (the full
/// href when the group is absent) and `version` its embedded release marker
/// (empty when absent).
pub fn find_download_link(html: &str, base: &Url, pattern: &Regex) -> Result<(String, String)> {
    let selector = Selector::parse("a[href]").expect("CSS selector for links should be valid");
    let doc = Html::parse_document(html);
    for href in doc.select(&selector).filter_map(|e| e.value().attr("href")) {
        let Some(caps) = pattern.captures(href) else {
            continue;
        };
        let raw = caps.name("url").map_or(href, |m| m.as_str());
        let version = caps.name("version").map_or("", |m| m.as_str()).to_string();
        let url = base
            .join(raw)
            .with_context(|| format!("resolving download link {}", raw))?;
        debug!(href, version, "matched download link");
        return Ok((url.to_string(), version));
    }
    Err(anyhow!("no matching download link found at {}", base))
}

/// Fetch a publication page and scrape the download link out of it.
pub async fn scrape_download_url(
    client: &Client,
    website_url: &str,
    pattern: &Regex,
) -> Result<(String, String)> {
    let html = client
        .get(website_url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
        .with_context(|| format!("fetching {}", website_url))?;
    let base = Url::parse(website_url)?;
    find_download_link(&html, &base, pattern)
}
