//! Renders a packed dataset into its on-disk flavors: a bare JSON document,
//! or a JS/TS module exporting the same structure under a single binding so
//! downstream code can import it directly.

use anyhow::{anyhow, Context, Result};
use std::str::FromStr;

use crate::fetch::DownloadInfo;
use crate::pack::Dataset;

pub const EXPORT_BINDING: &str = "bankData";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Js,
    Ts,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Js => "js",
            ExportFormat::Ts => "ts",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "js" => Ok(ExportFormat::Js),
            "ts" => Ok(ExportFormat::Ts),
            other => Err(anyhow!(
                "invalid format: {}. Valid formats are: json, js, ts.",
                other
            )),
        }
    }
}

/// Provenance stamped into the module header of js/ts exports.
#[derive(Debug, Clone)]
pub struct SourceInfo<'a> {
    pub info: &'a DownloadInfo,
    pub fetched_date: &'a str,
}

impl SourceInfo<'_> {
    /// Sources without a published version are stamped with the fetch day.
    fn version(&self) -> String {
        if self.info.version.is_empty() {
            self.fetched_date.replace('-', "").chars().take(8).collect()
        } else {
            self.info.version.clone()
        }
    }

    fn header(&self) -> String {
        format!(
            "// Source website: {}\n// Source download URL: {}\n// Fetched date: {}\n// Version: {}\n// {}\n",
            self.info.website_url,
            self.info.url,
            self.fetched_date,
            self.version(),
            self.info.notes,
        )
    }
}

/// Render `dataset` in the requested flavor. The js and ts flavors differ
/// only in the type annotation decorating the export (and the import that
/// annotation needs).
pub fn render_dataset(
    dataset: &Dataset,
    format: ExportFormat,
    source: Option<&SourceInfo<'_>>,
) -> Result<String> {
    let json = serde_json::to_string(dataset).context("encoding dataset")?;
    let header = source.map(SourceInfo::header).unwrap_or_default();
    Ok(match format {
        ExportFormat::Json => json,
        ExportFormat::Js => format!("{}export const {} = {};", header, EXPORT_BINDING, json),
        ExportFormat::Ts => format!(
            "{}import type {{ DataResult }} from 'bankscraper';\nexport const {}: DataResult = {};",
            header, EXPORT_BINDING, json
        ),
    })
}

/// Pull the exported object literal back out of a js/ts dataset module.
pub fn extract_export(source: &str) -> Result<&str> {
    let binding = source
        .find(&format!("export const {}", EXPORT_BINDING))
        .with_context(|| format!("no {} export in dataset module", EXPORT_BINDING))?;
    let open = source[binding..]
        .find('{')
        .context("malformed dataset export")?
        + binding;
    let close = source.rfind('}').context("malformed dataset export")?;
    if close < open {
        return Err(anyhow!("malformed dataset export"));
    }
    Ok(&source[open..=close])
}
