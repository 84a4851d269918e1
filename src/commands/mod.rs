//! The command pipelines behind the CLI: acquire (URL → body → rows, each
//! stage memoized through the content cache), then either dump the raw
//! source file, or pack and render a dataset, or answer a lookup against a
//! previously generated file.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::cache::{ContentCache, FsCache};
use crate::export::{self, ExportFormat, SourceInfo};
use crate::fetch::DownloadInfo;
use crate::pack::{self, BankRecord, Dataset, FIELD_NAMES};
use crate::query;
use crate::sources::{Country, RawBody};

pub const DEFAULT_TTL_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    pub clear_cache: bool,
    pub no_cache: bool,
    pub ttl_ms: Option<i64>,
}

impl CacheOptions {
    fn ttl_ms(&self) -> i64 {
        self.ttl_ms.unwrap_or(DEFAULT_TTL_MS)
    }
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub key_names: Vec<String>,
    pub field_names: Vec<String>,
    pub format: ExportFormat,
    pub cache: CacheOptions,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            key_names: Vec::new(),
            field_names: FIELD_NAMES.map(String::from).to_vec(),
            format: ExportFormat::Js,
            cache: CacheOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    pub quiet: bool,
    pub debug: bool,
}

struct Acquired {
    info: DownloadInfo,
    body: RawBody,
    fetched_date: String,
    body_was_cached: bool,
}

/// URL discovery and the download itself, each memoized under the cache so
/// repeated runs within the TTL never hit the network.
async fn acquire(
    client: &Client,
    cache: &FsCache,
    country: Country,
    opts: &CacheOptions,
) -> Result<Acquired> {
    let ttl_ms = opts.ttl_ms();
    let cache_key = country.cache_key();

    let cached_info: Option<DownloadInfo> = if opts.no_cache {
        None
    } else {
        cache.get(&cache_key)?
    };
    let url_was_cached = cached_info.is_some();
    let info = match cached_info {
        Some(info) => info,
        None => {
            let info = country.download_url(client).await?;
            if !opts.no_cache {
                cache.set(&cache_key, &info, ttl_ms)?;
            }
            info
        }
    };
    info!(country = %country, url = %info.url, cached = url_was_cached, "download URL resolved");

    let date_key = format!("{}|fetchedDate", info.url);
    let cached_body: Option<RawBody> = if opts.no_cache { None } else { cache.get(&info.url)? };
    let mut fetched_date: Option<String> = if opts.no_cache {
        None
    } else {
        cache.get(&date_key)?
    };
    let body_was_cached = cached_body.is_some();
    let body = match cached_body {
        Some(body) => body,
        None => {
            let body = country.download(client, &info.url).await?;
            if body.is_empty() {
                bail!("empty response from {}", info.url);
            }
            let stamp = chrono::Utc::now().to_rfc3339();
            if !opts.no_cache {
                cache.set(&info.url, &body, ttl_ms)?;
                cache.set(&date_key, &stamp, ttl_ms)?;
            }
            fetched_date = Some(stamp);
            body
        }
    };
    let fetched_date = fetched_date.unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
    info!(country = %country, bytes = body.len(), cached = body_was_cached, "source body ready");

    Ok(Acquired {
        info,
        body,
        fetched_date,
        body_was_cached,
    })
}

/// `download`: save each country's raw source file under `out_dir`.
pub async fn download(out_dir: &Path, countries: &[Country], opts: &CacheOptions) -> Result<()> {
    let client = Client::new();
    let cache = FsCache::new(None);
    if opts.clear_cache {
        cache.clear()?;
        info!("cache cleared");
    }
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    for &country in countries {
        let acquired = acquire(&client, &cache, country, opts).await?;
        let path = out_dir.join(format!(
            "{}.{}",
            country.code(),
            acquired.info.data_format.extension()
        ));
        fs::write(&path, acquired.body.as_bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        info!(country = %country, path = %path.display(), bytes = acquired.body.len(), "saved raw source");
    }
    Ok(())
}

/// `generate`: acquire, parse (memoized), pack and render one dataset file
/// per country.
pub async fn generate(out_dir: &Path, countries: &[Country], opts: &GenerateOptions) -> Result<()> {
    let client = Client::new();
    let cache = FsCache::new(None);
    if opts.cache.clear_cache {
        cache.clear()?;
        info!("cache cleared");
    }
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let key_names: Vec<String> = opts.key_names.iter().map(|n| n.to_lowercase()).collect();
    let field_names: Vec<String> = opts.field_names.iter().map(|n| n.to_lowercase()).collect();

    for &country in countries {
        let acquired = acquire(&client, &cache, country, &opts.cache).await?;

        let data_key = format!("data-{}", country.code());
        // parsed rows are only trusted from the cache when the body they came
        // from was itself served from the cache
        let cached_rows: Option<Vec<BankRecord>> =
            if opts.cache.no_cache || !acquired.body_was_cached {
                None
            } else {
                cache.get(&data_key)?
            };
        let rows_were_cached = cached_rows.is_some();
        let rows = match cached_rows {
            Some(rows) => rows,
            None => {
                let rows = country.parse_rows(&acquired.body)?;
                if !opts.cache.no_cache && !rows.is_empty() {
                    cache.set(&data_key, &rows, opts.cache.ttl_ms())?;
                }
                rows
            }
        };
        info!(country = %country, rows = rows.len(), cached = rows_were_cached, "rows parsed");

        let dataset = pack::pack(&rows, &key_names, &field_names)?;
        let source = SourceInfo {
            info: &acquired.info,
            fetched_date: &acquired.fetched_date,
        };
        let rendered = export::render_dataset(&dataset, opts.format, Some(&source))?;
        let path = out_dir.join(format!("{}.{}", country.code(), opts.format.extension()));
        fs::write(&path, &rendered).with_context(|| format!("writing {}", path.display()))?;
        info!(
            country = %country,
            path = %path.display(),
            bytes = rendered.len(),
            encoding = dataset.type_name(),
            "saved dataset"
        );
    }
    Ok(())
}

/// Load a generated dataset file: JSON directly, js/ts by slicing the
/// exported object literal back out.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    if !path.exists() {
        bail!(
            "file not found: {}. Create it with the \"generate\" command.",
            path.display()
        );
    }
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let is_module = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("js") | Some("ts")
    );
    let json = if is_module {
        export::extract_export(&text)?
    } else {
        text.as_str()
    };
    serde_json::from_str(json).with_context(|| format!("parsing dataset from {}", path.display()))
}

fn object_json(object: &std::collections::BTreeMap<&str, Option<&str>>) -> String {
    let map: serde_json::Map<String, serde_json::Value> = object
        .iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), serde_json::Value::from(v))))
        .collect();
    serde_json::Value::Object(map).to_string()
}

/// `lookup`: exact-match retrieval from a generated dataset file, printed as
/// one JSON object per match.
pub fn lookup(file: &Path, key_name: &str, key_value: &str, opts: &LookupOptions) -> Result<()> {
    let dataset = load_dataset(file)?;
    if !opts.quiet {
        info!(file = %file.display(), encoding = dataset.type_name(), rows = dataset.len(), "dataset loaded");
    }
    if opts.debug {
        debug!(dataset = %serde_json::to_string(&dataset)?, "full dataset");
    }

    match &dataset {
        Dataset::Keyed { key, fields, .. } => {
            if key_name != key {
                bail!(
                    "key name \"{}\" does not match the dataset key \"{}\"",
                    key_name,
                    key
                );
            }
            match query::lookup_keyed(&dataset, key_value)? {
                Some(value) => println!("{}", object_json(&query::to_object(value, fields))),
                None => println!("null"),
            }
        }
        Dataset::Serialized { fields, .. } => {
            match query::lookup_serialized(&dataset, key_name, key_value)? {
                Some(row) => println!("{}", object_json(&query::row_to_object(row, fields))),
                None => println!("null"),
            }
        }
        Dataset::Flat { fields, .. } => {
            if !fields.iter().any(|field| field == key_name) {
                bail!(
                    "key \"{}\" not found in dataset fields: {}",
                    key_name,
                    fields.join(", ")
                );
            }
            for row in query::lookup_flat(&dataset, key_name, key_value) {
                println!("{}", object_json(&query::row_to_object(row, fields)));
            }
        }
    }
    Ok(())
}
