use anyhow::Result;
use bankscraper::commands::{self, CacheOptions, GenerateOptions, LookupOptions};
use bankscraper::export::ExportFormat;
use bankscraper::pack::FIELD_NAMES;
use bankscraper::sources::{Country, DEFAULT_COUNTRIES};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "bankscraper",
    about = "Download national bank-identifier registers and pack them into lookup-ready datasets"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct CacheArgs {
    /// Clear the cache before downloading data
    #[arg(long)]
    clear_cache: bool,

    /// Disable caching of downloaded data
    #[arg(long)]
    no_cache: bool,

    /// Cache TTL in milliseconds (default: 24 hours)
    #[arg(long, value_name = "MS")]
    cache_ttl: Option<i64>,
}

impl CacheArgs {
    fn options(&self) -> CacheOptions {
        CacheOptions {
            clear_cache: self.clear_cache,
            no_cache: self.no_cache,
            ttl_ms: self.cache_ttl,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Download the original source data files
    Download {
        /// Directory for the downloaded files
        out_dir: PathBuf,

        /// Restrict to specific country codes (repeatable)
        #[arg(long = "filter-country", value_name = "CODE")]
        filter_country: Vec<String>,

        #[command(flatten)]
        cache: CacheArgs,
    },

    /// Generate packed dataset files
    Generate {
        /// Directory for the generated files
        out_dir: PathBuf,

        /// Restrict to specific country codes (repeatable)
        #[arg(long = "filter-country", value_name = "CODE")]
        filter_country: Vec<String>,

        /// Key field names driving the dataset encoding (repeatable)
        #[arg(long = "key-names", value_name = "FIELD")]
        key_names: Vec<String>,

        /// Field names to project into the dataset (repeatable)
        #[arg(long = "field-names", value_name = "FIELD")]
        field_names: Vec<String>,

        /// Output format: json, js or ts
        #[arg(long, default_value = "js")]
        format: String,

        #[command(flatten)]
        cache: CacheArgs,
    },

    /// Look up a key value in a generated dataset file
    Lookup {
        /// Dataset file produced by `generate`
        file: PathBuf,

        /// Field name to match on
        key_name: String,

        /// Field value to match
        key_value: String,

        /// Suppress progress messages
        #[arg(long)]
        quiet: bool,

        /// Log the full dataset before the lookup
        #[arg(long)]
        debug: bool,
    },
}

fn resolve_countries(filter: &[String]) -> Result<Vec<Country>> {
    if filter.is_empty() {
        return Ok(DEFAULT_COUNTRIES.to_vec());
    }
    filter
        .iter()
        .map(|code| Country::from_code(code).map_err(Into::into))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    match Cli::parse().command {
        Command::Download {
            out_dir,
            filter_country,
            cache,
        } => {
            let countries = resolve_countries(&filter_country)?;
            info!(countries = countries.len(), "download starting");
            commands::download(&out_dir, &countries, &cache.options()).await
        }
        Command::Generate {
            out_dir,
            filter_country,
            key_names,
            field_names,
            format,
            cache,
        } => {
            let countries = resolve_countries(&filter_country)?;
            let format = format.parse::<ExportFormat>()?;
            let field_names = if field_names.is_empty() {
                FIELD_NAMES.map(String::from).to_vec()
            } else {
                field_names
            };
            info!(countries = countries.len(), "generate starting");
            commands::generate(
                &out_dir,
                &countries,
                &GenerateOptions {
                    key_names,
                    field_names,
                    format,
                    cache: cache.options(),
                },
            )
            .await
        }
        Command::Lookup {
            file,
            key_name,
            key_value,
            quiet,
            debug,
        } => commands::lookup(&file, &key_name, &key_value, &LookupOptions { quiet, debug }),
    }
}
