//! HTTP plumbing shared by the national sources: scraping a publication page
//! for the current download link, and fetching/decoding the body behind it.

pub mod body;
pub mod scrape;

pub use body::{decode_latin1, decode_with_bom, download_bytes, gunzip_text};
pub use scrape::{find_download_link, scrape_download_url, DataFormat, DownloadInfo};
