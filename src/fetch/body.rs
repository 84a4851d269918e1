use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use flate2::read::GzDecoder;
use reqwest::Client;
use std::io::Read;

/// Fetch a URL and return the raw response body.
pub async fn download_bytes(client: &Client, url: &str) -> Result<Vec<u8>> {
    let resp = client.get(url).send().await?.error_for_status()?;
    let bytes = resp
        .bytes()
        .await
        .with_context(|| format!("downloading {}", url))?;
    Ok(bytes.to_vec())
}

/// Several national registers still publish Latin-1. Decode it the way a
/// browser would (windows-1252 is the web's reading of iso-8859-1).
pub fn decode_latin1(bytes: &[u8]) -> String {
    let (text, _, _) = WINDOWS_1252.decode(bytes);
    text.into_owned()
}

/// Decode text that may open with a UTF-16 byte-order mark; UTF-8 otherwise.
pub fn decode_with_bom(bytes: &[u8]) -> String {
    let encoding: &'static Encoding = match bytes {
        [0xFF, 0xFE, ..] => UTF_16LE,
        [0xFE, 0xFF, ..] => UTF_16BE,
        _ => UTF_8,
    };
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Decompress a gzip file body and decode the result. Needed for sources
/// that ship `.gz` files as-is, where transport-level decompression never
/// kicks in.
pub fn gunzip_text(bytes: &[u8]) -> Result<String> {
    let mut decoder = GzDecoder::new(bytes);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .context("decompressing gzip body")?;
    Ok(decode_with_bom(&decompressed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn latin1_umlauts_decode() {
        // "Straße" in iso-8859-1
        let bytes = [0x53, 0x74, 0x72, 0x61, 0xDF, 0x65];
        assert_eq!(decode_latin1(&bytes), "Straße");
    }

    #[test]
    fn bom_selects_utf16() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "BIC".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_with_bom(&bytes), "BIC");
        assert_eq!(decode_with_bom("plain".as_bytes()), "plain");
    }

    #[test]
    fn gunzip_round_trips() -> Result<()> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all("RIAD_CODE\tBIC\nFR123\tAGRIFRPP\n".as_bytes())?;
        let compressed = encoder.finish()?;
        assert_eq!(gunzip_text(&compressed)?, "RIAD_CODE\tBIC\nFR123\tAGRIFRPP\n");
        Ok(())
    }

    #[test]
    fn gunzip_rejects_plain_bytes() {
        assert!(gunzip_text(b"not gzip").is_err());
    }
}
