use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// A decompressed workbook package: internal part path → raw bytes.
pub type PartMap = HashMap<String, Vec<u8>>;

/// Extract every file entry of a workbook archive into memory, in archive
/// order.
pub fn unpack_workbook(bytes: &[u8]) -> Result<PartMap> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).context("failed to read workbook archive")?;
    let mut parts = PartMap::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("failed to access workbook entry #{}", i))?;
        if !entry.is_file() {
            continue;
        }
        let name = entry.name().to_string();
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .with_context(|| format!("failed to read {} into memory", name))?;
        parts.insert(name, buf);
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::CompressionMethod;

    fn workbook_fixture() -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options: FileOptions<'_, ()> =
                FileOptions::default().compression_method(CompressionMethod::Stored);
            writer.start_file("xl/sharedStrings.xml", options).unwrap();
            writer.write_all(b"<sst><si><t>hello</t></si></sst>").unwrap();
            writer.start_file("xl/worksheets/sheet1.xml", options).unwrap();
            writer.write_all(b"<worksheet/>").unwrap();
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn unpacks_all_parts_by_path() -> Result<()> {
        let parts = unpack_workbook(&workbook_fixture())?;
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts["xl/sharedStrings.xml"],
            b"<sst><si><t>hello</t></si></sst>"
        );
        assert!(parts.contains_key("xl/worksheets/sheet1.xml"));
        Ok(())
    }

    #[test]
    fn rejects_non_archive_bytes() {
        assert!(unpack_workbook(b"not a workbook").is_err());
    }
}
