use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::PartMap;

pub const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SheetError {
    #[error("workbook part not found: {0}")]
    PartNotFound(String),
}

static SI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<si>(.*?)</si>").expect("string-item pattern should be valid"));
static TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<t[^>]*>(.*?)</t>").expect("text-run pattern should be valid"));
static ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<row[^>]*>(.*?)</row>").expect("row pattern should be valid"));
// Captures: attributes before the reference, column letters, attributes
// after, cell body. Robust to attribute order around r="A1".
static CELL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<c\s+([^>]*?)r="([A-Z]+)\d+"([^>]*)>(.*?)</c>"#)
        .expect("cell pattern should be valid")
});
static VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<v>(.*?)</v>").expect("cell-value pattern should be valid"));
static TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"t="([^"]+)""#).expect("cell-type pattern should be valid"));

fn part_text(parts: &PartMap, path: &str) -> Result<String, SheetError> {
    let bytes = parts
        .get(path)
        .ok_or_else(|| SheetError::PartNotFound(path.to_string()))?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Build the shared-string pool of a workbook, indexed in document order.
/// Rich-text items spread one logical string over several text runs; the runs
/// are concatenated back into one entry.
pub fn shared_strings(parts: &PartMap) -> Result<Vec<String>, SheetError> {
    let xml = part_text(parts, SHARED_STRINGS_PART)?;
    Ok(parse_shared_strings(&xml))
}

pub fn parse_shared_strings(xml: &str) -> Vec<String> {
    SI_RE
        .captures_iter(xml)
        .map(|item| {
            TEXT_RE
                .captures_iter(item.get(1).map_or("", |m| m.as_str()))
                .map(|run| run[1].to_string())
                .collect::<String>()
        })
        .collect()
}

/// Raw markup of the worksheet at `sheet_index` (1-based, conventional part
/// naming).
pub fn sheet_xml(parts: &PartMap, sheet_index: usize) -> Result<String, SheetError> {
    part_text(parts, &format!("xl/worksheets/sheet{}.xml", sheet_index))
}

/// Column letters are base-26 with A = 1, so "Z" is 25 and "AA" is 26
/// (zero-based).
fn column_index(letters: &str) -> usize {
    letters
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize)
        - 1
}

/// Materialize each row block into a dense array of cell strings. Gaps
/// between populated columns become empty strings; a row with no cells
/// becomes an empty array. Cells flagged `t="s"` hold an index into the
/// shared-string pool and are substituted, falling back to empty string when
/// the index does not resolve.
pub fn parse_rows(xml: &str, shared: Option<&[String]>) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for row_block in ROW_RE.captures_iter(xml) {
        let mut cells: Vec<(usize, String)> = Vec::new();
        for cell in CELL_RE.captures_iter(row_block.get(1).map_or("", |m| m.as_str())) {
            let attrs = format!("{} {}", &cell[1], &cell[3]);
            let col = column_index(&cell[2]);
            let mut value = VALUE_RE
                .captures(&cell[4])
                .map(|v| v[1].to_string())
                .unwrap_or_default();
            let is_shared = TYPE_RE
                .captures(&attrs)
                .is_some_and(|t| t.get(1).map_or("", |m| m.as_str()) == "s");
            if is_shared && !value.is_empty() {
                if let Some(pool) = shared {
                    value = value
                        .parse::<usize>()
                        .ok()
                        .and_then(|idx| pool.get(idx))
                        .cloned()
                        .unwrap_or_default();
                }
            }
            cells.push((col, value));
        }
        let mut row = Vec::new();
        if let Some(max_col) = cells.iter().map(|(col, _)| *col).max() {
            row.resize(max_col + 1, String::new());
            for (col, value) in cells {
                row[col] = value;
            }
        }
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_SHEET: &str = r#"
<worksheet>
  <sheetData>
    <row r="1">
      <c r="A1"><v>foo</v></c>
      <c r="B1"><v>bar</v></c>
      <c r="C1"><v>baz</v></c>
    </row>
    <row r="2">
      <c r="A2"><v>1</v></c>
      <c r="C2"><v>3</v></c>
    </row>
  </sheetData>
</worksheet>
"#;

    #[test]
    fn fills_sparse_cells_with_empty_strings() {
        let rows = parse_rows(SIMPLE_SHEET, None);
        assert_eq!(
            rows,
            vec![
                vec!["foo".to_string(), "bar".to_string(), "baz".to_string()],
                vec!["1".to_string(), String::new(), "3".to_string()],
            ]
        );
    }

    #[test]
    fn substitutes_shared_string_references() {
        let shared_xml = r#"
<sst count="2" uniqueCount="2" xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <si><t>foo</t></si>
  <si><t>bar</t></si>
</sst>
"#;
        let sheet = r#"
<worksheet><sheetData>
  <row r="1">
    <c r="A1" t="s"><v>0</v></c>
    <c r="B1" t="s"><v>1</v></c>
  </row>
</sheetData></worksheet>
"#;
        let pool = parse_shared_strings(shared_xml);
        assert_eq!(pool, vec!["foo", "bar"]);
        assert_eq!(
            parse_rows(sheet, Some(pool.as_slice())),
            vec![vec!["foo".to_string(), "bar".to_string()]]
        );
    }

    #[test]
    fn concatenates_rich_text_runs() {
        let xml = r#"<sst><si><r><t>Hello </t></r><r><t xml:space="preserve">World</t></r></si><si><t>plain</t></si></sst>"#;
        assert_eq!(parse_shared_strings(xml), vec!["Hello World", "plain"]);
    }

    #[test]
    fn unresolved_shared_index_becomes_empty() {
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>7</v></c><c r="B1"><v>x</v></c></row></sheetData></worksheet>"#;
        let pool = vec!["only".to_string()];
        assert_eq!(
            parse_rows(sheet, Some(pool.as_slice())),
            vec![vec![String::new(), "x".to_string()]]
        );
    }

    #[test]
    fn multi_letter_columns_use_base_26() {
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="AA1"><v>wide</v></c></row></sheetData></worksheet>"#;
        let rows = parse_rows(sheet, None);
        assert_eq!(rows[0].len(), 27);
        assert_eq!(rows[0][26], "wide");
        assert_eq!(rows[0][0], "");
    }

    #[test]
    fn row_without_cells_is_empty() {
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="A1"><v>x</v></c></row><row r="2"></row></sheetData></worksheet>"#;
        let rows = parse_rows(sheet, None);
        assert_eq!(rows.len(), 2);
        assert!(rows[1].is_empty());
    }

    #[test]
    fn missing_parts_are_not_found() {
        let parts = PartMap::new();
        assert_eq!(
            shared_strings(&parts),
            Err(SheetError::PartNotFound(SHARED_STRINGS_PART.to_string()))
        );
        assert_eq!(
            sheet_xml(&parts, 1),
            Err(SheetError::PartNotFound(
                "xl/worksheets/sheet1.xml".to_string()
            ))
        );
    }

    #[test]
    fn locates_sheet_by_index() {
        let mut parts = PartMap::new();
        parts.insert(
            "xl/worksheets/sheet2.xml".to_string(),
            b"<worksheet/>".to_vec(),
        );
        assert!(sheet_xml(&parts, 2).is_ok());
        assert!(sheet_xml(&parts, 1).is_err());
    }
}
