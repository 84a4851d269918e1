//! Narrow decoder for spreadsheet workbook packages: enough to pull string
//! cells out of one worksheet, nothing more.

pub mod archive;
pub mod worksheet;

pub use archive::{unpack_workbook, PartMap};
pub use worksheet::{parse_rows, parse_shared_strings, shared_strings, sheet_xml, SheetError};
