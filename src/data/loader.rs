//! Delimited-file ingestion
//!
//! Reads the raw bytes once, decodes them with the first encoding of an ordered
//! list that succeeds, then parses the header and records with `csv` and infers
//! one type per column.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use super::columns;
use super::frame::{Column, SalesFrame};
use crate::error::{Result, SalesMlError};

/// Encodings tried, in order, when no list is configured
pub const DEFAULT_ENCODINGS: [&str; 4] = ["utf-8", "latin1", "cp1252", "iso-8859-1"];

const NULL_TOKENS: [&str; 7] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL"];

const DATETIME_FORMATS: [&str; 3] = ["%m/%d/%Y %H:%M", "%m/%d/%Y %H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMATS: [&str; 2] = ["%m/%d/%Y", "%Y-%m-%d"];

/// Load a sales file, trying each encoding label in order
pub fn load_csv<P: AsRef<Path>>(path: P, encodings: &[String]) -> Result<SalesFrame> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;

    let (text, label) =
        decode_with_fallback(&bytes, encodings).ok_or_else(|| SalesMlError::UndecodableInput {
            path: path.display().to_string(),
            tried: encodings.join(", "),
        })?;
    info!(path = %path.display(), encoding = %label, "data file decoded");

    let frame = parse_csv(&text)?;
    info!(
        rows = frame.n_rows(),
        columns = frame.n_columns(),
        "data loaded successfully"
    );
    debug!(columns = ?frame.column_names(), "loaded columns");
    Ok(frame)
}

/// Resolve an encoding label
///
/// Accepts WHATWG labels plus the Python codec spellings found in existing
/// configs (`latin-1`, `latin_1`, `utf_8`, `iso_8859_1`).
pub fn encoding_for_label(label: &str) -> Option<&'static encoding_rs::Encoding> {
    let label = label.trim();
    let compact: String = label.chars().filter(|c| !matches!(c, '-' | '_')).collect();
    [label.to_string(), label.replace('_', "-"), compact]
        .iter()
        .find_map(|candidate| encoding_rs::Encoding::for_label(candidate.as_bytes()))
}

/// Decode `bytes` with the first label that yields valid text
pub fn decode_with_fallback(bytes: &[u8], encodings: &[String]) -> Option<(String, String)> {
    for label in encodings {
        let Some(encoding) = encoding_for_label(label) else {
            warn!(%label, "unknown encoding label, skipping");
            continue;
        };
        let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
        if had_errors {
            debug!(%label, "decode failed, trying next encoding");
            continue;
        }
        return Some((text.into_owned(), label.clone()));
    }
    None
}

/// Parse decoded CSV text into a typed frame
pub fn parse_csv(text: &str) -> Result<SalesFrame> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for record in reader.records() {
        let record = record?;
        for (idx, column) in cells.iter_mut().enumerate() {
            column.push(record.get(idx).and_then(non_null));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| infer_column(name, raw))
        .collect();
    SalesFrame::from_columns(columns)
}

fn non_null(cell: &str) -> Option<String> {
    if NULL_TOKENS.contains(&cell) {
        None
    } else {
        Some(cell.to_string())
    }
}

fn infer_column(name: String, raw: Vec<Option<String>>) -> Column {
    if name == columns::ORDER_DATE {
        let dates = raw.iter().map(|v| v.as_deref().and_then(parse_date)).collect();
        return Column::date(name, dates);
    }

    let parsed: Vec<Option<f64>> = raw
        .iter()
        .map(|v| v.as_deref().and_then(|s| s.parse::<f64>().ok()))
        .collect();
    let all_numeric = raw
        .iter()
        .zip(&parsed)
        .all(|(cell, number)| cell.is_none() || number.is_some());

    if all_numeric {
        Column::numeric(name, parsed)
    } else {
        Column::text(name, raw)
    }
}

/// Parse an order date; unparseable values become `None`
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::ColumnKind;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn default_encodings() -> Vec<String> {
        DEFAULT_ENCODINGS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_infers_column_kinds() {
        let text = "ORDERNUMBER,SALES,STATUS,ORDERDATE\n\
                    10107,2871.00,Shipped,2/24/2003 0:00\n\
                    10121,2765.90,,5/7/2003 0:00\n";
        let frame = parse_csv(text).unwrap();

        assert_eq!(frame.n_rows(), 2);
        assert_eq!(frame.column("SALES").unwrap().data.kind(), ColumnKind::Numeric);
        assert_eq!(frame.column("STATUS").unwrap().data.kind(), ColumnKind::Text);
        assert_eq!(frame.column("ORDERDATE").unwrap().data.kind(), ColumnKind::Date);
        assert_eq!(frame.text("STATUS").unwrap()[1], None);
        assert_eq!(
            frame.dates("ORDERDATE").unwrap()[0],
            NaiveDate::from_ymd_opt(2003, 2, 24)
        );
    }

    #[test]
    fn test_unparseable_date_becomes_null() {
        let frame = parse_csv("ORDERDATE,SALES\nnot a date,1\n2004-01-15,2\n").unwrap();
        let dates = frame.dates("ORDERDATE").unwrap();
        assert_eq!(dates[0], None);
        assert_eq!(dates[1], NaiveDate::from_ymd_opt(2004, 1, 15));
    }

    #[test]
    fn test_mixed_column_stays_text() {
        let frame = parse_csv("QUANTITYORDERED\n12\nmany\n").unwrap();
        assert_eq!(
            frame.column("QUANTITYORDERED").unwrap().data.kind(),
            ColumnKind::Text
        );
    }

    #[test]
    fn test_load_latin1_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        // "Société" encoded as ISO-8859-1 is not valid UTF-8
        let mut bytes = b"CUSTOMERNAME,SALES\nSoci".to_vec();
        bytes.extend_from_slice(&[0xE9]);
        bytes.extend_from_slice(b"t");
        bytes.extend_from_slice(&[0xE9]);
        bytes.extend_from_slice(b",100.5\n");
        file.write_all(&bytes).expect("write");

        let frame = load_csv(file.path(), &default_encodings()).unwrap();
        assert_eq!(frame.text("CUSTOMERNAME").unwrap()[0].as_deref(), Some("Société"));
        assert_eq!(frame.numeric("SALES").unwrap()[0], Some(100.5));
    }

    #[rstest]
    #[case("latin1", "windows-1252")]
    #[case("latin-1", "windows-1252")]
    #[case("latin_1", "windows-1252")]
    #[case(" ISO_8859_1 ", "windows-1252")]
    #[case("utf_8", "UTF-8")]
    #[case("cp1252", "windows-1252")]
    fn test_encoding_label_spellings(#[case] label: &str, #[case] expected: &str) {
        assert_eq!(encoding_for_label(label).map(|e| e.name()), Some(expected));
    }

    #[test]
    fn test_unknown_encoding_label() {
        assert!(encoding_for_label("klingon").is_none());
    }

    #[test]
    fn test_python_label_decodes_latin1_bytes() {
        let bytes = [b'S', b'o', b'c', b'i', 0xE9];
        let labels = vec!["utf-8".to_string(), "latin-1".to_string()];
        let (text, label) = decode_with_fallback(&bytes, &labels).unwrap();
        assert_eq!(text, "Socié");
        assert_eq!(label, "latin-1");
    }

    #[test]
    fn test_decode_fails_when_all_encodings_fail() {
        let bytes = [0xFF, 0xFE, 0xFD];
        let only_utf8 = vec!["utf-8".to_string()];
        assert!(decode_with_fallback(&bytes, &only_utf8).is_none());
    }

    #[test]
    fn test_load_reports_undecodable_input() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(&[0x53, 0xFF, 0x0A]).expect("write");
        let err = load_csv(file.path(), &["utf-8".to_string()]).unwrap_err();
        assert!(matches!(err, SalesMlError::UndecodableInput { .. }));
    }
}
