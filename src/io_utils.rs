//! CSV decoding shared by every data source adapter.
//!
//! - **Delimiter resolution**: `.tsv` paths default to tab, everything else
//!   (including URLs) to comma, with manual override support.
//! - **Encoding**: cells are read as raw bytes and decoded via `encoding_rs`,
//!   defaulting to UTF-8. Spreadsheet exports from older office suites are
//!   often Windows-1251.
//! - **Ragged rows**: readers are flexible; hand-edited sheets routinely
//!   have rows shorter or longer than the header.

use std::{io::Read, path::Path};

use encoding_rs::{Encoding, UTF_8};
use log::warn;

use crate::{
    error::{ConfigError, SourceError},
    source::RawTable,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding, ConfigError> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| ConfigError::UnknownEncoding(value.to_string()))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

/// Decodes one cell. No BOM sniffing: a Windows-1251 cell starting with
/// "яю" shares its bytes with the UTF-16LE mark.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String, SourceError> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or(SourceError::Decode {
            encoding: encoding.name(),
        })
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> Result<Vec<String>, SourceError> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Reads a header row plus all data rows. A UTF-8 byte order mark on the
/// first header cell is dropped.
///
/// An undecodable header fails the read; an undecodable data row is
/// skipped and counted in [`RawTable::undecodable_rows`].
pub fn read_raw_table<R>(
    reader: R,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<RawTable, SourceError>
where
    R: Read,
{
    let mut reader = open_csv_reader(reader, delimiter);
    let mut headers = decode_record(reader.byte_headers()?, encoding)?;
    if let Some(first) = headers.first_mut()
        && let Some(stripped) = first.strip_prefix('\u{feff}')
    {
        *first = stripped.to_string();
    }

    let mut rows = Vec::new();
    let mut undecodable_rows = 0usize;
    let mut record = csv::ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        match decode_record(&record, encoding) {
            Ok(row) => rows.push(row),
            Err(err) => {
                // +2: header row plus 1-based sheet numbering
                let sheet_row = rows.len() + undecodable_rows + 2;
                warn!("Skipping row {sheet_row}: {err}");
                undecodable_rows += 1;
            }
        }
    }
    Ok(RawTable {
        headers,
        rows,
        undecodable_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1251;

    #[test]
    fn read_raw_table_accepts_ragged_rows() {
        let input = "Code,City,Phone\nKIC001,Aksarka\nKIC002,Salekhard,555,extra\n";
        let table = read_raw_table(input.as_bytes(), b',', UTF_8).expect("table");
        assert_eq!(table.headers, vec!["Code", "City", "Phone"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["KIC001", "Aksarka"]);
        assert_eq!(table.rows[1].len(), 4);
    }

    #[test]
    fn read_raw_table_strips_byte_order_mark() {
        let input = "\u{feff}Код;Город\n8369/067;Аксарка\n";
        let table = read_raw_table(input.as_bytes(), b';', UTF_8).expect("table");
        assert_eq!(table.headers[0], "Код");
    }

    #[test]
    fn read_raw_table_decodes_windows_1251() {
        let (encoded, _, _) = WINDOWS_1251.encode("Город\nНоябрьск\n");
        let table = read_raw_table(encoded.as_ref(), b',', WINDOWS_1251).expect("table");
        assert_eq!(table.headers, vec!["Город"]);
        assert_eq!(table.rows, vec![vec!["Ноябрьск".to_string()]]);
    }

    #[test]
    fn read_raw_table_skips_undecodable_rows() {
        let input: &[u8] = b"Code,City\nKIC001,Aksarka\nKIC002,A\xC3(\nKIC003,Salekhard\n";
        let table = read_raw_table(input, b',', UTF_8).expect("table");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["KIC003", "Salekhard"]);
        assert_eq!(table.undecodable_rows, 1);
    }

    #[test]
    fn read_raw_table_fails_on_undecodable_header() {
        let input: &[u8] = b"Co\xC3(de,City\nKIC001,Aksarka\n";
        let err = read_raw_table(input, b',', UTF_8).expect_err("bad header");
        assert!(matches!(err, SourceError::Decode { .. }));
    }

    #[test]
    fn windows_1251_cells_are_not_sniffed_as_utf16() {
        let (encoded, _, _) = WINDOWS_1251.encode("Город\nяюрта\n");
        let cell_start = encoded.iter().position(|b| *b == b'\n').expect("newline") + 1;
        assert_eq!(&encoded[cell_start..cell_start + 2], &[0xFF, 0xFE]);
        let table = read_raw_table(encoded.as_ref(), b',', WINDOWS_1251).expect("table");
        assert_eq!(table.rows, vec![vec!["яюрта".to_string()]]);
        assert_eq!(decode_bytes(&[0xFF, 0xFE], WINDOWS_1251).expect("cell"), "яю");
    }

    #[test]
    fn resolve_encoding_rejects_unknown_labels() {
        let err = resolve_encoding(Some("klingon")).expect_err("unknown label");
        assert!(err.to_string().contains("klingon"));
        assert_eq!(resolve_encoding(None).expect("default"), UTF_8);
    }

    #[test]
    fn resolve_input_delimiter_prefers_override() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), Some(b';')), b';');
    }
}
