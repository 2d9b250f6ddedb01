//! Encoding resolution and CSV reader construction.
//!
//! Extracts are single-byte legacy text; `resolve_encoding` maps a label to an
//! `encoding_rs` codec and `decode_bytes` rejects input that does not decode
//! cleanly. CSV parsing is strict: a header row is required and every record
//! must have the header's field count.

use std::io::Read;

use anyhow::{Result, anyhow};
use encoding_rs::Encoding;

use crate::config::DEFAULT_INPUT_ENCODING;

pub const CSV_DELIMITER: u8 = b',';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    let value = label.unwrap_or(DEFAULT_INPUT_ENCODING);
    Encoding::for_label(value.trim().as_bytes())
        .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn open_csv_reader<R>(reader: R) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(CSV_DELIMITER)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_8, WINDOWS_1252};

    #[test]
    fn default_encoding_is_windows_1252() {
        assert_eq!(resolve_encoding(None).unwrap(), WINDOWS_1252);
        assert_eq!(resolve_encoding(Some("cp1252")).unwrap(), WINDOWS_1252);
        assert_eq!(resolve_encoding(Some(" utf-8 ")).unwrap(), UTF_8);
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let err = resolve_encoding(Some("klingon")).unwrap_err();
        assert!(err.to_string().contains("Unknown encoding 'klingon'"));
    }

    #[test]
    fn windows_1252_bytes_decode() {
        let decoded = decode_bytes(b"Caf\xe9 \x93quoted\x94", WINDOWS_1252).unwrap();
        assert_eq!(decoded, "Café \u{201c}quoted\u{201d}");
    }

    #[test]
    fn invalid_utf8_fails_to_decode() {
        assert!(decode_bytes(b"ok \xc3\x28", UTF_8).is_err());
    }

    #[test]
    fn reader_rejects_ragged_rows() {
        let data = "a,b\n1,2\n3\n";
        let mut reader = open_csv_reader(data.as_bytes());
        let results = reader.records().collect::<Vec<_>>();
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
