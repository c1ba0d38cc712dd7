//! CSV file source with encoding and delimiter auto-detection.
//!
//! The file is read and parsed eagerly on every `open()`, so the file handle
//! is released before iteration starts and early iterator drop never leaks a
//! descriptor.

use serde_json::Value;
use std::path::{Path, PathBuf};

use super::{Record, RecordSource};
use crate::error::{SourceError, SourceResult};

/// File-backed CSV source.
///
/// Delimiter and encoding are auto-detected unless set explicitly. Headerless
/// files need a provided header row.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    delimiter: Option<u8>,
    has_header: bool,
    provided_headers: Option<Vec<String>>,
}

impl CsvSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter: None,
            has_header: true,
            provided_headers: None,
        }
    }

    /// Set an explicit field delimiter instead of auto-detecting one.
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter as u8);
        self
    }

    /// Declare whether the first row is a header row (default: true).
    pub fn has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Provide column names, e.g. for headerless files. When the file also
    /// has a header row, the provided names replace it.
    pub fn provide_headers(mut self, headers: Vec<String>) -> Self {
        self.provided_headers = Some(headers);
        self
    }
}

impl RecordSource for CsvSource {
    fn open(&self) -> SourceResult<Box<dyn Iterator<Item = Record>>> {
        let bytes = std::fs::read(&self.path)?;
        if bytes.is_empty() {
            return Err(SourceError::Empty);
        }

        let encoding = detect_encoding(&bytes);
        let content = decode_content(&bytes, &encoding);
        let delimiter = self.delimiter.unwrap_or_else(|| detect_delimiter(&content));
        log::debug!(
            "parsing {} (encoding {encoding}, delimiter {:?})",
            self.path.display(),
            delimiter as char
        );

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut rows = reader.records();
        let headers: Vec<String> = match &self.provided_headers {
            Some(headers) => {
                if self.has_header {
                    // consume and discard the file's own header row
                    rows.next().transpose()?;
                }
                headers.clone()
            }
            None if self.has_header => rows
                .next()
                .transpose()?
                .ok_or(SourceError::Empty)?
                .iter()
                .map(|cell| cell.trim().to_string())
                .collect(),
            None => return Err(SourceError::MissingHeader),
        };

        let mut records = Vec::new();
        for row in rows {
            let row = row?;
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            let record: Record = headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    let cell = row.get(i).map(str::trim).unwrap_or("");
                    (header.clone(), Value::String(cell.to_string()))
                })
                .collect();
            records.push(record);
        }

        Ok(Box::new(records.into_iter()))
    }
}

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _, _) = chardet::detect(bytes);
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string using the detected encoding.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting candidates in the first line.
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");

    let candidates = [b',', b';', b'\t', b'|'];
    let mut best = b',';
    let mut best_count = 0;

    for &candidate in &candidates {
        let count = first_line.matches(candidate as char).count();
        if count > best_count {
            best_count = count;
            best = candidate;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_simple_csv() {
        let file = csv_file("FirstName,Surname\njoe,Bloggs\njane,Doe\n");
        let records: Vec<Record> = CsvSource::new(file.path()).open().unwrap().collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["FirstName"], "joe");
        assert_eq!(records[1]["Surname"], "Doe");
    }

    #[test]
    fn test_detects_semicolon_delimiter() {
        let file = csv_file("a;b;c\n1;2;3\n");
        let records: Vec<Record> = CsvSource::new(file.path()).open().unwrap().collect();

        assert_eq!(records[0]["b"], "2");
    }

    #[test]
    fn test_headerless_with_provided_headers() {
        let file = csv_file("joe,Bloggs\njane,Doe\n");
        let source = CsvSource::new(file.path())
            .has_header(false)
            .provide_headers(vec!["FirstName".into(), "Surname".into()]);

        let records: Vec<Record> = source.open().unwrap().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["FirstName"], "joe");
    }

    #[test]
    fn test_headerless_without_headers_is_an_error() {
        let file = csv_file("joe,Bloggs\n");
        let result = CsvSource::new(file.path()).has_header(false).open();
        assert!(matches!(result, Err(SourceError::MissingHeader)));
    }

    #[test]
    fn test_provided_headers_replace_file_header() {
        let file = csv_file("Prenom,Nom\njoe,Bloggs\n");
        let source = CsvSource::new(file.path())
            .provide_headers(vec!["FirstName".into(), "Surname".into()]);

        let records: Vec<Record> = source.open().unwrap().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["Surname"], "Bloggs");
    }

    #[test]
    fn test_empty_file() {
        let file = csv_file("");
        assert!(matches!(
            CsvSource::new(file.path()).open(),
            Err(SourceError::Empty)
        ));
    }

    #[test]
    fn test_blank_rows_skipped() {
        let file = csv_file("a,b\n1,2\n,\n3,4\n");
        let records: Vec<Record> = CsvSource::new(file.path()).open().unwrap().collect();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_short_rows_padded() {
        let file = csv_file("a,b,c\n1,2\n");
        let records: Vec<Record> = CsvSource::new(file.path()).open().unwrap().collect();
        assert_eq!(records[0]["c"], "");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert!(decoded.contains("Soci"));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), b',');
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), b';');
        assert_eq!(detect_delimiter("a\tb\tc"), b'\t');
        assert_eq!(detect_delimiter("a|b|c"), b'|');
    }
}
