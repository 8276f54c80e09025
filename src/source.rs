use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};

/// One data line from a source file: an ordered mapping of header name to
/// string value. Column sets differ per source schema, so lookups by name
/// return `None` for columns the file simply doesn't have.
#[derive(Debug, Clone)]
pub struct RawRow {
    headers: Arc<Vec<String>>,
    values: csv::StringRecord,
}

impl RawRow {
    pub fn get(&self, name: &str) -> Option<&str> {
        let idx = self.headers.iter().position(|h| h == name)?;
        self.values.get(idx)
    }

    /// Missing columns and blank values both read as absent.
    pub fn get_non_blank(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Positional access, for headerless files.
    pub fn value(&self, idx: usize) -> Option<&str> {
        self.values.get(idx)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Lazy, non-restartable reader over one CSV source file. The first line
/// names the columns when `has_headers` is set. A line whose column count
/// disagrees with the header surfaces as `Error::Parse`.
pub struct RowReader {
    path: PathBuf,
    headers: Arc<Vec<String>>,
    records: csv::StringRecordsIntoIter<std::fs::File>,
}

impl RowReader {
    pub fn open<P: AsRef<Path>>(path: P, has_headers: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(has_headers)
            .from_path(&path)
            .map_err(|e| Error::Parse {
                path: path.clone(),
                source: e,
            })?;

        let headers = if has_headers {
            let header_record = reader.headers().map_err(|e| Error::Parse {
                path: path.clone(),
                source: e,
            })?;
            header_record.iter().map(str::to_string).collect()
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            headers: Arc::new(headers),
            records: reader.into_records(),
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for RowReader {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(match record {
            Ok(values) => Ok(RawRow {
                headers: Arc::clone(&self.headers),
                values,
            }),
            Err(e) => Err(Error::Parse {
                path: self.path.clone(),
                source: e,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(contents.as_bytes())
            .expect("Failed to write temp file");
        file
    }

    #[test]
    fn test_reads_rows_by_header_name() {
        let file = write_csv("code,name,city\nLGA,LaGuardia,New York\nSEA,Seattle-Tacoma,Seattle\n");
        let reader = RowReader::open(file.path(), true).expect("Failed to open CSV");
        assert_eq!(reader.headers(), ["code", "name", "city"]);

        let rows: Vec<RawRow> = reader.collect::<Result<_>>().expect("Failed to read rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("code"), Some("LGA"));
        assert_eq!(rows[0].get("city"), Some("New York"));
        assert_eq!(rows[1].get("name"), Some("Seattle-Tacoma"));
    }

    #[test]
    fn test_missing_column_is_absent_not_error() {
        let file = write_csv("code,name\nLGA,LaGuardia\n");
        let mut reader = RowReader::open(file.path(), true).expect("Failed to open CSV");
        let row = reader.next().unwrap().expect("Failed to read row");
        assert_eq!(row.get("country"), None);
        assert_eq!(row.get_non_blank("country"), None);
    }

    #[test]
    fn test_blank_value_reads_as_absent() {
        let file = write_csv("code,lat\nLGA,  \n");
        let mut reader = RowReader::open(file.path(), true).expect("Failed to open CSV");
        let row = reader.next().unwrap().expect("Failed to read row");
        assert_eq!(row.get("lat"), Some("  "));
        assert_eq!(row.get_non_blank("lat"), None);
    }

    #[test]
    fn test_inconsistent_column_count_is_parse_error() {
        let file = write_csv("code,name,city\nLGA,LaGuardia\n");
        let mut reader = RowReader::open(file.path(), true).expect("Failed to open CSV");
        match reader.next().unwrap() {
            Err(Error::Parse { .. }) => {}
            other => panic!("expected Parse error, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_unopenable_file_is_parse_error() {
        match RowReader::open("/nonexistent/stations.csv", true) {
            Err(Error::Parse { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/stations.csv"))
            }
            _ => panic!("expected Parse error"),
        }
    }

    #[test]
    fn test_quoted_fields() {
        let file = write_csv("code,city\nDCA,\"Washington, DC\"\n");
        let mut reader = RowReader::open(file.path(), true).expect("Failed to open CSV");
        let row = reader.next().unwrap().expect("Failed to read row");
        assert_eq!(row.get("city"), Some("Washington, DC"));
    }
}
