use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::{QuoteStyle, WriterBuilder};

use crate::error::{AgileError, Result};

/// Row writer bound to one destination for the duration of an export.
/// Every cell is quoted and embedded quotes are doubled. Buffered rows are
/// flushed when the writer is dropped, on success and error paths alike.
pub struct CsvWriter<W: Write = File> {
    inner: csv::Writer<W>,
    rows: usize,
}

impl CsvWriter<File> {
    pub fn create<S: AsRef<str>>(path: &Path, headers: &[S]) -> Result<Self> {
        let file = File::create(path)
            .map_err(|e| AgileError::io(format!("Unable to create file [{}]", path.display()), e))?;
        Self::from_writer(file, headers)
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn from_writer<S: AsRef<str>>(writer: W, headers: &[S]) -> Result<Self> {
        let inner = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .double_quote(true)
            .quote(b'"')
            .delimiter(b',')
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        let mut writer = Self { inner, rows: 0 };
        writer.inner.write_record(headers.iter().map(|h| h.as_ref()))?;
        Ok(writer)
    }

    pub fn write_row<S: AsRef<str>>(&mut self, values: &[S]) -> Result<()> {
        self.inner.write_record(values.iter().map(|v| v.as_ref()))?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner
            .flush()
            .map_err(|e| AgileError::io("Error while flushing stream", e))
    }

    /// Data rows written so far, header excluded.
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[cfg(test)]
    pub fn into_inner(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|e| AgileError::io("Error while flushing stream", e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(headers: &[&str], rows: &[&[&str]]) -> String {
        let mut writer = CsvWriter::from_writer(Vec::new(), headers).unwrap();
        for row in rows {
            writer.write_row(*row).unwrap();
        }
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn every_cell_is_quoted() {
        let out = written(&["Name", "Owner"], &[&["Login", ""]]);
        assert_eq!(out, "\"Name\",\"Owner\"\n\"Login\",\"\"\n");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let out = written(&["Text"], &[&[r#"He said "hi""#]]);
        assert_eq!(out.lines().nth(1), Some(r#""He said ""hi""""#));
    }

    #[test]
    fn quoted_cells_read_back_unchanged() {
        let values = [r#"He said "hi""#, "a,b", "line\nbreak", ""];
        let out = written(&["A", "B", "C", "D"], &[&values]);

        let mut reader = csv::Reader::from_reader(out.as_bytes());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(record.iter().collect::<Vec<_>>(), values);
    }

    #[test]
    fn header_is_written_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        {
            let writer = CsvWriter::create(&path, &["FormattedID"]).unwrap();
            assert_eq!(writer.rows(), 0);
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "\"FormattedID\"\n");
    }

    #[test]
    fn rows_are_counted_and_flushed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        {
            let mut writer = CsvWriter::create(&path, &["ID"]).unwrap();
            writer.write_row(&["US1"]).unwrap();
            writer.write_row(&["US2"]).unwrap();
            assert_eq!(writer.rows(), 2);
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }
}
