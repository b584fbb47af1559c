//! Tabular input and the resumable result file.
//!
//! The output file is a CSV with the header `authors,title,year,dric`. Data
//! row `i` always belongs to input row `i`. Rows are appended one at a time,
//! each serialized in memory first and written with a single `write_all`
//! followed by `sync_data`, so an interrupted run leaves a prefix of complete
//! rows plus at most one unterminated tail, which is never counted as done.

use serde::de::DeserializeOwned;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::models::{OutputRow, PublicationRecord};

/// Errors reading the input table or maintaining the output file
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Resume position {start_row} is beyond the {existing} complete rows in {path}")]
    StartBeyondEnd {
        path: PathBuf,
        start_row: usize,
        existing: usize,
    },

    #[error("{path} does not look like a result file (header {found:?})")]
    HeaderMismatch { path: PathBuf, found: Vec<String> },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn csv(path: &Path, source: csv::Error) -> Self {
        StoreError::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read every publication record of an input table
pub fn read_records(path: &Path) -> Result<Vec<PublicationRecord>, StoreError> {
    read_table(path)
}

/// Read the rows of a result file
pub fn read_rows(path: &Path) -> Result<Vec<OutputRow>, StoreError> {
    read_table(path)
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| StoreError::csv(path, e))?;

    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| StoreError::csv(path, e))
}

/// Layout of an existing result file
#[derive(Debug, Default)]
struct Layout {
    /// Byte offset where each data row starts, in order
    row_starts: Vec<u64>,
    /// Number of newline-terminated data rows
    complete: usize,
    /// Total file length
    len: u64,
    /// File is empty or has no header
    headerless: bool,
}

impl Layout {
    /// Offset at which data row `row` starts (or would start)
    fn offset_of(&self, row: usize) -> u64 {
        self.row_starts.get(row).copied().unwrap_or(self.len)
    }
}

fn scan(path: &Path) -> Result<Option<Layout>, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let mut layout = Layout {
        len: bytes.len() as u64,
        ..Layout::default()
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let mut record = csv::ByteRecord::new();
    let mut seen_header = false;
    let mut valid = 0;
    while reader
        .read_byte_record(&mut record)
        .map_err(|e| StoreError::csv(path, e))?
    {
        if !seen_header {
            let found: Vec<String> = record
                .iter()
                .map(|field| String::from_utf8_lossy(field).trim().to_string())
                .collect();
            if found != OutputRow::HEADER {
                return Err(StoreError::HeaderMismatch {
                    path: path.to_path_buf(),
                    found,
                });
            }
            seen_header = true;
            continue;
        }
        if let Some(position) = record.position() {
            layout.row_starts.push(position.byte());
        }
        // A torn tail can still parse, e.g. an unclosed quote swallowing the newline
        if valid + 1 == layout.row_starts.len() && is_complete_row(&record) {
            valid += 1;
        }
    }

    layout.headerless = !seen_header;
    layout.complete = valid;
    if valid > 0 && valid == layout.row_starts.len() && !bytes.ends_with(b"\n") {
        layout.complete -= 1;
    }

    Ok(Some(layout))
}

fn is_complete_row(record: &csv::ByteRecord) -> bool {
    record.len() == OutputRow::HEADER.len() && record.deserialize::<OutputRow>(None).is_ok()
}

/// Number of complete data rows in a result file (0 when it does not exist)
pub fn completed_rows(path: &Path) -> Result<usize, StoreError> {
    Ok(scan(path)?.map(|layout| layout.complete).unwrap_or(0))
}

/// Writer over the result file, positioned at the next row to write
#[derive(Debug)]
pub struct ResultWriter {
    path: PathBuf,
    file: File,
    next_row: usize,
}

impl ResultWriter {
    /// Open the result file.
    ///
    /// Without `start_row` the file is created or truncated and a header is
    /// written. With `start_row = N`, rows `[0, N)` must already be complete
    /// in the file; they are kept byte-for-byte and everything after them is
    /// discarded, so the next write lands at row `N`.
    pub fn open(path: &Path, start_row: Option<usize>) -> Result<Self, StoreError> {
        let Some(start_row) = start_row else {
            return Self::create(path);
        };

        let layout = match scan(path)? {
            Some(layout) if !layout.headerless => layout,
            _ if start_row == 0 => return Self::create(path),
            _ => {
                return Err(StoreError::StartBeyondEnd {
                    path: path.to_path_buf(),
                    start_row,
                    existing: 0,
                })
            }
        };

        if start_row > layout.complete {
            return Err(StoreError::StartBeyondEnd {
                path: path.to_path_buf(),
                start_row,
                existing: layout.complete,
            });
        }

        let offset = layout.offset_of(start_row);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        file.set_len(offset).map_err(|e| StoreError::io(path, e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| StoreError::io(path, e))?;

        if offset > 0 && !ends_with_newline(&mut file, offset).map_err(|e| StoreError::io(path, e))? {
            file.write_all(b"\n").map_err(|e| StoreError::io(path, e))?;
        }

        let discarded = layout.row_starts.len() - start_row;
        tracing::info!(
            "Resuming {} at row {} ({} later rows discarded)",
            path.display(),
            start_row,
            discarded
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_row: start_row,
        })
    }

    fn create(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let file = File::create(path).map_err(|e| StoreError::io(path, e))?;
        let mut writer = Self {
            path: path.to_path_buf(),
            file,
            next_row: 0,
        };

        let mut header = csv::Writer::from_writer(Vec::new());
        header
            .write_record(OutputRow::HEADER)
            .map_err(|e| StoreError::csv(path, e))?;
        let bytes = header
            .into_inner()
            .map_err(|e| StoreError::io(path, e.into_error()))?;
        writer.write_atomic(&bytes)?;

        Ok(writer)
    }

    /// Index of the row the next [`write_row`](Self::write_row) will produce
    pub fn next_row(&self) -> usize {
        self.next_row
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one complete row and make it durable
    pub fn write_row(&mut self, row: &OutputRow) -> Result<(), StoreError> {
        let mut buffer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        buffer
            .serialize(row)
            .map_err(|e| StoreError::csv(&self.path, e))?;
        let bytes = buffer
            .into_inner()
            .map_err(|e| StoreError::io(&self.path, e.into_error()))?;

        self.write_atomic(&bytes)?;
        self.next_row += 1;
        Ok(())
    }

    fn write_atomic(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        self.file
            .write_all(bytes)
            .and_then(|_| self.file.flush())
            .and_then(|_| self.file.sync_data())
            .map_err(|e| StoreError::io(&self.path, e))
    }
}

fn ends_with_newline(file: &mut File, offset: u64) -> std::io::Result<bool> {
    use std::io::Read;

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(offset - 1))?;
    file.read_exact(&mut last)?;
    file.seek(SeekFrom::Start(offset))?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Label;
    use tempfile::tempdir;

    fn row(title: &str, dric: Label) -> OutputRow {
        OutputRow {
            authors: "K Mensah, A Owusu".to_string(),
            title: title.to_string(),
            year: 2017,
            dric,
        }
    }

    fn write_rows(path: &Path, rows: &[OutputRow]) {
        let mut writer = ResultWriter::open(path, None).unwrap();
        for row in rows {
            writer.write_row(row).unwrap();
        }
    }

    #[test]
    fn test_fresh_file_has_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        write_rows(&path, &[row("A", Label::Yes), row("B, with comma", Label::Nf)]);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("authors,title,year,dric\n"));
        assert!(content.contains("\"B, with comma\",2017,NF\n"));
        assert_eq!(read_rows(&path).unwrap().len(), 2);
        assert_eq!(completed_rows(&path).unwrap(), 2);
    }

    #[test]
    fn test_fresh_open_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_rows(&path, &[row("A", Label::Yes)]);

        ResultWriter::open(&path, None).unwrap();
        assert_eq!(completed_rows(&path).unwrap(), 0);
    }

    #[test]
    fn test_resume_preserves_prefix_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_rows(
            &path,
            &[row("A", Label::Yes), row("B", Label::No), row("C", Label::Nf)],
        );
        let before = std::fs::read(&path).unwrap();
        let prefix_len = before.len() - "\"K Mensah, A Owusu\",C,2017,NF\n".len();

        let mut writer = ResultWriter::open(&path, Some(2)).unwrap();
        assert_eq!(writer.next_row(), 2);
        writer.write_row(&row("C2", Label::Yes)).unwrap();

        let after = std::fs::read(&path).unwrap();
        assert_eq!(&after[..prefix_len], &before[..prefix_len]);

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].title, "C2");
        assert_eq!(rows[2].dric, Label::Yes);
    }

    #[test]
    fn test_resume_discards_rows_after_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_rows(&path, &[row("A", Label::Yes), row("B", Label::No), row("C", Label::No)]);

        ResultWriter::open(&path, Some(1)).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "A");
    }

    #[test]
    fn test_resume_at_end_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_rows(&path, &[row("A", Label::Yes)]);

        let mut writer = ResultWriter::open(&path, Some(1)).unwrap();
        writer.write_row(&row("B", Label::No)).unwrap();

        let titles: Vec<_> = read_rows(&path).unwrap().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn test_start_beyond_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_rows(&path, &[row("A", Label::Yes)]);

        let err = ResultWriter::open(&path, Some(5)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::StartBeyondEnd {
                start_row: 5,
                existing: 1,
                ..
            }
        ));
        // nothing was touched
        assert_eq!(completed_rows(&path).unwrap(), 1);
    }

    #[test]
    fn test_missing_file_resume_from_zero_creates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");

        let writer = ResultWriter::open(&path, Some(0)).unwrap();
        assert_eq!(writer.next_row(), 0);
        assert!(path.exists());

        let missing = dir.path().join("missing.csv");
        assert!(matches!(
            ResultWriter::open(&missing, Some(1)),
            Err(StoreError::StartBeyondEnd { existing: 0, .. })
        ));
    }

    #[test]
    fn test_unterminated_tail_is_not_complete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(
            &path,
            "authors,title,year,dric\nX,A,2017,YES\nX,B,2017,NO\nX,C,20",
        )
        .unwrap();

        assert_eq!(completed_rows(&path).unwrap(), 2);
        assert!(ResultWriter::open(&path, Some(3)).is_err());

        let mut writer = ResultWriter::open(&path, Some(2)).unwrap();
        writer.write_row(&row("C", Label::Nf)).unwrap();
        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].dric, Label::Nf);
    }

    #[test]
    fn test_torn_quoted_tail_is_not_complete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(
            &path,
            "authors,title,year,dric\nX,A,2017,YES\nX,B,2017,NO\nX,\"Line one\n",
        )
        .unwrap();

        assert_eq!(completed_rows(&path).unwrap(), 2);
        assert!(matches!(
            ResultWriter::open(&path, Some(3)),
            Err(StoreError::StartBeyondEnd { existing: 2, .. })
        ));

        let mut writer = ResultWriter::open(&path, Some(2)).unwrap();
        writer.write_row(&row("C", Label::Yes)).unwrap();
        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].title, "C");
    }

    #[test]
    fn test_missing_final_newline_is_added() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "authors,title,year,dric\nX,A,2017,YES\n").unwrap();

        let mut writer = ResultWriter::open(&path, Some(1)).unwrap();
        writer.write_row(&row("B", Label::No)).unwrap();
        assert_eq!(read_rows(&path).unwrap().len(), 2);

        std::fs::write(&path, "authors,title,year,dric").unwrap();
        let mut writer = ResultWriter::open(&path, Some(0)).unwrap();
        writer.write_row(&row("A", Label::No)).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("authors,title,year,dric\n"));
        assert_eq!(read_rows(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_foreign_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        assert!(matches!(
            ResultWriter::open(&path, Some(1)),
            Err(StoreError::HeaderMismatch { .. })
        ));
    }

    #[test]
    fn test_read_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(
            &path,
            "authors,title,year,scholar_link\n\"Mensah, K\",Study X,2017,https://scholar.google.com/a\nOwusu A,Study Y,2018,https://scholar.google.com/b\n",
        )
        .unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].authors, "Mensah, K");
        assert_eq!(records[1].year, 2018);
    }

    #[test]
    fn test_read_records_bad_year_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(&path, "authors,title,year,scholar_link\nA,B,unknown,https://x\n").unwrap();

        assert!(matches!(read_records(&path), Err(StoreError::Csv { .. })));
    }
}
