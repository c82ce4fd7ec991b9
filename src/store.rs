//! Append-only persistence of sampled trajectory rows.
//!
//! The format is a small CSV dialect: a header `step,<res1>,<res2>,…` followed by
//! one line per recorded step. Every row is formatted in full, handed to the
//! sink in a single write and flushed before `append` returns, so a row is
//! either durable or absent. A reader that finds a trailing line without its
//! newline treats it as an interrupted write and drops it.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::CoffeeError;
use crate::types::ResolutionCatalogue;

/// The append-only results sink of one engine.
pub struct TrajectoryStore {
    writer: Box<dyn Write + Send>,
    location: Option<PathBuf>,
    columns: Vec<String>,
    rows_written: usize,
    last_step: Option<u64>,
    /// Set by the first failed write. A failed store refuses further rows.
    failed: bool,
}

impl TrajectoryStore {
    /// Default file name for a run: `<variant>_<initial>_n<n>.csv`.
    pub fn default_file_name(variant: &str, initial: &str, n: usize) -> String {
        format!("{}_{}_n{}.csv", variant, initial, n)
    }

    /// Creates (truncating) a file sink at `path` and writes the header.
    pub fn create(path: &Path, catalogue: &ResolutionCatalogue) -> Result<Self, CoffeeError> {
        let file = File::create(path).map_err(|source| CoffeeError::Persistence {
            location: path.display().to_string(),
            source,
        })?;
        Self::open(Box::new(file), Some(path.to_path_buf()), catalogue)
    }

    /// Backs a store with an arbitrary writer. The header is written immediately.
    pub fn from_writer(
        writer: Box<dyn Write + Send>,
        catalogue: &ResolutionCatalogue,
    ) -> Result<Self, CoffeeError> {
        Self::open(writer, None, catalogue)
    }

    fn open(
        writer: Box<dyn Write + Send>,
        location: Option<PathBuf>,
        catalogue: &ResolutionCatalogue,
    ) -> Result<Self, CoffeeError> {
        let mut store = Self {
            writer,
            location,
            columns: catalogue.names(),
            rows_written: 0,
            last_step: None,
            failed: false,
        };
        let header = format!("step,{}\n", store.columns.join(","));
        store.write_line(&header)?;
        Ok(store)
    }

    /// Persists one sampled row.
    ///
    /// # Errors
    /// `Persistence` if the sink fails, or failed on an earlier row.
    /// `InternalError` if the row does not match the header width or does not
    /// advance the step.
    pub fn append(&mut self, step: u64, values: &[usize]) -> Result<(), CoffeeError> {
        if values.len() != self.columns.len() {
            return Err(CoffeeError::InternalError(format!(
                "row for step {} has {} values, store has {} columns",
                step,
                values.len(),
                self.columns.len()
            )));
        }
        if self.last_step.is_some_and(|last| step <= last) {
            return Err(CoffeeError::InternalError(format!(
                "row for step {} does not follow step {:?}",
                step, self.last_step
            )));
        }

        let mut line = step.to_string();
        for value in values {
            let _ = write!(line, ",{}", value);
        }
        line.push('\n');

        self.write_line(&line)?;
        self.rows_written += 1;
        self.last_step = Some(step);
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<(), CoffeeError> {
        if self.failed {
            return Err(CoffeeError::Persistence {
                location: self.location_label(),
                source: std::io::Error::other("an earlier write to this store failed"),
            });
        }
        let written = self
            .writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.flush());
        if let Err(source) = written {
            self.failed = true;
            return Err(CoffeeError::Persistence {
                location: self.location_label(),
                source,
            });
        }
        Ok(())
    }

    /// Whether a write has failed. No row is accepted afterwards.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    fn location_label(&self) -> String {
        match &self.location {
            Some(path) => path.display().to_string(),
            None => "<writer>".to_string(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}

impl std::fmt::Debug for TrajectoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrajectoryStore")
            .field("location", &self.location_label())
            .field("columns", &self.columns)
            .field("rows_written", &self.rows_written)
            .finish()
    }
}

//==================================================================================
// Read-back
//==================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub step: u64,
    pub values: Vec<usize>,
}

/// A trajectory file as read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTrajectory {
    pub columns: Vec<String>,
    pub rows: Vec<StoredRow>,
}

impl StoredTrajectory {
    /// The values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<usize>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r.values[idx]).collect())
    }
}

/// Parses a trajectory written by `TrajectoryStore`.
///
/// # Errors
/// `StoreFormat` for a missing header, a row whose width disagrees with the
/// header, or an unparsable field.
pub fn read_rows<R: Read>(mut reader: R) -> Result<StoredTrajectory, CoffeeError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let mut lines: Vec<&str> = text.split('\n').collect();
    // Whatever follows the last newline is an unfinished write.
    if let Some(partial) = lines.pop() {
        if !partial.is_empty() {
            log::warn!("ignoring incomplete trailing row: {:?}", partial);
        }
    }

    let mut lines = lines.into_iter();
    let header = lines
        .next()
        .ok_or_else(|| CoffeeError::StoreFormat("missing header line".to_string()))?;
    let columns: Vec<String> = match header.strip_prefix("step,") {
        Some(rest) => rest.split(',').map(str::to_string).collect(),
        None => {
            return Err(CoffeeError::StoreFormat(format!(
                "header must start with 'step,', got {:?}",
                header
            )))
        }
    };

    let mut rows = Vec::new();
    for (lineno, line) in lines.enumerate() {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != columns.len() + 1 {
            return Err(CoffeeError::StoreFormat(format!(
                "row {} has {} fields, header has {}",
                lineno + 1,
                fields.len(),
                columns.len() + 1
            )));
        }
        let parse_err = |field: &str| {
            CoffeeError::StoreFormat(format!("row {}: invalid number {:?}", lineno + 1, field))
        };
        let step = fields[0].parse::<u64>().map_err(|_| parse_err(fields[0]))?;
        let values = fields[1..]
            .iter()
            .map(|f| f.parse::<usize>().map_err(|_| parse_err(f)))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(StoredRow { step, values });
    }

    Ok(StoredTrajectory { columns, rows })
}

/// Reads the trajectory file at `path`.
pub fn read_file(path: &Path) -> Result<StoredTrajectory, CoffeeError> {
    read_rows(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Resolution;
    use std::sync::{Arc, Mutex};

    /// An in-memory sink that can be inspected after the store is dropped.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_header_and_rows() {
        let buffer = SharedBuffer::default();
        let mut store =
            TrajectoryStore::from_writer(Box::new(buffer.clone()), &ResolutionCatalogue::default())
                .unwrap();
        store.append(4, &[120, 30]).unwrap();
        store.append(8, &[150, 31]).unwrap();
        assert_eq!(store.rows_written(), 2);

        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "step,fine,coarse_7\n4,120,30\n8,150,31\n");
    }

    #[test]
    fn test_append_rejects_wrong_width_and_non_increasing_step() {
        let mut store = TrajectoryStore::from_writer(
            Box::new(SharedBuffer::default()),
            &ResolutionCatalogue::default(),
        )
        .unwrap();
        assert!(store.append(1, &[1]).is_err());
        store.append(2, &[1, 2]).unwrap();
        assert!(store.append(2, &[1, 2]).is_err());
        assert_eq!(store.rows_written(), 1);
    }

    /// Fails exactly the `fail_at`-th write (1-based), succeeds otherwise.
    #[derive(Clone)]
    struct FlakySink {
        buffer: SharedBuffer,
        writes: Arc<Mutex<usize>>,
        fail_at: usize,
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let mut writes = self.writes.lock().unwrap();
            *writes += 1;
            if *writes == self.fail_at {
                return Err(std::io::Error::other("transient failure"));
            }
            self.buffer.write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_store_refuses_rows_after_a_failed_write() {
        let sink = FlakySink {
            buffer: SharedBuffer::default(),
            writes: Arc::default(),
            fail_at: 3,
        };
        let mut store =
            TrajectoryStore::from_writer(Box::new(sink.clone()), &ResolutionCatalogue::default())
                .unwrap();
        store.append(1, &[10, 1]).unwrap();
        assert!(matches!(
            store.append(2, &[11, 1]),
            Err(CoffeeError::Persistence { .. })
        ));
        assert!(store.has_failed());
        // The sink would accept this write, but the store must not.
        assert!(matches!(
            store.append(3, &[12, 1]),
            Err(CoffeeError::Persistence { .. })
        ));
        assert_eq!(store.rows_written(), 1);

        let text = String::from_utf8(sink.buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "step,fine,coarse_7\n1,10,1\n");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("int_updown_n10.csv");
        let catalogue =
            ResolutionCatalogue::new(vec![Resolution::Fine, Resolution::Coarse { block: 3 }])
                .unwrap();
        {
            let mut store = TrajectoryStore::create(&path, &catalogue).unwrap();
            assert_eq!(store.location(), Some(path.as_path()));
            store.append(1, &[10, 2]).unwrap();
            store.append(2, &[11, 3]).unwrap();
        }
        let stored = read_file(&path).unwrap();
        assert_eq!(stored.columns, vec!["fine", "coarse_3"]);
        assert_eq!(stored.rows.len(), 2);
        assert_eq!(stored.column("coarse_3"), Some(vec![2, 3]));
        assert_eq!(stored.rows[1].step, 2);
    }

    #[test]
    fn test_read_ignores_partial_trailing_line() {
        let text = "step,fine\n1,10\n2,12\n3,1";
        let stored = read_rows(text.as_bytes()).unwrap();
        assert_eq!(stored.rows.len(), 2);
        assert_eq!(stored.rows[1], StoredRow { step: 2, values: vec![12] });
    }

    #[test]
    fn test_read_rejects_width_mismatch() {
        let text = "step,fine,coarse_7\n1,10\n";
        assert!(matches!(read_rows(text.as_bytes()), Err(CoffeeError::StoreFormat(_))));
        assert!(matches!(read_rows("".as_bytes()), Err(CoffeeError::StoreFormat(_))));
    }

    #[test]
    fn test_create_in_missing_directory_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");
        match TrajectoryStore::create(&path, &ResolutionCatalogue::default()) {
            Err(CoffeeError::Persistence { location, .. }) => assert!(location.contains("out.csv")),
            other => panic!("expected Persistence error, got {:?}", other),
        }
    }

    #[test]
    fn test_default_file_name() {
        assert_eq!(
            TrajectoryStore::default_file_name("int", "updown", 50),
            "int_updown_n50.csv"
        );
    }
}
