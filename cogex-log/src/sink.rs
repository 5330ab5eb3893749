use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Line-oriented CSV file that never fails its caller.
///
/// If the file cannot be created or a write fails, the log warns once and
/// keeps running detached; the in-memory records held by the logger remain
/// the complete copy.
#[derive(Debug)]
pub struct CsvLog {
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    dropped: usize,
}

impl CsvLog {
    pub fn create(path: impl AsRef<Path>, header: &str) -> Self {
        let path = path.as_ref().to_path_buf();
        let writer = File::create(&path).and_then(|file| {
            let mut writer = BufWriter::new(file);
            writeln!(writer, "{header}")?;
            Ok(writer)
        });
        match writer {
            Ok(writer) => Self {
                path: Some(path),
                writer: Some(writer),
                dropped: 0,
            },
            Err(e) => {
                warn!("cannot open log file {:?}: {}; keeping records in memory only", path, e);
                Self {
                    path: Some(path),
                    writer: None,
                    dropped: 0,
                }
            }
        }
    }

    /// A log with no backing file.
    pub fn detached() -> Self {
        Self {
            path: None,
            writer: None,
            dropped: 0,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_attached(&self) -> bool {
        self.writer.is_some()
    }

    /// Lines that were not written to disk because the file was unavailable.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn append(&mut self, line: &str) {
        let Some(writer) = self.writer.as_mut() else {
            if self.path.is_some() {
                self.dropped += 1;
            }
            return;
        };
        if let Err(e) = writeln!(writer, "{line}") {
            warn!("write to {:?} failed: {}; detaching log file", self.path, e);
            self.writer = None;
            self.dropped += 1;
        }
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                warn!("flush of {:?} failed: {}; detaching log file", self.path, e);
                self.writer = None;
            }
        }
    }
}

impl Drop for CsvLog {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_then_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("full.csv");
        let mut log = CsvLog::create(&path, "A,B");
        log.append("1,2");
        log.flush();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A,B\n1,2\n");
        assert!(log.is_attached());
    }

    #[test]
    fn unopenable_path_counts_dropped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("full.csv");
        let mut log = CsvLog::create(&path, "A,B");
        assert!(!log.is_attached());
        log.append("1,2");
        log.append("3,4");
        assert_eq!(log.dropped(), 2);
    }
}
