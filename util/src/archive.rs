//! CSV archiving functionality
//!
//! An `Archiver` writes serializable records as rows of a CSV file, with the header derived from
//! the record's field names. Opening an archive on a path that already exists first rotates the
//! old file out of the way by renaming it with a timestamp suffix.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::Local;
pub use csv::Writer;
use csv::WriterBuilder;
use log::info;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal imports
use crate::session::TIMESTAMP_FORMAT;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
pub struct Archiver {
    writer: Writer<File>,
    path: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Could not rotate the existing archive {0:?}: {1}")]
    RotateError(PathBuf, std::io::Error),

    #[error("Could not open the archive file: {0}")]
    OpenError(std::io::Error),

    #[error("Could not write a record: {0}")]
    WriteError(csv::Error),

    #[error("Could not flush the archive: {0}")]
    FlushError(std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Open a new archive at the given path, rotating any existing file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_path_buf();

        if path.exists() {
            let rotated = rotated_path(&path);
            fs::rename(&path, &rotated).map_err(|e| ArchiveError::RotateError(path.clone(), e))?;
            info!("Rotated previous archive to {:?}", rotated);
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(ArchiveError::OpenError)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(ArchiveError::OpenError)?;

        let writer = WriterBuilder::new().has_headers(true).from_writer(file);

        Ok(Self { writer, path })
    }

    /// Serialise a record into the archive and flush it to disk.
    pub fn serialise<T: Serialize>(&mut self, record: T) -> Result<(), ArchiveError> {
        self.writer
            .serialize(record)
            .map_err(ArchiveError::WriteError)?;
        self.writer.flush().map_err(ArchiveError::FlushError)
    }

    /// Path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the rotation target `<stem>_<timestamp>.<ext>`, adding a counter if that already exists.
fn rotated_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let timestamp = Local::now().format(TIMESTAMP_FORMAT);

    let mut candidate = path.with_file_name(format!("{}_{}{}", stem, timestamp, ext));
    let mut n = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{}_{}_{}{}", stem, timestamp, n, ext));
        n += 1;
    }

    candidate
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        a: f64,
        b: String,
    }

    fn tmp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("util_archive_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_header_and_rows() {
        let dir = tmp_dir("rows");
        let path = dir.join("meas.csv");

        let mut arch = Archiver::from_path(&path).unwrap();
        arch.serialise(Row { a: 1.5, b: "{\"x\":1}".into() }).unwrap();
        drop(arch);

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("a,b"));
        assert_eq!(lines.next(), Some("1.5,\"{\"\"x\"\":1}\""));
    }

    #[test]
    fn test_rotation() {
        let dir = tmp_dir("rotate");
        let path = dir.join("meas.csv");
        fs::write(&path, "old").unwrap();

        let arch = Archiver::from_path(&path).unwrap();
        assert_eq!(arch.path(), path.as_path());

        let rotated: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("meas_") && n.ends_with(".csv"))
            .collect();
        assert_eq!(rotated.len(), 1);
        assert_eq!(fs::read_to_string(dir.join(&rotated[0])).unwrap(), "old");
    }
}
