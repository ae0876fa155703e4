//! Zip packaging of highres pictures.
//!
//! The archive is opened before the walk starts and each rendered picture's
//! highres bytes are appended as the walk reaches it. Entry names are the
//! highres filenames, so the zip unpacks to the same names the site links to.
//! An archive that cannot be finalized is removed rather than left truncated.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Duplicate zip entry: {0}")]
    DuplicateEntry(String),
}

/// Streaming zip writer for one export run.
pub struct ZipPackager {
    path: PathBuf,
    writer: ZipWriter<BufWriter<File>>,
    entries: HashSet<String>,
}

impl ZipPackager {
    /// Create (or truncate) the archive at `path`.
    pub fn create(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::create(path)?;
        Ok(Self::from_file(path, file))
    }

    fn from_file(path: &Path, file: File) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: ZipWriter::new(BufWriter::new(file)),
            entries: HashSet::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn start_entry(&mut self, name: &str) -> Result<(), ArchiveError> {
        if !self.entries.insert(name.to_string()) {
            return Err(ArchiveError::DuplicateEntry(name.to_string()));
        }
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        self.writer.start_file(name, options)?;
        Ok(())
    }

    /// Append an entry from memory.
    pub fn add_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
        self.start_entry(name)?;
        self.writer.write_all(bytes)?;
        Ok(())
    }

    /// Stream the contents of a file on disk into the archive under `name`.
    pub fn add_path(&mut self, name: &str, source: &Path) -> Result<(), ArchiveError> {
        let mut file = File::open(source)?;
        self.start_entry(name)?;
        io::copy(&mut file, &mut self.writer)?;
        Ok(())
    }

    /// Write the central directory and flush to disk.
    ///
    /// On failure the partial archive is deleted.
    pub fn finish(self) -> Result<PathBuf, ArchiveError> {
        let Self { path, writer, .. } = self;
        match finalize(writer) {
            Ok(()) => Ok(path),
            Err(e) => {
                if let Err(remove) = std::fs::remove_file(&path)
                    && remove.kind() != io::ErrorKind::NotFound
                {
                    warn!(path = %path.display(), error = %remove, "partial zip not removed");
                }
                Err(e)
            }
        }
    }
}

fn finalize(writer: ZipWriter<BufWriter<File>>) -> Result<(), ArchiveError> {
    let mut inner = writer.finish()?;
    inner.flush()?;
    Ok(())
}
