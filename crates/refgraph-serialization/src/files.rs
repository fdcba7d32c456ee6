//! File sinks and sources for serialized metadata
//!
//! Paths are relative, `/`-separated, e.g. `metadata/bin/core/0.bin`.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{Result, SerializationError};

pub trait FileWriter {
    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<()>;
}

pub trait FileReader: Send + Sync {
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    fn exists(&self, path: &str) -> bool;

    /// `len` bytes starting at `offset`.
    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        let bytes = self.read_file(path)?;
        let start = offset as usize;
        bytes
            .get(start..start + len)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| SerializationError::Corrupt {
                path: path.to_string(),
                reason: format!("range {start}+{len} exceeds file length {}", bytes.len()),
            })
    }
}

// ── In memory ───────────────────────────────────────────

/// Files held in a sorted map; used for tests and for round trips without disk.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFiles {
    files: BTreeMap<String, Vec<u8>>,
}

impl InMemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }
}

impl FileWriter for InMemoryFiles {
    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        self.files.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }
}

impl FileReader for InMemoryFiles {
    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| SerializationError::MissingFile(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

// ── Directory ───────────────────────────────────────────

/// Writes files under a root directory, creating parents as needed.
#[derive(Debug, Clone)]
pub struct DirectoryFileWriter {
    root: PathBuf,
}

impl DirectoryFileWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryFileWriter { root: root.into() }
    }
}

impl FileWriter for DirectoryFileWriter {
    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = resolve(&self.root, path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryFileReader {
    root: PathBuf,
}

impl DirectoryFileReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryFileReader { root: root.into() }
    }
}

impl FileReader for DirectoryFileReader {
    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        fs::read(resolve(&self.root, path)).map_err(|e| not_found(path, e))
    }

    fn exists(&self, path: &str) -> bool {
        resolve(&self.root, path).is_file()
    }

    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut file = fs::File::open(resolve(&self.root, path)).map_err(|e| not_found(path, e))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

fn resolve(root: &Path, path: &str) -> PathBuf {
    path.split('/').fold(root.to_path_buf(), |acc, segment| acc.join(segment))
}

fn not_found(path: &str, e: io::Error) -> SerializationError {
    if e.kind() == io::ErrorKind::NotFound {
        SerializationError::MissingFile(path.to_string())
    } else {
        SerializationError::Io(e)
    }
}
