//! Reading descriptor set bytes from wherever they live.
//!
//! A source path is classified once into a [`DescriptorSource`], then handled
//! by the reader for that kind:
//!
//! | Source | Behavior |
//! |---|---|
//! | `*.desc` file | decoded as one `FileDescriptorSet` |
//! | directory | immediate children with the extension, in file name order |
//! | `*.zip` / `*.jar` | entries with the extension, in archive order |
//! | anything else | ignored, not every classpath entry carries descriptors |
//!
//! Reading is all-or-nothing per source: one corrupt file or entry rejects
//! the whole source.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use prost::Message;
use prost_types::FileDescriptorSet;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{ReadError, ReadErrorKind};

const ARCHIVE_EXTENSIONS: [&str; 2] = ["zip", "jar"];

/// Largest archive entry read; the size an archive declares is not trusted.
pub const MAX_ENTRY_BYTES: u64 = 64 << 20;

/// A classified descriptor source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorSource {
    PlainFile(PathBuf),
    Directory(PathBuf),
    Archive(PathBuf),
    Other(PathBuf),
}

impl DescriptorSource {
    /// Classify `path`; fails if it does not exist or cannot be inspected.
    pub fn classify(path: &Path, extension: &str) -> Result<Self, ReadError> {
        let metadata = std::fs::metadata(path).map_err(|e| ReadError::new(path, e))?;
        let path_buf = path.to_path_buf();

        if metadata.is_dir() {
            return Ok(Self::Directory(path_buf));
        }
        let source = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext == extension => Self::PlainFile(path_buf),
            Some(ext)
                if ARCHIVE_EXTENSIONS
                    .iter()
                    .any(|archive| ext.eq_ignore_ascii_case(archive)) =>
            {
                Self::Archive(path_buf)
            }
            _ => Self::Other(path_buf),
        };
        Ok(source)
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::PlainFile(p) | Self::Directory(p) | Self::Archive(p) | Self::Other(p) => p,
        }
    }
}

/// Reads `FileDescriptorSet`s out of files, directories and archives.
#[derive(Debug, Clone)]
pub struct ArchiveReader {
    extension: String,
}

impl Default for ArchiveReader {
    fn default() -> Self {
        Self::new("desc")
    }
}

impl ArchiveReader {
    /// `extension` is matched without the leading dot.
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn read_from(&self, path: &Path) -> Result<Vec<FileDescriptorSet>, ReadError> {
        let source = DescriptorSource::classify(path, &self.extension)?;
        let location = source.path();
        match &source {
            DescriptorSource::PlainFile(_) => {
                let bytes = std::fs::read(location).map_err(|e| ReadError::new(location, e))?;
                let set = decode(&bytes).map_err(|e| ReadError::new(location, e))?;
                Ok(vec![set])
            }
            DescriptorSource::Directory(_) => self.read_directory(location),
            DescriptorSource::Archive(_) => self.read_archive(location),
            DescriptorSource::Other(_) => {
                tracing::debug!(path = %location.display(), "no descriptors in source, skipping");
                Ok(Vec::new())
            }
        }
    }

    fn read_directory(&self, dir: &Path) -> Result<Vec<FileDescriptorSet>, ReadError> {
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        let mut sets = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| ReadError::new(dir, std::io::Error::from(e)))?;
            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }
            let entry_name = entry.file_name().to_string_lossy().to_string();
            let bytes = std::fs::read(entry.path())
                .map_err(|e| ReadError::in_entry(dir, &entry_name, e))?;
            let set = decode(&bytes).map_err(|e| ReadError::in_entry(dir, &entry_name, e))?;
            sets.push(set);
        }

        tracing::debug!(path = %dir.display(), sets = sets.len(), "scanned descriptor directory");
        Ok(sets)
    }

    fn read_archive(&self, path: &Path) -> Result<Vec<FileDescriptorSet>, ReadError> {
        let file = File::open(path).map_err(|e| ReadError::new(path, e))?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|e| ReadError::new(path, e))?;

        let mut sets = Vec::new();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| ReadError::new(path, e))?;
            if entry.is_dir() {
                continue;
            }
            let entry_name = entry.name().to_string();
            if !self.matches(Path::new(&entry_name)) {
                continue;
            }

            let oversized = |size| ReadErrorKind::Oversized {
                size,
                limit: MAX_ENTRY_BYTES,
            };
            if entry.size() > MAX_ENTRY_BYTES {
                return Err(ReadError::in_entry(path, &entry_name, oversized(entry.size())));
            }

            let mut bytes = Vec::new();
            (&mut entry)
                .take(MAX_ENTRY_BYTES + 1)
                .read_to_end(&mut bytes)
                .map_err(|e| ReadError::in_entry(path, &entry_name, e))?;
            if bytes.len() as u64 > MAX_ENTRY_BYTES {
                return Err(ReadError::in_entry(path, &entry_name, oversized(bytes.len() as u64)));
            }
            let set = decode(&bytes).map_err(|e| ReadError::in_entry(path, &entry_name, e))?;
            sets.push(set);
        }

        tracing::debug!(path = %path.display(), sets = sets.len(), "scanned descriptor archive");
        Ok(sets)
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == self.extension)
    }
}

fn decode(bytes: &[u8]) -> Result<FileDescriptorSet, ReadErrorKind> {
    Ok(FileDescriptorSet::decode(bytes)?)
}
