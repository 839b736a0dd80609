//! Merging descriptor sets contributed by many sources.
//!
//! A build sees the same `.proto` file through several classpath entries (the
//! module's own output, a dependency jar, a re-packaged fat jar...). The
//! [`FileDescriptorSuperset`] collects every descriptor set it is given
//! without assuming anything about overlap; [`FileDescriptorSuperset::merge`]
//! flattens them into a [`MergedDescriptorSet`] with each structurally equal
//! file kept once.
//!
//! Identity is the SHA-256 of the encoded message, so exact repeats collapse
//! and the merged view does not depend on the order sources were added in.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use prost::Message;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use sha2::{Digest as _, Sha256};

use crate::archive::ArchiveReader;
use crate::catalog::{TypeCatalog, UnionReport};
use crate::config::{KnownTypesConfig, UrlPrefixes};
use crate::error::{CatalogError, ReadError, RegistryError};
use crate::registry::KnownTypes;

/// Holder name of the only permit the registry accepts.
pub(crate) const COMMITTER: &str = "spine_known_types::superset::MergedDescriptorSet";

type Digest = [u8; 32];

fn digest_of<M: Message>(message: &M) -> Digest {
    Sha256::digest(message.encode_to_vec()).into()
}

// ============================================================================
// FileDescriptorSuperset
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct FileDescriptorSuperset {
    reader: ArchiveReader,
    prefixes: UrlPrefixes,
    sets: BTreeMap<Digest, FileDescriptorSet>,
}

impl FileDescriptorSuperset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &KnownTypesConfig) -> Self {
        Self::with_reader(
            ArchiveReader::new(config.descriptor_extension.as_str()),
            config.type_urls.clone(),
        )
    }

    pub fn with_reader(reader: ArchiveReader, prefixes: UrlPrefixes) -> Self {
        Self {
            reader,
            prefixes,
            sets: BTreeMap::new(),
        }
    }

    /// Read every descriptor set in `path` and add it.
    ///
    /// On error nothing from `path` is added.
    pub fn add_source(&mut self, path: impl AsRef<Path>) -> Result<(), ReadError> {
        let path = path.as_ref();
        let sets = self.reader.read_from(path)?;
        tracing::debug!(path = %path.display(), sets = sets.len(), "added descriptor source");
        for set in sets {
            self.add_set(set);
        }
        Ok(())
    }

    pub fn add_set(&mut self, set: FileDescriptorSet) {
        self.sets.entry(digest_of(&set)).or_insert(set);
    }

    /// Number of distinct descriptor sets collected.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn merge(&self) -> MergedDescriptorSet {
        let mut files = BTreeMap::new();
        for file in self.sets.values().flat_map(|set| set.file.iter()) {
            files
                .entry(digest_of(file))
                .or_insert_with(|| file.clone());
        }
        tracing::debug!(
            sets = self.sets.len(),
            files = files.len(),
            "merged descriptor sets"
        );
        MergedDescriptorSet {
            files,
            prefixes: self.prefixes.clone(),
            catalog: OnceLock::new(),
        }
    }
}

// ============================================================================
// MergedDescriptorSet
// ============================================================================

/// Deduplicated files of a superset, and the catalog they define.
#[derive(Debug)]
pub struct MergedDescriptorSet {
    files: BTreeMap<Digest, FileDescriptorProto>,
    prefixes: UrlPrefixes,
    catalog: OnceLock<Result<TypeCatalog, CatalogError>>,
}

impl PartialEq for MergedDescriptorSet {
    fn eq(&self, other: &Self) -> bool {
        self.files == other.files
    }
}

impl MergedDescriptorSet {
    /// Files in no particular order.
    pub fn files(&self) -> impl Iterator<Item = &FileDescriptorProto> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files keyed by name; two different files with one name are a conflict.
    pub fn as_file_set(&self) -> Result<BTreeMap<&str, &FileDescriptorProto>, CatalogError> {
        let mut by_name = BTreeMap::new();
        for file in self.files.values() {
            if by_name.insert(file.name(), file).is_some() {
                return Err(CatalogError::ConflictingFile {
                    name: file.name().to_string(),
                });
            }
        }
        Ok(by_name)
    }

    /// The catalog of the merged files, built on first use.
    pub fn as_type_catalog(&self) -> Result<&TypeCatalog, CatalogError> {
        self.catalog
            .get_or_init(|| TypeCatalog::from_files(self.files.values().cloned(), &self.prefixes))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// The merged files as one descriptor set, sorted by file name.
    pub fn to_descriptor_set(&self) -> FileDescriptorSet {
        let mut file: Vec<FileDescriptorProto> = self.files.values().cloned().collect();
        file.sort_by(|a, b| a.name().cmp(b.name()));
        FileDescriptorSet { file }
    }

    /// Write [`MergedDescriptorSet::to_descriptor_set`] to `path`.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_descriptor_set().encode_to_vec())
    }

    /// Extend `registry` with the types of this set.
    pub fn commit_to_known_types(&self, registry: &KnownTypes) -> Result<UnionReport, RegistryError> {
        let catalog = self.as_type_catalog()?;
        let permit = registry.issue_permit(COMMITTER);
        registry.extend_with(&permit, catalog)
    }
}
