//! Immutable catalogs of known Protobuf types.
//!
//! A [`TypeCatalog`] is a snapshot: files keyed by name, types keyed by
//! [`TypeName`] with a secondary index by type URL. It is never edited in
//! place; [`TypeCatalog::union`] produces a new catalog.
//!
//! # Conflict policy
//!
//! When both sides of a union bind the same type name differently (another
//! file, class or URL), the receiver's binding is kept and the incoming one is
//! dropped. A type that was resolvable keeps resolving to the same class for
//! the rest of the process, whatever is registered later.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use prost_reflect::DescriptorPool;
use prost_types::{DescriptorProto, FileDescriptorProto};
use serde::{Deserialize, Serialize};

use crate::class_name::ClassName;
use crate::config::UrlPrefixes;
use crate::error::CatalogError;
use crate::type_name::{TypeName, TypeUrl};

// ============================================================================
// TypeDescriptor
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Message,
    Enum,
}

/// One message or enum type known to the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: TypeName,
    url: TypeUrl,
    kind: TypeKind,
    file: Arc<str>,
    class_name: ClassName,
}

impl TypeDescriptor {
    pub fn name(&self) -> &TypeName {
        &self.name
    }

    pub fn url(&self) -> &TypeUrl {
        &self.url
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Name of the `.proto` file declaring this type.
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn class_name(&self) -> &ClassName {
        &self.class_name
    }
}

// ============================================================================
// TypeCatalog
// ============================================================================

/// Outcome of [`TypeCatalog::union_report`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnionReport {
    /// Types of the argument that were not known to the receiver.
    pub added: Vec<TypeName>,
    /// Types the receiver already bound differently; the receiver's binding was kept.
    pub conflicts: Vec<TypeName>,
}

#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    files: BTreeMap<String, Arc<FileDescriptorProto>>,
    types: BTreeMap<TypeName, TypeDescriptor>,
    by_url: HashMap<String, TypeName>,
}

impl PartialEq for TypeCatalog {
    fn eq(&self, other: &Self) -> bool {
        self.types == other.types && self.files == other.files
    }
}

impl Eq for TypeCatalog {}

impl TypeCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Scan `files` for messages and enums (nested ones included).
    ///
    /// The same file may appear more than once if its definitions are
    /// identical. Map-entry messages synthesized by `protoc` are not types.
    pub fn from_files<I>(files: I, prefixes: &UrlPrefixes) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = FileDescriptorProto>,
    {
        let mut catalog = Self::default();

        for file in files {
            let name = file.name().to_string();
            match catalog.files.get(&name) {
                Some(existing) if **existing == file => continue,
                Some(_) => return Err(CatalogError::ConflictingFile { name }),
                None => {}
            }

            let file = Arc::new(file);
            let file_name: Arc<str> = Arc::from(name.as_str());
            let prefix = prefixes.prefix_for(file.package());

            for declared in declared_types(&file) {
                let type_name = TypeName::qualify(file.package(), &declared.path);
                if let Some(existing) = catalog.types.get(&type_name) {
                    return Err(CatalogError::DuplicateType {
                        name: type_name.to_string(),
                        first_file: existing.file().to_string(),
                        second_file: name,
                    });
                }
                let descriptor = TypeDescriptor {
                    url: TypeUrl::new(prefix, type_name.clone()),
                    class_name: ClassName::for_type(&file, &declared.path),
                    name: type_name.clone(),
                    kind: declared.kind,
                    file: Arc::clone(&file_name),
                };
                catalog
                    .by_url
                    .insert(descriptor.url.to_string(), type_name.clone());
                catalog.types.insert(type_name, descriptor);
            }

            catalog.files.insert(name, file);
        }

        Ok(catalog)
    }

    /// Catalog of every file in a descriptor pool.
    pub fn from_pool(pool: &DescriptorPool, prefixes: &UrlPrefixes) -> Result<Self, CatalogError> {
        Self::from_files(
            pool.files().map(|f| f.file_descriptor_proto().clone()),
            prefixes,
        )
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn all_types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    pub fn find(&self, name: &TypeName) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn find_by_url(&self, url: &TypeUrl) -> Option<&TypeDescriptor> {
        self.by_url
            .get(&url.to_string())
            .and_then(|name| self.types.get(name))
    }

    pub fn contains(&self, url: &TypeUrl) -> bool {
        self.by_url.contains_key(&url.to_string())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Type name to generated class, in name order.
    pub fn bindings(&self) -> impl Iterator<Item = (&TypeName, &ClassName)> {
        self.types.iter().map(|(name, t)| (name, &t.class_name))
    }

    // ========================================================================
    // Union
    // ========================================================================

    pub fn union(&self, other: &TypeCatalog) -> TypeCatalog {
        self.union_report(other).0
    }

    /// [`TypeCatalog::union`], also reporting what was added and what lost a conflict.
    pub fn union_report(&self, other: &TypeCatalog) -> (TypeCatalog, UnionReport) {
        let mut merged = self.clone();
        let mut report = UnionReport::default();

        // Files the receiver knows under the same name but with other contents.
        let mut shadowed: HashSet<&str> = HashSet::new();
        for (name, file) in &other.files {
            match self.files.get(name) {
                Some(existing) if existing != file => {
                    shadowed.insert(name.as_str());
                }
                Some(_) => {}
                None => {
                    merged.files.insert(name.clone(), Arc::clone(file));
                }
            }
        }

        for (name, incoming) in &other.types {
            match self.types.get(name) {
                Some(existing) if existing == incoming => {}
                Some(existing) => {
                    tracing::warn!(
                        type_name = %name,
                        kept_class = %existing.class_name,
                        dropped_class = %incoming.class_name,
                        "conflicting binding for known type, keeping the existing one"
                    );
                    report.conflicts.push(name.clone());
                }
                None if shadowed.contains(incoming.file()) => {
                    tracing::warn!(
                        type_name = %name,
                        file = incoming.file(),
                        "type declared by a conflicting version of a known file, dropping it"
                    );
                    report.conflicts.push(name.clone());
                }
                None => {
                    merged
                        .by_url
                        .insert(incoming.url.to_string(), name.clone());
                    merged.types.insert(name.clone(), incoming.clone());
                    report.added.push(name.clone());
                }
            }
        }

        (merged, report)
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Check the internal invariants: every type's file is present, URLs
    /// name their type, and the URL index covers exactly the types.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let malformed = |reason: String| Err(CatalogError::Malformed { reason });

        for (name, descriptor) in &self.types {
            if name != &descriptor.name {
                return malformed(format!("`{name}` is indexed under another name"));
            }
            if descriptor.url.type_name() != name {
                return malformed(format!(
                    "type URL `{}` does not name `{name}`",
                    descriptor.url
                ));
            }
            if !self.files.contains_key(descriptor.file()) {
                return malformed(format!(
                    "`{name}` refers to missing file `{}`",
                    descriptor.file()
                ));
            }
            if self.by_url.get(&descriptor.url.to_string()) != Some(name) {
                return malformed(format!("`{name}` is missing from the URL index"));
            }
        }
        if self.by_url.len() != self.types.len() {
            return malformed("URL index and type index disagree".to_string());
        }
        Ok(())
    }

    // ========================================================================
    // Wire registry
    // ========================================================================

    /// Build a descriptor pool able to decode every known message type.
    ///
    /// Starts from the well-known types of the global pool and adds files in
    /// dependency order, ties broken by file name. Files that lost a union
    /// conflict, files whose imports are unavailable and files the pool
    /// rejects are skipped.
    pub fn to_wire_registry(&self) -> DescriptorPool {
        let mut pool = DescriptorPool::global();

        for file in self.dependency_order() {
            if pool.get_file_by_name(file.name()).is_some() {
                continue;
            }
            if !self.is_fully_bound(file) {
                tracing::warn!(
                    file = file.name(),
                    "file lost a type conflict, leaving it out of the type registry"
                );
                continue;
            }
            if let Some(missing) = file
                .dependency
                .iter()
                .find(|dep| pool.get_file_by_name(dep).is_none())
            {
                tracing::warn!(
                    file = file.name(),
                    missing = missing.as_str(),
                    "import unavailable, leaving file out of the type registry"
                );
                continue;
            }
            // A rejected file must not leave part of itself in the pool.
            let mut candidate = pool.clone();
            match candidate.add_file_descriptor_proto(file.as_ref().clone()) {
                Ok(_) => pool = candidate,
                Err(err) => tracing::warn!(
                    file = file.name(),
                    error = %err,
                    "file does not resolve, leaving it out of the type registry"
                ),
            }
        }

        pool
    }

    #[cfg(test)]
    pub(crate) fn without_files(mut self) -> Self {
        self.files.clear();
        self
    }

    fn is_fully_bound(&self, file: &FileDescriptorProto) -> bool {
        declared_types(file).iter().all(|declared| {
            let name = TypeName::qualify(file.package(), &declared.path);
            self.types
                .get(&name)
                .is_some_and(|t| t.file() == file.name())
        })
    }

    fn dependency_order(&self) -> Vec<&Arc<FileDescriptorProto>> {
        let mut order = Vec::with_capacity(self.files.len());
        let mut visited = HashSet::new();
        for name in self.files.keys() {
            self.visit(name, &mut visited, &mut order);
        }
        order
    }

    fn visit<'a>(
        &'a self,
        name: &str,
        visited: &mut HashSet<&'a str>,
        order: &mut Vec<&'a Arc<FileDescriptorProto>>,
    ) {
        let Some((key, file)) = self.files.get_key_value(name) else {
            return;
        };
        if !visited.insert(key.as_str()) {
            return;
        }
        for dep in &file.dependency {
            self.visit(dep, visited, order);
        }
        order.push(file);
    }

    // ========================================================================
    // Sorted views
    // ========================================================================

    pub fn files_sorted_by_name(&self) -> Vec<&FileDescriptorProto> {
        self.files.values().map(Arc::as_ref).collect()
    }

    pub fn type_names_sorted(&self) -> Vec<&TypeName> {
        self.types.keys().collect()
    }

    pub fn all_urls(&self) -> BTreeSet<TypeUrl> {
        self.types.values().map(|t| t.url.clone()).collect()
    }

    /// URLs of the types in `package` or its sub-packages, sorted.
    pub fn urls_in_package(&self, package: &str) -> Vec<TypeUrl> {
        let urls: BTreeSet<TypeUrl> = self
            .types_in_package(package)
            .into_iter()
            .map(|t| t.url.clone())
            .collect();
        urls.into_iter().collect()
    }

    pub fn types_in_package(&self, package: &str) -> Vec<&TypeDescriptor> {
        self.types
            .values()
            .filter(|t| t.name.is_in_package(package))
            .collect()
    }
}

// ============================================================================
// Descriptor walking
// ============================================================================

struct DeclaredType<'a> {
    path: Vec<&'a str>,
    kind: TypeKind,
}

fn declared_types(file: &FileDescriptorProto) -> Vec<DeclaredType<'_>> {
    let mut out = Vec::new();
    for message in &file.message_type {
        walk_message(message, Vec::new(), &mut out);
    }
    for enumeration in &file.enum_type {
        out.push(DeclaredType {
            path: vec![enumeration.name()],
            kind: TypeKind::Enum,
        });
    }
    out
}

fn walk_message<'a>(message: &'a DescriptorProto, mut path: Vec<&'a str>, out: &mut Vec<DeclaredType<'a>>) {
    let is_map_entry = message
        .options
        .as_ref()
        .is_some_and(|o| o.map_entry());
    if is_map_entry {
        return;
    }

    path.push(message.name());
    for enumeration in &message.enum_type {
        let mut enum_path = path.clone();
        enum_path.push(enumeration.name());
        out.push(DeclaredType {
            path: enum_path,
            kind: TypeKind::Enum,
        });
    }
    for nested in &message.nested_type {
        walk_message(nested, path.clone(), out);
    }
    out.push(DeclaredType {
        path,
        kind: TypeKind::Message,
    });
}
