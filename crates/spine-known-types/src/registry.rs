//! The known types registry.
//!
//! # Lifecycle
//!
//! 1. Startup: [`KnownTypes::new`] seeds a catalog from the well-known types
//!    and the configured default sources. [`KnownTypes::global`] does this once
//!    per process, on first access.
//! 2. Steady state: reads load the current [`Snapshot`] without locking.
//! 3. Extension: [`KnownTypes::extend_with`] unions a catalog into the current
//!    one and publishes the result as a new snapshot. Extensions never remove
//!    a type.
//!
//! # Concurrency & ordering
//!
//! * Readers pin an `Arc<Snapshot>`; they see the catalog before or after an
//!   extension, never a partial one.
//! * Writers serialize on a mutex so no contribution is lost between loading
//!   the current snapshot and publishing its successor.
//! * The type registry (descriptor pool) is cached per snapshot generation
//!   under its own lock and rebuilt on the first request after an extension.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use prost_reflect::DescriptorPool;

use crate::catalog::{TypeCatalog, TypeDescriptor, UnionReport};
use crate::class_name::ClassName;
use crate::config::KnownTypesConfig;
use crate::error::{RegistryError, UnknownTypeError};
use crate::guard::{AccessGuard, ExtensionPermit};
use crate::superset::{FileDescriptorSuperset, COMMITTER};
use crate::type_name::{TypeName, TypeUrl};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

static GLOBAL: OnceLock<KnownTypes> = OnceLock::new();
static GLOBAL_INIT: Mutex<()> = parking_lot::const_mutex(());

/// An immutable, published state of the registry.
#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    catalog: TypeCatalog,
}

impl Snapshot {
    /// Number of extensions published before this snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }
}

pub struct KnownTypes {
    id: u64,
    name: String,
    guard: AccessGuard,
    current: ArcSwap<Snapshot>,
    writer: Mutex<()>,
    wire_cache: Mutex<Option<(u64, Arc<DescriptorPool>)>>,
}

impl KnownTypes {
    /// Create a registry seeded from `config`.
    pub fn new(config: &KnownTypesConfig) -> Result<Self, RegistryError> {
        let mut catalog = if config.include_well_known {
            TypeCatalog::from_pool(&DescriptorPool::global(), &config.type_urls)?
        } else {
            TypeCatalog::empty()
        };

        if !config.default_sources.is_empty() {
            let mut superset = FileDescriptorSuperset::with_config(config);
            for source in &config.default_sources {
                superset.add_source(source)?;
            }
            let defaults = superset.merge();
            catalog = catalog.union(defaults.as_type_catalog()?);
        }

        tracing::debug!(
            registry = config.registry_name.as_str(),
            types = catalog.len(),
            files = catalog.file_count(),
            "seeded known types"
        );
        Ok(Self::from_catalog(&config.registry_name, catalog))
    }

    /// Rebuild a registry around an existing catalog.
    pub fn from_catalog(name: &str, catalog: TypeCatalog) -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            guard: AccessGuard::allow_only(COMMITTER),
            current: ArcSwap::from_pointee(Snapshot {
                generation: 0,
                catalog,
            }),
            writer: Mutex::new(()),
            wire_cache: Mutex::new(None),
        }
    }

    /// The process-wide registry, configured from the environment on first use.
    ///
    /// If initialization fails the error is returned and the next call tries again.
    pub fn global() -> Result<&'static KnownTypes, RegistryError> {
        if let Some(registry) = GLOBAL.get() {
            return Ok(registry);
        }
        let _init = GLOBAL_INIT.lock();
        if let Some(registry) = GLOBAL.get() {
            return Ok(registry);
        }
        let registry = KnownTypes::new(&KnownTypesConfig::from_env())?;
        Ok(GLOBAL.get_or_init(|| registry))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Pin the current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    pub fn len(&self) -> usize {
        self.current.load().catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, name: &TypeName) -> Option<TypeDescriptor> {
        self.current.load().catalog.find(name).cloned()
    }

    pub fn find_by_url(&self, url: &TypeUrl) -> Option<TypeDescriptor> {
        self.current.load().catalog.find_by_url(url).cloned()
    }

    pub fn contains(&self, url: &TypeUrl) -> bool {
        self.current.load().catalog.contains(url)
    }

    /// The generated class bound to `url`.
    pub fn class_name_of(&self, url: &TypeUrl) -> Result<ClassName, UnknownTypeError> {
        self.current
            .load()
            .catalog
            .find_by_url(url)
            .map(|t| t.class_name().clone())
            .ok_or_else(|| UnknownTypeError {
                type_name: url.type_name().to_string(),
            })
    }

    pub fn all_urls(&self) -> BTreeSet<TypeUrl> {
        self.current.load().catalog.all_urls()
    }

    pub fn all_urls_in(&self, package: &str) -> Vec<TypeUrl> {
        self.current.load().catalog.urls_in_package(package)
    }

    pub fn all_from_package(&self, package: &str) -> Vec<TypeDescriptor> {
        self.current
            .load()
            .catalog
            .types_in_package(package)
            .into_iter()
            .cloned()
            .collect()
    }

    /// A descriptor pool covering every known message type, for `Any` unpacking.
    pub fn type_registry(&self) -> Arc<DescriptorPool> {
        let mut cache = self.wire_cache.lock();
        // Loaded under the cache lock so the cached generation only moves forward.
        let snapshot = self.snapshot();
        if let Some((generation, pool)) = cache.as_ref() {
            if *generation == snapshot.generation {
                return Arc::clone(pool);
            }
        }

        let pool = Arc::new(snapshot.catalog.to_wire_registry());
        tracing::debug!(
            registry = self.name.as_str(),
            generation = snapshot.generation,
            "rebuilt type registry"
        );
        *cache = Some((snapshot.generation, Arc::clone(&pool)));
        pool
    }

    // ========================================================================
    // Extension
    // ========================================================================

    pub(crate) fn issue_permit(&self, holder: &str) -> ExtensionPermit {
        ExtensionPermit::new(holder, self.id)
    }

    /// Union `catalog` into the registry.
    ///
    /// Types already known keep their bindings. Nothing is published if the
    /// permit is rejected or `catalog` is malformed.
    pub fn extend_with(
        &self,
        permit: &ExtensionPermit,
        catalog: &TypeCatalog,
    ) -> Result<UnionReport, RegistryError> {
        self.guard.check(permit, self.id)?;
        catalog.validate().map_err(RegistryError::MalformedCatalog)?;

        let _writer = self.writer.lock();
        let current = self.current.load_full();
        let (merged, report) = current.catalog.union_report(catalog);

        if report.added.is_empty() && merged.file_count() == current.catalog.file_count() {
            tracing::debug!(registry = self.name.as_str(), "extension adds nothing new");
            return Ok(report);
        }

        let generation = current.generation + 1;
        self.current.store(Arc::new(Snapshot {
            generation,
            catalog: merged,
        }));
        tracing::info!(
            registry = self.name.as_str(),
            generation,
            added = report.added.len(),
            conflicts = report.conflicts.len(),
            "extended known types"
        );
        Ok(report)
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Summary line followed by every known type URL, sorted, one per line.
    pub fn print_all_types(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for KnownTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let urls = self.all_urls();
        writeln!(f, "{}: {} known types", self.name, urls.len())?;
        for url in urls {
            writeln!(f, "{url}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for KnownTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.current.load();
        f.debug_struct("KnownTypes")
            .field("name", &self.name)
            .field("generation", &snapshot.generation)
            .field("types", &snapshot.catalog.len())
            .finish()
    }
}
