//! Spine known types: the Protobuf type registry of the Model Compiler
//!
//! Every code generator in a build needs the same answer to "which Protobuf
//! types exist, and which generated class does each one map to?". This crate
//! keeps that answer in one place:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         DESCRIPTOR FLOW                              │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  *.desc ──┐                                                          │
//! │  dir/  ───┼──► ArchiveReader ──► FileDescriptorSuperset              │
//! │  *.jar ───┘                            │ merge()                     │
//! │                                        ▼                             │
//! │                               MergedDescriptorSet                    │
//! │                                        │ commit_to_known_types()     │
//! │                                        ▼ (ExtensionPermit)           │
//! │                 readers ◄──────── KnownTypes ──► DescriptorPool      │
//! │        (find / class_name_of)    (TypeCatalog     (Any unpacking)    │
//! │                                   snapshots)                         │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Properties
//!
//! - **Immutable snapshots**: a [`TypeCatalog`] is never edited; extending the
//!   registry publishes a new catalog atomically.
//! - **Monotonic**: extensions only add types. On a name conflict the type
//!   already registered keeps its binding.
//! - **Guarded**: only a holder of an [`ExtensionPermit`] accepted by the
//!   registry's [`AccessGuard`] may extend it, and permits are only minted
//!   inside this crate for [`MergedDescriptorSet`].

pub mod archive;
pub mod catalog;
pub mod class_name;
pub mod config;
pub mod error;
pub mod guard;
pub mod registry;
pub mod superset;
pub mod type_name;

#[cfg(test)]
pub(crate) mod fixtures;

pub use archive::{ArchiveReader, DescriptorSource};
pub use catalog::{TypeCatalog, TypeDescriptor, TypeKind, UnionReport};
pub use class_name::ClassName;
pub use config::{KnownTypesConfig, UrlPrefixes};
pub use error::{
    AccessError, CatalogError, ConfigError, ReadError, ReadErrorKind, RegistryError,
    UnknownTypeError,
};
pub use guard::{AccessGuard, ExtensionPermit};
pub use registry::{KnownTypes, Snapshot};
pub use superset::{FileDescriptorSuperset, MergedDescriptorSet};
pub use type_name::{TypeName, TypeUrl};

/// Re-exported so hosts build descriptor sets with the same `prost` version.
pub use prost_types;
pub use prost_reflect;
