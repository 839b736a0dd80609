//! Integration tests for the known types pipeline
//!
//! These tests exercise the crate end to end:
//! - Descriptor sources (files, directories, jars) → superset → merged set
//! - Merged set → registry extension → lookups and dumps
//! - Registry → type registry (descriptor pool) for `Any` unpacking
//!
//! Run with: cargo test --test integration_tests

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use prost::Message;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet,
};
use spine_known_types::{
    FileDescriptorSuperset, KnownTypes, KnownTypesConfig, RegistryError, TypeCatalog, TypeName,
    TypeUrl, UrlPrefixes,
};
use tempfile::tempdir;
use zip::write::FileOptions;
use zip::ZipWriter;

// ============================================================================
// Fixtures
// ============================================================================

fn proto_file(name: &str, package: &str, messages: Vec<DescriptorProto>) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        package: Some(package.to_string()),
        message_type: messages,
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

fn message(name: &str) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

fn message_with_field(name: &str, field: &str, type_name: &str) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: vec![FieldDescriptorProto {
            name: Some(field.to_string()),
            number: Some(1),
            label: Some(Label::Optional as i32),
            r#type: Some(Type::Message as i32),
            type_name: Some(format!(".{type_name}")),
            json_name: Some(field.to_string()),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn encoded(files: Vec<FileDescriptorProto>) -> Vec<u8> {
    FileDescriptorSet { file: files }.encode_to_vec()
}

fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, bytes) in entries {
        zip.start_file(*name, FileOptions::default()).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

fn bare_config() -> KnownTypesConfig {
    KnownTypesConfig {
        include_well_known: false,
        ..KnownTypesConfig::default()
    }
}

fn url(s: &str) -> TypeUrl {
    TypeUrl::parse(s).unwrap()
}

fn ids_file() -> FileDescriptorProto {
    proto_file("acme/ids.proto", "acme", vec![message("OrderId")])
}

fn order_file() -> FileDescriptorProto {
    let mut file = proto_file(
        "acme/order.proto",
        "acme",
        vec![message_with_field("Order", "id", "acme.OrderId")],
    );
    file.dependency = vec!["acme/ids.proto".to_string()];
    file.enum_type = vec![EnumDescriptorProto {
        name: Some("Status".to_string()),
        value: vec![EnumValueDescriptorProto {
            name: Some("STATUS_UNKNOWN".to_string()),
            number: Some(0),
            ..Default::default()
        }],
        ..Default::default()
    }];
    file
}

fn billing_file() -> FileDescriptorProto {
    proto_file("billing/invoice.proto", "billing", vec![message("Invoice")])
}

// ============================================================================
// Sources → registry
// ============================================================================

#[test]
fn test_sources_of_every_kind_reach_the_registry() {
    let dir = tempdir().unwrap();

    // The module's own output.
    let module = dir.path().join("module.desc");
    std::fs::write(&module, encoded(vec![ids_file(), order_file()])).unwrap();

    // A directory of descriptor sets, one overlapping with the module.
    let generated = dir.path().join("generated");
    std::fs::create_dir(&generated).unwrap();
    std::fs::write(generated.join("ids.desc"), encoded(vec![ids_file()])).unwrap();
    std::fs::write(generated.join("README.md"), b"not a descriptor").unwrap();

    // A dependency jar.
    let jar = dir.path().join("billing.jar");
    write_jar(
        &jar,
        &[
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".to_vec()),
            ("desc/billing.desc", encoded(vec![billing_file()])),
        ],
    );

    let mut superset = FileDescriptorSuperset::with_config(&bare_config());
    for source in [&module, &generated, &jar] {
        superset.add_source(source).unwrap();
    }
    let merged = superset.merge();
    assert_eq!(merged.len(), 3);

    let registry = KnownTypes::new(&bare_config()).unwrap();
    assert!(registry.is_empty());
    let report = merged.commit_to_known_types(&registry).unwrap();
    assert_eq!(report.added.len(), 4);
    assert!(report.conflicts.is_empty());
    assert_eq!(registry.generation(), 1);

    let order = registry
        .find_by_url(&url("type.googleapis.com/acme.Order"))
        .unwrap();
    assert_eq!(order.file(), "acme/order.proto");
    assert_eq!(
        registry
            .class_name_of(&url("type.googleapis.com/billing.Invoice"))
            .unwrap()
            .as_str(),
        "billing.InvoiceOuterClass$Invoice"
    );
    assert!(registry.find(&TypeName::new("acme.Status")).is_some());
}

#[test]
fn test_corrupt_source_leaves_the_registry_untouched() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.desc"), encoded(vec![billing_file()])).unwrap();
    std::fs::write(dir.path().join("b.desc"), [0x0a, 0x05, 0x01]).unwrap();

    let registry = KnownTypes::from_catalog("Test", TypeCatalog::empty());
    let mut superset = FileDescriptorSuperset::new();
    let err = superset.add_source(dir.path()).unwrap_err();
    assert_eq!(err.path.as_path(), dir.path());
    assert_eq!(err.entry.as_deref(), Some("b.desc"));
    assert!(err.to_string().contains("b.desc"));

    // Nothing was read, so committing what is there changes nothing.
    superset.merge().commit_to_known_types(&registry).unwrap();
    assert!(registry.is_empty());
    assert_eq!(registry.generation(), 0);
}

#[test]
fn test_default_sources_seed_the_registry() {
    let dir = tempdir().unwrap();
    let defaults = dir.path().join("defaults.desc");
    std::fs::write(&defaults, encoded(vec![billing_file()])).unwrap();

    let config = KnownTypesConfig {
        default_sources: vec![defaults],
        type_urls: UrlPrefixes::default().with_package("billing", "type.billing.io"),
        ..bare_config()
    };
    let registry = KnownTypes::new(&config).unwrap();

    assert!(registry.contains(&url("type.billing.io/billing.Invoice")));
    assert!(!registry.contains(&url("type.googleapis.com/billing.Invoice")));
    assert_eq!(registry.generation(), 0);
}

#[test]
fn test_unreadable_default_source_fails_construction() {
    let dir = tempdir().unwrap();
    let config = KnownTypesConfig {
        default_sources: vec![dir.path().join("missing.desc")],
        ..bare_config()
    };
    assert!(matches!(
        KnownTypes::new(&config),
        Err(RegistryError::Read(_))
    ));
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_dump_lists_sorted_urls_after_a_summary_line() {
    let registry = KnownTypes::from_catalog("Test", TypeCatalog::empty());
    let mut superset = FileDescriptorSuperset::new();
    superset.add_set(FileDescriptorSet {
        file: vec![billing_file(), ids_file(), order_file()],
    });
    superset.merge().commit_to_known_types(&registry).unwrap();

    let dump = registry.print_all_types();
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Test: 4 known types",
            "type.googleapis.com/acme.Order",
            "type.googleapis.com/acme.OrderId",
            "type.googleapis.com/acme.Status",
            "type.googleapis.com/billing.Invoice",
        ]
    );
    assert_eq!(registry.all_urls_in("acme").len(), 3);
    assert_eq!(registry.all_from_package("billing").len(), 1);
}

// ============================================================================
// Type registry
// ============================================================================

#[test]
fn test_type_registry_resolves_messages_across_imports() {
    let registry = KnownTypes::from_catalog("Test", TypeCatalog::empty());
    let mut superset = FileDescriptorSuperset::new();
    // Dependent file first; the pool is built in import order regardless.
    superset.add_set(FileDescriptorSet {
        file: vec![order_file(), ids_file()],
    });
    superset.merge().commit_to_known_types(&registry).unwrap();

    let pool = registry.type_registry();
    let order = pool.get_message_by_name("acme.Order").unwrap();
    let id_field = order.get_field_by_name("id").unwrap();
    assert_eq!(
        id_field.kind().as_message().map(|m| m.full_name().to_string()),
        Some("acme.OrderId".to_string())
    );
    assert!(pool.get_enum_by_name("acme.Status").is_some());

    // Cached until the next extension.
    assert!(Arc::ptr_eq(&pool, &registry.type_registry()));
}

#[test]
fn test_type_registry_skips_files_with_missing_imports() {
    let registry = KnownTypes::from_catalog("Test", TypeCatalog::empty());
    let mut superset = FileDescriptorSuperset::new();
    superset.add_set(FileDescriptorSet {
        file: vec![order_file(), billing_file()],
    });
    superset.merge().commit_to_known_types(&registry).unwrap();

    // `acme.Order` is known but cannot be decoded without its import.
    assert!(registry.find(&TypeName::new("acme.Order")).is_some());
    let pool = registry.type_registry();
    assert!(pool.get_message_by_name("acme.Order").is_none());
    assert!(pool.get_message_by_name("billing.Invoice").is_some());
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_commits_all_land() {
    let registry = KnownTypes::from_catalog("Test", TypeCatalog::empty());
    let packages: Vec<String> = (0..8).map(|i| format!("pkg{i}")).collect();

    std::thread::scope(|scope| {
        for package in &packages {
            let registry = &registry;
            scope.spawn(move || {
                let mut superset = FileDescriptorSuperset::new();
                superset.add_set(FileDescriptorSet {
                    file: vec![proto_file(
                        &format!("{package}/event.proto"),
                        package,
                        vec![message("Event")],
                    )],
                });
                superset.merge().commit_to_known_types(registry).unwrap();
            });
        }
    });

    assert_eq!(registry.len(), packages.len());
    assert_eq!(registry.generation(), packages.len() as u64);
    for package in &packages {
        assert!(registry.contains(&url(&format!("type.googleapis.com/{package}.Event"))));
    }
}
