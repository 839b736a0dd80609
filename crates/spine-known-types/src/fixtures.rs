//! Descriptor builders shared by unit tests.

use prost::Message;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, FileOptions,
};

use crate::catalog::TypeCatalog;
use crate::config::UrlPrefixes;

pub(crate) fn message(name: &str) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

pub(crate) fn nested(name: &str, children: Vec<DescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        nested_type: children,
        ..Default::default()
    }
}

/// A message with a single singular message-typed field.
pub(crate) fn message_referencing(name: &str, field: &str, type_name: &str) -> DescriptorProto {
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

pub(crate) fn enumeration(name: &str) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(name.to_string()),
        value: vec![EnumValueDescriptorProto {
            name: Some(format!("{}_UNKNOWN", name.to_uppercase())),
            number: Some(0),
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub(crate) fn file(name: &str, package: &str, messages: Vec<DescriptorProto>) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        package: Some(package.to_string()),
        message_type: messages,
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

pub(crate) fn with_dependency(mut file: FileDescriptorProto, dependency: &str) -> FileDescriptorProto {
    file.dependency.push(dependency.to_string());
    file
}

pub(crate) fn with_java_options(
    mut file: FileDescriptorProto,
    java_package: Option<&str>,
    outer_class: Option<&str>,
    multiple_files: bool,
) -> FileDescriptorProto {
    file.options = Some(FileOptions {
        java_package: java_package.map(str::to_string),
        java_outer_classname: outer_class.map(str::to_string),
        java_multiple_files: Some(multiple_files),
        ..Default::default()
    });
    file
}

pub(crate) fn set_bytes(files: Vec<FileDescriptorProto>) -> Vec<u8> {
    FileDescriptorSet { file: files }.encode_to_vec()
}

/// Catalog with one file per message, `<package>/<name>.proto`.
pub(crate) fn catalog_of(types: &[(&str, &str)]) -> TypeCatalog {
    let files = types.iter().map(|(package, name)| {
        file(
            &format!("{}/{}.proto", package.replace('.', "/"), name.to_lowercase()),
            package,
            vec![message(name)],
        )
    });
    TypeCatalog::from_files(files, &UrlPrefixes::default()).expect("fixture catalog is valid")
}
