//! Generated class bindings.
//!
//! The registry resolves a type to the binary name of the Java class `protoc`
//! generates for it, following `protoc`'s Java naming rules:
//!
//! - package: `java_package`, falling back to the proto package;
//! - with `java_multiple_files`, each top-level type gets its own class;
//! - otherwise types nest inside the outer class (`java_outer_classname`, or
//!   the camel-cased file name, suffixed with `OuterClass` when it clashes with
//!   a top-level type);
//! - nested classes are joined with `$`.

use std::fmt;

use prost_types::FileDescriptorProto;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassName(String);

impl ClassName {
    /// Binding for the type at `path` (outermost first) declared in `file`.
    pub fn for_type(file: &FileDescriptorProto, path: &[&str]) -> Self {
        let package = java_package(file);
        let multiple_files = file
            .options
            .as_ref()
            .map(|o| o.java_multiple_files())
            .unwrap_or(false);

        let mut nested = path.join("$");
        if !multiple_files {
            nested = format!("{}${nested}", outer_class_name(file));
        }
        if package.is_empty() {
            Self(nested)
        } else {
            Self(format!("{package}.{nested}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The class name without its package and enclosing classes.
    pub fn simple_name(&self) -> &str {
        self.0
            .rsplit(['.', '$'])
            .next()
            .unwrap_or(self.0.as_str())
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn java_package(file: &FileDescriptorProto) -> &str {
    match file.options.as_ref().map(|o| o.java_package()) {
        Some(package) if !package.is_empty() => package,
        _ => file.package(),
    }
}

fn outer_class_name(file: &FileDescriptorProto) -> String {
    if let Some(explicit) = file
        .options
        .as_ref()
        .map(|o| o.java_outer_classname())
        .filter(|name| !name.is_empty())
    {
        return explicit.to_string();
    }

    let base = file.name().rsplit('/').next().unwrap_or_default();
    let base = base.strip_suffix(".proto").unwrap_or(base);
    let candidate = camel_case(base);

    let clashes = file.message_type.iter().any(|m| m.name() == candidate)
        || file.enum_type.iter().any(|e| e.name() == candidate)
        || file.service.iter().any(|s| s.name() == candidate);
    if clashes {
        format!("{candidate}OuterClass")
    } else {
        candidate
    }
}

/// `protoc`'s underscores-to-camel-case conversion for file names.
fn camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut cap_next = true;
    for c in input.chars() {
        if c.is_ascii_lowercase() {
            out.push(if cap_next { c.to_ascii_uppercase() } else { c });
            cap_next = false;
        } else if c.is_ascii_uppercase() {
            out.push(c);
            cap_next = false;
        } else if c.is_ascii_digit() {
            out.push(c);
            cap_next = true;
        } else {
            cap_next = true;
        }
    }
    out
}
