//! Type names and type URLs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Fully-qualified Protobuf type name, e.g. `spine.core.UserId` or
/// `acme.Order.Line` for nested types. Never carries a leading dot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.strip_prefix('.') {
            Some(stripped) => Self(stripped.to_string()),
            None => Self(name),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins a proto package and a (possibly nested) simple name path.
    pub(crate) fn qualify(package: &str, path: &[&str]) -> Self {
        let simple = path.join(".");
        if package.is_empty() {
            Self(simple)
        } else {
            Self(format!("{package}.{simple}"))
        }
    }

    /// Whether this name lives in `package` or one of its sub-packages.
    ///
    /// Matching is segment-aware: `spine.core` does not match `spine.corex.Foo`.
    /// An empty package matches everything.
    pub fn is_in_package(&self, package: &str) -> bool {
        let package = package.trim_matches('.');
        if package.is_empty() {
            return true;
        }
        self.0
            .strip_prefix(package)
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A type URL: `<prefix>/<fully.qualified.Name>`, as stored in `google.protobuf.Any`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeUrl {
    prefix: String,
    type_name: TypeName,
}

impl TypeUrl {
    pub fn new(prefix: impl Into<String>, type_name: TypeName) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('/').to_string(),
            type_name,
        }
    }

    /// Parses `prefix/type.Name`, splitting on the last `/`.
    ///
    /// Trailing slashes of the prefix are dropped, as in [`TypeUrl::new`].
    pub fn parse(url: &str) -> Result<Self, CatalogError> {
        let invalid = || CatalogError::InvalidTypeUrl {
            url: url.to_string(),
        };
        let (prefix, name) = url.rsplit_once('/').ok_or_else(invalid)?;
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() || name.is_empty() || name.starts_with('.') {
            return Err(invalid());
        }
        Ok(Self::new(prefix, TypeName::new(name)))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }
}

impl fmt::Display for TypeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.type_name)
    }
}

impl FromStr for TypeUrl {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
