//! Namespaced names used as registry keys.

use super::ParseNamespaceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace a [`TypedName`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// A loadable service, possibly backed by a worker process.
    Service,
    /// Secondary index from a handled type to its handling definition.
    Handler,
    /// A type advertised by a service.
    Type,
    /// A definition advertised by a service.
    Definition,
}

impl Namespace {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Handler => "handler",
            Self::Type => "type",
            Self::Definition => "definition",
        }
    }

    /// Returns whether names in this namespace are eligible for lazy
    /// activation.
    #[must_use]
    pub const fn is_service(self) -> bool {
        matches!(self, Self::Service)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Namespace {
    type Error = ParseNamespaceError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "service" => Ok(Self::Service),
            "handler" => Ok(Self::Handler),
            "type" => Ok(Self::Type),
            "definition" => Ok(Self::Definition),
            _ => Err(ParseNamespaceError(value.to_owned())),
        }
    }
}

/// A `(namespace, name)` pair identifying one registry entry.
///
/// Two names are the same entry iff both namespace and name match exactly;
/// names are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypedName {
    namespace: Namespace,
    name: String,
}

impl TypedName {
    /// Creates a typed name.
    #[must_use]
    pub fn new(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    /// Creates a name in the [`Namespace::Service`] namespace.
    #[must_use]
    pub fn service(name: impl Into<String>) -> Self {
        Self::new(Namespace::Service, name)
    }

    /// Creates a name in the [`Namespace::Handler`] namespace.
    #[must_use]
    pub fn handler(name: impl Into<String>) -> Self {
        Self::new(Namespace::Handler, name)
    }

    /// Returns the namespace.
    #[must_use]
    pub const fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Returns the unqualified name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the same name reinterpreted under another namespace.
    #[must_use]
    pub fn with_namespace(&self, namespace: Namespace) -> Self {
        Self::new(namespace, self.name.clone())
    }

    /// Returns whether both names denote the same entry.
    #[must_use]
    pub fn same_name(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }

    /// Returns whether this name is eligible for lazy activation.
    #[must_use]
    pub const fn is_service(&self) -> bool {
        self.namespace.is_service()
    }

    /// Returns the stable map key, `<namespace>/<name>`.
    #[must_use]
    pub fn map_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for TypedName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.namespace, self.name)
    }
}
