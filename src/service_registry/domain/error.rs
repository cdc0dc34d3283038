//! Error types for service registry domain validation and decoding.

use thiserror::Error;

/// Errors returned while constructing service registry domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceRegistryDomainError {
    /// A service command is empty after trimming.
    #[error("service command must not be empty")]
    EmptyCommand,
}

/// Error returned while parsing a namespace from its string form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown namespace: {0}")]
pub struct ParseNamespaceError(pub String);

/// Errors returned while decoding a metadata reply from a hosting service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataDecodeError {
    /// The reply was not a list.
    #[error("metadata reply must be a list, got {0}")]
    NotAList(String),

    /// One definition could not be decoded.
    #[error("invalid definition at index {index}: {reason}")]
    InvalidDefinition {
        /// Position of the definition in the reply.
        index: usize,
        /// Decoder message.
        reason: String,
    },
}

/// Errors returned while reading a link descriptor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkDescriptorError {
    /// The document is not valid YAML.
    #[error("link descriptor is not valid YAML: {0}")]
    Syntax(String),

    /// The document is valid YAML but not a mapping.
    #[error("link descriptor did not contain a map")]
    NotAMapping,

    /// The `executable` key is missing, empty, or not a string.
    #[error("link descriptor did not contain a valid 'executable' entry")]
    MissingExecutable,
}
