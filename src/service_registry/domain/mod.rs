//! Domain model for service discovery and registration.
//!
//! Names, definitions, advertised metadata, recorded service commands and
//! link descriptors are plain data. Process handling and storage remain
//! outside this boundary.

mod command;
mod definition;
mod error;
mod link;
mod name;

pub use command::ServiceCommand;
pub use definition::{Definition, HANDLER_FOR_PROPERTY, Properties, ServiceMetadata, TypeSet};
pub use error::{
    LinkDescriptorError, MetadataDecodeError, ParseNamespaceError, ServiceRegistryDomainError,
};
pub use link::{LinkDescriptor, expand_env};
pub use name::{Namespace, TypedName};
