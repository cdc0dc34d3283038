//! Dynamic service registry with lazy, multi-source plugin activation.
//!
//! Services are discovered from plugins embedded in the host executable,
//! worker executables and link descriptors on the plugin path, and manifests
//! compiled by a running service. Their advertised definitions are
//! registered under namespaced names; a service that is known but not
//! running is started on first lookup. Definitions hosted inside another
//! worker are reached through a multiplexing proxy. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
