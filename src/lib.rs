//! Switchyard: a dynamic service registry for out-of-process plugins.
//!
//! This crate discovers implementations of named services from several
//! sources, starts them as worker processes only when needed, records the
//! metadata they advertise, and routes invocations to the right worker,
//! including workers that answer for many logical services at once.
//!
//! # Architecture
//!
//! Switchyard follows hexagonal architecture principles:
//!
//! - **Domain**: Names, definitions and descriptors with no I/O
//! - **Ports**: Trait contracts for services, launchers and loaders
//! - **Adapters**: In-memory stores and process-backed worker launching
//!
//! # Modules
//!
//! - [`service_registry`]: Discovery, activation, registration and proxying
//! - [`worker`]: Shell rendering helpers for worker command lines

pub mod service_registry;
pub mod worker;
