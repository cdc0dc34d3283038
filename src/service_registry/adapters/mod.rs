//! Adapter implementations for the service registry ports.

pub mod memory;
pub mod process;
