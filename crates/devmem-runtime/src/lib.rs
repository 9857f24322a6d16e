#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

//! devmem runtime crate: the device memory engine.
//!
//! An [engine](Engine) is bound to one [device](device::Device). It chooses the
//! [allocation type](AllocationType) of every request, accounts the memory in use per type
//! and imports externally owned native resources without taking ownership of them.

extern crate alloc;

#[macro_use]
extern crate derive_new;

mod allocation;
mod capabilities;
mod engine;
mod factory;
mod memory;

/// Backend module.
pub mod backend;
/// Configuration module.
pub mod config;
/// Device module.
pub mod device;
/// Native resource import module.
pub mod import;
/// Logging module.
pub mod logging;
/// Memory management module.
pub mod memory_management;

pub use allocation::*;
pub use capabilities::*;
pub use engine::*;
pub use factory::*;
pub use memory::*;
