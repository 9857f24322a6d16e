#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

//! # devmem Common Library
//!
//! This library contains common types used by other devmem crates that must be shared.

extern crate alloc;

/// Backtrace module to capture where an error originated.
pub mod backtrace;

/// Format utilities for byte quantities.
pub mod format;

/// Identifier of the calling execution stream.
pub mod stream_id;
