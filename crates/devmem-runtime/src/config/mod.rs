/// Device selection config module.
pub mod device;
/// Memory config module.
pub mod memory;

mod base;
mod logger;

pub use base::*;
pub use logger::*;
