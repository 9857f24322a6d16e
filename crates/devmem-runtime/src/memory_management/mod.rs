mod ledger;
mod max_memory;
mod policy;

pub use ledger::*;
pub use max_memory::*;
pub use policy::*;
