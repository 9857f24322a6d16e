use crate::allocation::{AllocationType, Layout};
use alloc::string::String;
use thiserror::Error;

/// Failure of the driver level allocation call. The caller may retry with a smaller request
/// or another type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The device doesn't have enough memory left.
    #[error("Out of device memory while allocating {requested} bytes of type {allocation_type}")]
    OutOfMemory {
        /// The amount of bytes requested.
        requested: u64,
        /// The requested type.
        allocation_type: AllocationType,
    },
    /// The backend can't allocate the requested type.
    #[error("The backend can't allocate memory of type {0}")]
    Unsupported(AllocationType),
    /// The driver reported an error.
    #[error("The driver failed to allocate memory\nCaused by:\n  {0}")]
    Driver(String),
}

/// Performs the actual allocation calls for a device.
///
/// The backend is only ever called outside of the engine locks, so implementations are free
/// to block on the driver.
pub trait Backend: Send + Sync + core::fmt::Debug {
    /// The native memory object returned by the driver.
    type Resource: Send + Sync + core::fmt::Debug;

    /// Allocate memory for the layout with the given type.
    ///
    /// When `reset` is set, the memory must be zeroed before being returned.
    fn allocate(
        &self,
        layout: &Layout,
        allocation_type: AllocationType,
        reset: bool,
    ) -> Result<Self::Resource, BackendError>;

    /// Release memory previously returned by [allocate](Backend::allocate).
    fn deallocate(&self, resource: Self::Resource);
}
