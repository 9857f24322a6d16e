use crate::{allocation::AllocationType, capabilities::CapabilityAdapter};
use devmem_common::backtrace::BackTrace;
use thiserror::Error;

/// The policy can't pick an allocation type for the device.
#[derive(Error, Clone)]
pub enum PolicyError {
    /// The device claims unified memory support but exposes no usable tier.
    #[error(
        "Couldn't find a proper allocation type for the {policy} policy: the device supports unified memory but no usable tier\nBacktrace\n{backtrace}"
    )]
    NoUsableUnifiedTier {
        /// The policy that failed.
        policy: AllocationPolicy,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
}

impl core::fmt::Debug for PolicyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

/// How an allocation type is chosen for a request.
///
/// Device resident memory is the fastest for compute but can't be mapped by the host, so the
/// general policy is used for hidden buffers while the lockable policy is used for buffers the
/// host reads or writes directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationPolicy {
    /// Prefer [unified device](AllocationType::UnifiedDevice), then
    /// [unified host](AllocationType::UnifiedHost).
    General,
    /// Prefer [unified shared](AllocationType::UnifiedShared), then
    /// [unified host](AllocationType::UnifiedHost).
    LockablePreferred,
}

impl AllocationPolicy {
    /// Resolve the allocation type for a request.
    ///
    /// Images and devices without usable unified memory always get `default_type`.
    pub fn resolve(
        &self,
        is_image: bool,
        adapter: &CapabilityAdapter,
        default_type: AllocationType,
    ) -> Result<AllocationType, PolicyError> {
        if !adapter.use_unified_shared_memory() || is_image {
            return Ok(default_type);
        }

        let (preferred, supported) = match self {
            AllocationPolicy::General => (
                AllocationType::UnifiedDevice,
                adapter.supports(AllocationType::UnifiedDevice),
            ),
            AllocationPolicy::LockablePreferred => (
                AllocationType::UnifiedShared,
                adapter.supports_lockable(AllocationType::UnifiedShared),
            ),
        };

        if supported {
            return Ok(preferred);
        }

        // Fallback to host allocations in case the preferred tier isn't available.
        if adapter.supports(AllocationType::UnifiedHost) {
            return Ok(AllocationType::UnifiedHost);
        }

        Err(PolicyError::NoUsableUnifiedTier {
            policy: *self,
            backtrace: BackTrace::capture(),
        })
    }
}

impl core::fmt::Display for AllocationPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AllocationPolicy::General => f.write_str("general"),
            AllocationPolicy::LockablePreferred => f.write_str("lockable-preferred"),
        }
    }
}
