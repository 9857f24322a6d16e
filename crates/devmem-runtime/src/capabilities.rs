use crate::{allocation::AllocationType, device::MemoryCapabilities};

/// Read-only view answering which allocation types can be requested on a device.
///
/// The view combines the device [capabilities](MemoryCapabilities) with the process-wide
/// unified memory switch (`memory.disable_usm` in the [global config](crate::config::GlobalConfig)).
/// When the switch is off, every unified type is reported as unsupported.
#[derive(Debug, Clone)]
pub struct CapabilityAdapter {
    capabilities: MemoryCapabilities,
    usm_enabled: bool,
}

impl CapabilityAdapter {
    /// Create the adapter.
    ///
    /// `usm_disabled` is the process-wide switch, the device capabilities are copied.
    pub fn new(capabilities: &MemoryCapabilities, usm_disabled: bool) -> Self {
        Self {
            capabilities: capabilities.clone(),
            usm_enabled: !usm_disabled,
        }
    }

    /// Whether unified memory can be used at all.
    pub fn use_unified_shared_memory(&self) -> bool {
        self.usm_enabled && self.capabilities.supports_usm()
    }

    /// Whether the general allocation path may use the given type.
    ///
    /// [Unified shared](AllocationType::UnifiedShared) is never reported here, it is only
    /// available through [supports_lockable](Self::supports_lockable).
    pub fn supports(&self, ty: AllocationType) -> bool {
        if ty == AllocationType::UnifiedShared {
            return false;
        }

        self.supports_lockable(ty)
    }

    /// Whether the lockable allocation path may use the given type.
    pub fn supports_lockable(&self, ty: AllocationType) -> bool {
        if ty.is_unified() && !self.use_unified_shared_memory() {
            return false;
        }

        self.capabilities.support_allocation_type(ty)
    }
}
