use crate::allocation::AllocationType;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;

/// The allocation types a device can serve, discovered once when the device is enumerated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCapabilities {
    set: BTreeSet<AllocationType>,
}

impl MemoryCapabilities {
    /// Create the capability set from the supported allocation types.
    pub fn new(types: &[AllocationType]) -> Self {
        let mut set = BTreeSet::new();
        for ty in types {
            set.insert(*ty);
        }

        Self { set }
    }

    /// Check if the provided [allocation type](AllocationType) is supported by the device.
    pub fn support_allocation_type(&self, ty: AllocationType) -> bool {
        self.set.contains(&ty)
    }

    /// Whether the device exposes at least one unified memory tier.
    pub fn supports_usm(&self) -> bool {
        self.set.iter().any(AllocationType::is_unified)
    }

    /// Iterate over the supported types.
    pub fn iter(&self) -> impl Iterator<Item = AllocationType> + '_ {
        self.set.iter().copied()
    }
}

/// Static information about a device.
#[derive(new, Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Human readable device name.
    pub name: String,
    /// Total device global memory in bytes.
    pub total_memory: u64,
    /// The non-unified allocation type used when unified memory can't be used.
    pub default_allocation_type: AllocationType,
}

/// A compute device as reported by device discovery.
///
/// The record is immutable: the engine only queries it.
#[derive(new, Debug, Clone, PartialEq, Eq)]
pub struct Device {
    id: String,
    info: DeviceInfo,
    capabilities: MemoryCapabilities,
}

impl Device {
    /// The id under which discovery reported the device.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The device name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Total device global memory in bytes.
    pub fn total_memory(&self) -> u64 {
        self.info.total_memory
    }

    /// The memory capabilities of the device.
    pub fn capabilities(&self) -> &MemoryCapabilities {
        &self.capabilities
    }

    /// The default allocation type of the device.
    pub fn default_allocation_type(&self) -> AllocationType {
        self.info.default_allocation_type
    }

    /// All static information about the device.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }
}

/// Device discovery for one backend/runtime combination.
pub trait DeviceQuery {
    /// Name of the backend the devices are queried for.
    fn backend_name(&self) -> &str;
    /// Name of the runtime the devices are queried for.
    fn runtime_name(&self) -> &str;
    /// Enumerate the available devices, keyed by device id.
    fn available_devices(&self) -> BTreeMap<String, Device>;
}

/// Which device an engine should bind to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeviceSelector {
    /// The first device reported by discovery.
    #[default]
    Default,
    /// The device with the given id, falling back to the first one when it isn't found.
    Id(String),
}

impl DeviceSelector {
    /// Build the selector from the `device.id` entry of the [global config](crate::config::GlobalConfig).
    pub fn from_config() -> Self {
        let config = crate::config::GlobalConfig::get();
        match &config.device.id {
            Some(id) => DeviceSelector::Id(id.clone()),
            None => DeviceSelector::Default,
        }
    }
}
