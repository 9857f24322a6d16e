use std::collections::BTreeMap;

use devmem_runtime::{
    device::{Device, DeviceInfo, DeviceQuery, MemoryCapabilities},
    AllocationType,
};

pub const GIB: u64 = 1024 * 1024 * 1024;

/// A device exposing the given allocation types, with plain buffers as default type.
pub fn dummy_device(id: &str, name: &str, types: &[AllocationType]) -> Device {
    Device::new(
        id.to_string(),
        DeviceInfo::new(name.to_string(), 4 * GIB, AllocationType::PlainBuffer),
        MemoryCapabilities::new(types),
    )
}

/// A device supporting every allocation type.
pub fn full_device(id: &str) -> Device {
    dummy_device(id, &format!("Dummy GPU {id}"), &AllocationType::ALL)
}

/// Device discovery returning a fixed list of devices.
#[derive(Debug, Default)]
pub struct DummyDeviceQuery {
    devices: Vec<Device>,
}

impl DummyDeviceQuery {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl DeviceQuery for DummyDeviceQuery {
    fn backend_name(&self) -> &str {
        "dummy"
    }

    fn runtime_name(&self) -> &str {
        "dummy-runtime"
    }

    fn available_devices(&self) -> BTreeMap<String, Device> {
        self.devices
            .iter()
            .map(|device| (device.id().to_string(), device.clone()))
            .collect()
    }
}
