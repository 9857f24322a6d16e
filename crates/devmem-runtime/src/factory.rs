use crate::{
    backend::Backend,
    config::GlobalConfig,
    device::{Device, DeviceQuery, DeviceSelector},
    engine::{Engine, EngineError},
    memory_management::MaxMemory,
};
use alloc::string::ToString;
use alloc::sync::Arc;
use devmem_common::backtrace::BackTrace;

/// Creates [engines](Engine) bound to a discovered device.
pub struct EngineFactory;

impl EngineFactory {
    /// Create an engine with the [global config](GlobalConfig).
    pub fn create<Q, B>(
        query: &Q,
        backend: B,
        selector: &DeviceSelector,
    ) -> Result<Engine<B>, EngineError>
    where
        Q: DeviceQuery,
        B: Backend,
    {
        Self::create_with_config(query, backend, selector, GlobalConfig::get())
    }

    /// Create an engine with the given config.
    ///
    /// Fails when discovery doesn't report any device: nothing can be done without installing
    /// or updating the drivers. A device requested by id that can't be found falls back to the
    /// first device.
    pub fn create_with_config<Q, B>(
        query: &Q,
        backend: B,
        selector: &DeviceSelector,
        config: Arc<GlobalConfig>,
    ) -> Result<Engine<B>, EngineError>
    where
        Q: DeviceQuery,
        B: Backend,
    {
        let mut devices = query.available_devices();

        let requested = match selector {
            DeviceSelector::Id(id) => {
                let device = devices.remove(id);
                if device.is_none() {
                    log::warn!("Device {id} not found, falling back to the first device");
                }
                device
            }
            DeviceSelector::Default => None,
        };

        let device = match requested {
            Some(device) => device,
            None => match devices.into_values().next() {
                Some(device) => device,
                None => {
                    return Err(EngineError::NoDevices {
                        backend: query.backend_name().to_string(),
                        runtime: query.runtime_name().to_string(),
                        backtrace: BackTrace::capture(),
                    });
                }
            },
        };

        Ok(Self::from_device(device, backend, config))
    }

    /// Create an engine bound to the given device.
    pub fn from_device<B: Backend>(
        device: Device,
        backend: B,
        config: Arc<GlobalConfig>,
    ) -> Engine<B> {
        log::info!("Selected device: {}", device.name());
        MaxMemory::init(device.total_memory());

        Engine::new(device, backend, config)
    }
}
