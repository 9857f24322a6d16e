use alloc::string::String;

/// Configuration of the device an engine binds to.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DeviceConfig {
    /// Id of the device to bind, the first available device is used when not set or not found.
    #[serde(default)]
    pub id: Option<String>,
}
