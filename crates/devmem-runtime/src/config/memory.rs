use super::logger::{LogLevel, LoggerConfig};

/// Configuration of the memory engine.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MemoryConfig {
    /// Logger configuration for memory events.
    #[serde(default)]
    pub logger: LoggerConfig<MemoryLogLevel>,
    /// Disable every unified memory type, regardless of the device capabilities.
    #[serde(default)]
    pub disable_usm: bool,
}

/// Log levels for memory events.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MemoryLogLevel {
    /// Memory logging is disabled.
    #[default]
    #[serde(rename = "disabled")]
    Disabled,

    /// Allocations, frees and imports are logged.
    #[serde(rename = "basic")]
    Basic,

    /// Memory statistics are logged after every event as well.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for MemoryLogLevel {}
