use super::{device::DeviceConfig, memory::MemoryConfig};
use alloc::sync::Arc;

/// Static mutex holding the global configuration, initialized as `None`.
static DEVMEM_GLOBAL_CONFIG: spin::Mutex<Option<Arc<GlobalConfig>>> = spin::Mutex::new(None);

/// Represents the global configuration of devmem, combining memory and device settings.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GlobalConfig {
    /// Configuration of the memory engine.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Configuration of device selection.
    #[serde(default)]
    pub device: DeviceConfig,
}

impl GlobalConfig {
    /// Retrieves the current global configuration, loading it if not set.
    ///
    /// If no configuration is set, it attempts to load one from `devmem.toml` or `DevMem.toml`
    /// in the current directory or its parents, then from the user config directory. If no
    /// file is found, a default configuration is used. Environment variables are applied on top.
    ///
    /// # Notes
    ///
    /// Calling this function goes through a global lock. Read the values you need once, when
    /// an engine is created, instead of calling it in hot paths.
    pub fn get() -> Arc<Self> {
        let mut state = DEVMEM_GLOBAL_CONFIG.lock();

        match state.as_ref() {
            Some(config) => config.clone(),
            None => {
                cfg_if::cfg_if! {
                    if #[cfg(std_io)] {
                        let config = Self::from_current_dir().override_from_env();
                    } else {
                        let config = Self::default();
                    }
                }

                let config = Arc::new(config);
                *state = Some(config.clone());
                config
            }
        }
    }

    /// Sets the global configuration to the provided value.
    ///
    /// # Panics
    /// Panics if the configuration has already been set or read, as it cannot be overridden.
    ///
    /// # Warning
    /// This method must be called at the start of the program, before any calls to `get`.
    pub fn set(config: Self) {
        let mut state = DEVMEM_GLOBAL_CONFIG.lock();
        if state.is_some() {
            panic!("Cannot set the global configuration multiple times.");
        }
        *state = Some(Arc::new(config));
    }

    #[cfg(std_io)]
    /// Overrides configuration fields based on environment variables.
    pub fn override_from_env(mut self) -> Self {
        use super::memory::MemoryLogLevel;

        if let Ok(val) = std::env::var("DEVMEM_DEBUG_LOG") {
            self.memory.logger.level = MemoryLogLevel::Basic;

            match val.as_str() {
                "stdout" => self.memory.logger.stdout = true,
                "stderr" => self.memory.logger.stderr = true,
                "1" | "true" => {
                    self.memory.logger.file = Some("/tmp/devmem.log".into());
                }
                "full" => self.memory.logger.level = MemoryLogLevel::Full,
                "0" | "false" => self.memory.logger.level = MemoryLogLevel::Disabled,
                file_path => self.memory.logger.file = Some(file_path.into()),
            }
        };

        if let Ok(val) = std::env::var("DEVMEM_DISABLE_USM") {
            match val.as_str() {
                "1" | "true" => self.memory.disable_usm = true,
                "0" | "false" => self.memory.disable_usm = false,
                other => log::warn!("Ignoring invalid DEVMEM_DISABLE_USM value {other:?}"),
            }
        }

        if let Ok(val) = std::env::var("DEVMEM_DEVICE_ID") {
            if !val.is_empty() {
                self.device.id = Some(val);
            }
        }

        self
    }

    // Loads configuration from `devmem.toml` or `DevMem.toml` in the current directory or its
    // parents, then from the user config directory.
    #[cfg(std_io)]
    fn from_current_dir() -> Self {
        if let Ok(mut dir) = std::env::current_dir() {
            loop {
                if let Some(config) = Self::from_file_path(dir.join("devmem.toml")) {
                    return config;
                }

                if let Some(config) = Self::from_file_path(dir.join("DevMem.toml")) {
                    return config;
                }

                if !dir.pop() {
                    break;
                }
            }
        }

        if let Some(dir) = dirs::config_dir() {
            if let Some(config) = Self::from_file_path(dir.join("devmem").join("devmem.toml")) {
                return config;
            }
        }

        Self::default()
    }

    // Loads configuration from a specified file path. A file that can't be parsed is reported
    // and ignored.
    #[cfg(std_io)]
    fn from_file_path<P: AsRef<std::path::Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).ok()?;

        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(err) => {
                log::warn!("Ignoring config file {path:?} with an invalid format: {err}");
                None
            }
        }
    }
}
