use crate::config::{memory::MemoryLogLevel, GlobalConfig, Logger};
use crate::memory::MemoryObject;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use devmem_common::{format::format_bytes, stream_id::StreamId};

/// What happened to a memory object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryEvent {
    /// The engine allocated the memory.
    Allocated,
    /// An external resource was imported or attached.
    Imported,
    /// The memory was given back to the engine.
    Freed,
}

impl core::fmt::Display for MemoryEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MemoryEvent::Allocated => f.pad("allocate"),
            MemoryEvent::Imported => f.pad("import"),
            MemoryEvent::Freed => f.pad("free"),
        }
    }
}

/// Engine logger.
///
/// Memory events are only formatted when the memory logger is activated.
#[derive(Debug)]
pub struct EngineLogger {
    kind: EngineLoggerKind,
}

#[derive(Debug)]
enum EngineLoggerKind {
    /// Activated logger, with statistics when `full` is set.
    Activated { logger: spin::Mutex<Logger>, full: bool },
    /// Don't log information.
    None,
}

impl EngineLogger {
    /// Create the logger from the given configuration.
    pub fn from_config(config: &GlobalConfig) -> Self {
        let kind = match config.memory.logger.level {
            MemoryLogLevel::Disabled => EngineLoggerKind::None,
            MemoryLogLevel::Basic => EngineLoggerKind::Activated {
                logger: spin::Mutex::new(Logger::from_config(config)),
                full: false,
            },
            MemoryLogLevel::Full => EngineLoggerKind::Activated {
                logger: spin::Mutex::new(Logger::from_config(config)),
                full: true,
            },
        };

        Self { kind }
    }

    /// Log a memory event, tagged with the stream that created the memory.
    ///
    /// Frees issued from another stream also name the freeing stream. `statistics` is only
    /// called when statistics are logged as well.
    pub fn log_event<R, F>(&self, event: MemoryEvent, memory: &MemoryObject<R>, statistics: F)
    where
        F: FnOnce() -> BTreeMap<String, u64>,
    {
        let EngineLoggerKind::Activated { logger, full } = &self.kind else {
            return;
        };

        let kind = match memory.allocation_type() {
            Some(ty) => ty.name(),
            None => "external",
        };
        let mut msg = format!(
            "[{}] {event:<8} {} {kind} {} ({:?})",
            memory.stream(),
            memory.id(),
            format_bytes(memory.size()),
            memory.layout().shape,
        );

        if event == MemoryEvent::Freed {
            let current = StreamId::current();
            if current != memory.stream() {
                msg += &format!(" from {current}");
            }
        }

        if *full {
            for (name, bytes) in statistics() {
                msg += &format!("\n  - {name:<16} {}", format_bytes(bytes));
            }
        }

        logger.lock().log_memory(&msg);
    }
}
