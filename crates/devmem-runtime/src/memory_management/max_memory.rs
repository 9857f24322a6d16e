/// Process-wide upper bound of memory usable by engines, in bytes.
///
/// Initialized once, when the first engine is created, to the largest of the device global
/// memory and the host physical memory. Later engines observe the same value.
static MAX_MEMORY: spin::Once<u64> = spin::Once::new();

/// Access to the process-wide memory limit.
pub struct MaxMemory;

impl MaxMemory {
    /// Initialize the limit from the device memory, if not done already, and return it.
    pub fn init(device_memory: u64) -> u64 {
        *MAX_MEMORY.call_once(|| {
            let host_memory = host_memory_size();
            let max = u64::max(device_memory, host_memory);
            log::debug!(
                "Max memory size initialized to {max} bytes (device {device_memory}, host {host_memory})"
            );
            max
        })
    }

    /// The limit, if initialized.
    pub fn get() -> Option<u64> {
        MAX_MEMORY.get().copied()
    }
}

#[cfg(feature = "std")]
fn host_memory_size() -> u64 {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    system.total_memory()
}

#[cfg(not(feature = "std"))]
fn host_memory_size() -> u64 {
    0
}
