use crate::allocation::AllocationType;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use devmem_common::backtrace::BackTrace;
use hashbrown::HashMap;
use thiserror::Error;

/// What a ledger counter tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageKind {
    /// Memory allocated by the engine with the given type.
    Allocated(AllocationType),
    /// Externally owned memory imported into the engine.
    Imported,
}

impl core::fmt::Display for UsageKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UsageKind::Allocated(ty) => f.write_str(ty.name()),
            UsageKind::Imported => f.write_str("imported"),
        }
    }
}

/// Bookkeeping errors, they always indicate a lifetime bug in the caller.
#[derive(Error, Clone)]
pub enum LedgerError {
    /// Memory was freed for a kind that never had memory accounted.
    #[error("Attempt to free unallocated memory of kind {kind}\nBacktrace\n{backtrace}")]
    UntrackedType {
        /// The kind that was debited.
        kind: UsageKind,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
    /// More memory was freed than is currently tracked.
    #[error(
        "Attempt to free {requested} bytes of kind {kind} while only {current} bytes are in use\nBacktrace\n{backtrace}"
    )]
    Underflow {
        /// The kind that was debited.
        kind: UsageKind,
        /// The amount of bytes debited.
        requested: u64,
        /// The amount of bytes tracked.
        current: u64,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
    /// The counter can't represent the memory in use anymore.
    #[error(
        "Attempt to account {requested} more bytes of kind {kind} on top of {current} bytes in use\nBacktrace\n{backtrace}"
    )]
    Overflow {
        /// The kind that was credited.
        kind: UsageKind,
        /// The amount of bytes credited.
        requested: u64,
        /// The amount of bytes tracked.
        current: u64,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
}

impl core::fmt::Debug for LedgerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct UsageEntry {
    current: u64,
    peak: u64,
}

/// Thread safe byte counters per [allocation type](AllocationType), plus one counter for
/// imported memory.
///
/// Every operation goes through one lock held for a single map access, so operations on the
/// same kind are linearized. Nothing else happens while the lock is held: errors and names are
/// built after it is released.
#[derive(Debug, Default)]
pub struct UsageLedger {
    entries: spin::Mutex<HashMap<UsageKind, UsageEntry>>,
}

impl UsageLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account `bytes` more memory in use for the given type.
    ///
    /// Fails without touching the counters when the total doesn't fit in a `u64`.
    pub fn credit(&self, ty: AllocationType, bytes: u64) -> Result<(), LedgerError> {
        self.credit_kind(UsageKind::Allocated(ty), bytes)
    }

    /// Account `bytes` less memory in use for the given type.
    ///
    /// Fails without touching the counters when the type was never credited or when less than
    /// `bytes` are currently tracked.
    pub fn debit(&self, ty: AllocationType, bytes: u64) -> Result<(), LedgerError> {
        self.debit_kind(UsageKind::Allocated(ty), bytes)
    }

    /// Account `bytes` more imported memory.
    pub fn credit_imported(&self, bytes: u64) -> Result<(), LedgerError> {
        self.credit_kind(UsageKind::Imported, bytes)
    }

    /// Account `bytes` less imported memory.
    pub fn debit_imported(&self, bytes: u64) -> Result<(), LedgerError> {
        self.debit_kind(UsageKind::Imported, bytes)
    }

    /// Bytes currently in use for the given type.
    pub fn current(&self, ty: AllocationType) -> u64 {
        self.read(UsageKind::Allocated(ty)).current
    }

    /// Highest amount of bytes ever in use at once for the given type.
    pub fn peak(&self, ty: AllocationType) -> u64 {
        self.read(UsageKind::Allocated(ty)).peak
    }

    /// Bytes of imported memory currently tracked.
    pub fn imported(&self) -> u64 {
        self.read(UsageKind::Imported).current
    }

    /// Sum of the peaks of every allocation type.
    ///
    /// The peaks may not have happened at the same time, so this is an upper bound of the
    /// memory footprint rather than a live total. Imported memory isn't owned by the engine
    /// and is left out. The sum saturates at `u64::MAX`.
    pub fn peak_total(&self) -> u64 {
        self.entries
            .lock()
            .iter()
            .filter(|(kind, _)| matches!(kind, UsageKind::Allocated(_)))
            .fold(0u64, |total, (_, entry)| total.saturating_add(entry.peak))
    }

    /// Bytes currently in use for each kind that was ever credited, keyed by kind name.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        let current: Vec<(UsageKind, u64)> = self
            .entries
            .lock()
            .iter()
            .map(|(kind, entry)| (*kind, entry.current))
            .collect();

        current
            .into_iter()
            .map(|(kind, bytes)| (kind.to_string(), bytes))
            .collect()
    }

    fn credit_kind(&self, kind: UsageKind, bytes: u64) -> Result<(), LedgerError> {
        // `Err(current)`: the new balance overflows.
        let outcome = {
            let mut entries = self.entries.lock();
            let entry = entries.entry(kind).or_default();
            match entry.current.checked_add(bytes) {
                Some(current) => {
                    entry.current = current;
                    entry.peak = u64::max(entry.peak, current);
                    Ok(())
                }
                None => Err(entry.current),
            }
        };

        outcome.map_err(|current| LedgerError::Overflow {
            kind,
            requested: bytes,
            current,
            backtrace: BackTrace::capture(),
        })
    }

    fn debit_kind(&self, kind: UsageKind, bytes: u64) -> Result<(), LedgerError> {
        // `Err(None)`: untracked kind, `Err(Some(current))`: not enough bytes tracked.
        let outcome = {
            let mut entries = self.entries.lock();
            match entries.get_mut(&kind) {
                None => Err(None),
                Some(entry) if bytes > entry.current => Err(Some(entry.current)),
                Some(entry) => {
                    entry.current -= bytes;
                    Ok(())
                }
            }
        };

        outcome.map_err(|current| match current {
            None => LedgerError::UntrackedType {
                kind,
                backtrace: BackTrace::capture(),
            },
            Some(current) => LedgerError::Underflow {
                kind,
                requested: bytes,
                current,
                backtrace: BackTrace::capture(),
            },
        })
    }

    fn read(&self, kind: UsageKind) -> UsageEntry {
        self.entries
            .lock()
            .get(&kind)
            .copied()
            .unwrap_or_default()
    }
}
