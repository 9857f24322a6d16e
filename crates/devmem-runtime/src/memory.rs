use crate::{
    allocation::{AllocationType, Layout},
    import::{NativeHandle, SharedHandle},
};
use devmem_common::stream_id::StreamId;

/// Identifies an [engine](crate::Engine), so memory can't be freed on another engine.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug, PartialOrd, Ord)]
pub struct EngineId {
    value: u32,
}

impl EngineId {
    pub(crate) fn new() -> Self {
        use core::sync::atomic::{AtomicU32, Ordering};

        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let value = COUNTER.fetch_add(1, Ordering::Relaxed);
        if value == u32::MAX {
            core::panic!("Engine ID overflowed");
        }
        Self { value }
    }
}

impl core::fmt::Display for EngineId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("EngineId({})", self.value))
    }
}

/// Identifies a [memory object](MemoryObject) for the lifetime of the process.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug, PartialOrd, Ord)]
pub struct MemoryId {
    value: usize,
}

impl MemoryId {
    /// Create a new ID.
    pub(crate) fn new() -> Self {
        use core::sync::atomic::{AtomicUsize, Ordering};

        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let value = COUNTER.fetch_add(1, Ordering::Relaxed);
        if value == usize::MAX {
            core::panic!("Memory ID overflowed");
        }
        Self { value }
    }
}

impl core::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("MemoryId({})", self.value))
    }
}

/// Where the memory of a [memory object](MemoryObject) comes from.
#[derive(Debug)]
pub enum MemoryOrigin<Resource> {
    /// Allocated by the engine backend, the engine releases it on free.
    Allocated {
        /// The type the memory was allocated with.
        allocation_type: AllocationType,
        /// The native resource returned by the backend.
        resource: Resource,
    },
    /// An external native object; its owner stays responsible for destroying it.
    Imported(SharedHandle),
    /// Caller provided memory without any allocation metadata.
    Attached(NativeHandle),
}

/// Memory tracked by an engine.
///
/// A memory object is not [Clone]: giving it back to [Engine::free](crate::Engine::free)
/// consumes it, so it can only be freed once. It must be given back to the engine that created
/// it. Dropping it instead leaks the backend resource and leaves its bytes accounted forever.
#[must_use = "memory objects must be given back with `Engine::free`"]
#[derive(Debug)]
pub struct MemoryObject<Resource> {
    id: MemoryId,
    engine: EngineId,
    stream: StreamId,
    layout: Layout,
    size: u64,
    origin: MemoryOrigin<Resource>,
}

impl<Resource> MemoryObject<Resource> {
    pub(crate) fn allocated(
        engine: EngineId,
        layout: Layout,
        size: u64,
        allocation_type: AllocationType,
        resource: Resource,
    ) -> Self {
        Self::with_origin(
            engine,
            layout,
            size,
            MemoryOrigin::Allocated {
                allocation_type,
                resource,
            },
        )
    }

    pub(crate) fn imported(
        engine: EngineId,
        layout: Layout,
        size: u64,
        handle: SharedHandle,
    ) -> Self {
        Self::with_origin(engine, layout, size, MemoryOrigin::Imported(handle))
    }

    pub(crate) fn attached(engine: EngineId, layout: Layout, size: u64, ptr: NativeHandle) -> Self {
        Self::with_origin(engine, layout, size, MemoryOrigin::Attached(ptr))
    }

    fn with_origin(
        engine: EngineId,
        layout: Layout,
        size: u64,
        origin: MemoryOrigin<Resource>,
    ) -> Self {
        Self {
            id: MemoryId::new(),
            engine,
            stream: StreamId::current(),
            layout,
            size,
            origin,
        }
    }

    /// The memory id.
    pub fn id(&self) -> MemoryId {
        self.id
    }

    /// The engine the memory belongs to.
    pub fn engine(&self) -> EngineId {
        self.engine
    }

    /// The stream that created the memory.
    pub fn stream(&self) -> StreamId {
        self.stream
    }

    /// The layout the memory was created for.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Size of the memory in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The allocation type, `None` when the memory is externally owned.
    pub fn allocation_type(&self) -> Option<AllocationType> {
        match &self.origin {
            MemoryOrigin::Allocated {
                allocation_type, ..
            } => Some(*allocation_type),
            MemoryOrigin::Imported(_) | MemoryOrigin::Attached(_) => None,
        }
    }

    /// Whether the engine owns the memory and releases it on free.
    pub fn is_owned(&self) -> bool {
        matches!(self.origin, MemoryOrigin::Allocated { .. })
    }

    /// Whether the host can map the memory.
    ///
    /// Externally owned memory is only known to be lockable when it is a unified memory pointer
    /// or a caller provided host pointer.
    pub fn is_lockable(&self) -> bool {
        match &self.origin {
            MemoryOrigin::Allocated {
                allocation_type, ..
            } => allocation_type.is_lockable(),
            MemoryOrigin::Imported(handle) => matches!(handle, SharedHandle::Unified(_)),
            MemoryOrigin::Attached(_) => true,
        }
    }

    /// The origin of the memory.
    pub fn origin(&self) -> &MemoryOrigin<Resource> {
        &self.origin
    }

    /// The backend resource, if the memory was allocated by the engine.
    pub fn resource(&self) -> Option<&Resource> {
        match &self.origin {
            MemoryOrigin::Allocated { resource, .. } => Some(resource),
            MemoryOrigin::Imported(_) | MemoryOrigin::Attached(_) => None,
        }
    }

    pub(crate) fn into_origin(self) -> MemoryOrigin<Resource> {
        self.origin
    }
}
