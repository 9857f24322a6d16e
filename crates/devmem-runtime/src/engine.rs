use crate::{
    allocation::{AllocationType, DataType, Layout},
    backend::{Backend, BackendError},
    capabilities::CapabilityAdapter,
    config::GlobalConfig,
    device::Device,
    import::{self, ImportError, NativeHandle, SharedHandle},
    logging::{EngineLogger, MemoryEvent},
    memory::{EngineId, MemoryId, MemoryObject, MemoryOrigin},
    memory_management::{AllocationPolicy, LedgerError, MaxMemory, PolicyError, UsageLedger},
};
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use devmem_common::backtrace::BackTrace;
use thiserror::Error;

/// Errors returned by the [engine](Engine) and its [factory](crate::EngineFactory).
#[derive(Error, Clone)]
pub enum EngineError {
    /// Device discovery didn't find any device.
    #[error(
        "Can't create a {backend} engine for the {runtime} runtime as no suitable devices are found\nPlease check that the GPU drivers are installed and up to date.\nBacktrace\n{backtrace}"
    )]
    NoDevices {
        /// Name of the backend.
        backend: String,
        /// Name of the runtime.
        runtime: String,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
    /// The requested allocation type isn't supported by the device.
    #[error(
        "The device {device} doesn't support allocations of type {allocation_type}\nBacktrace\n{backtrace}"
    )]
    UnsupportedAllocation {
        /// The requested type.
        allocation_type: AllocationType,
        /// Name of the device.
        device: String,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
    /// The layout describes more bytes than can be addressed.
    #[error(
        "Can't allocate a layout of {shape:?} {data_type:?} elements, its size overflows\nBacktrace\n{backtrace}"
    )]
    LayoutTooLarge {
        /// The logical dimensions of the layout.
        shape: Vec<usize>,
        /// The element format of the layout.
        data_type: DataType,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
    /// The memory was created by another engine.
    #[error("{memory} belongs to {owner} and can't be freed by {engine}\nBacktrace\n{backtrace}")]
    ForeignMemory {
        /// The memory that was freed.
        memory: MemoryId,
        /// The engine that created the memory.
        owner: EngineId,
        /// The engine the memory was given to.
        engine: EngineId,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
    /// No allocation type could be chosen for the request.
    #[error("An allocation policy error happened\nCaused by:\n  {0}")]
    Policy(#[from] PolicyError),
    /// The memory bookkeeping is inconsistent.
    #[error("A memory bookkeeping error happened\nCaused by:\n  {0}")]
    Ledger(#[from] LedgerError),
    /// A native handle couldn't be imported.
    #[error("An import error happened\nCaused by:\n  {0}")]
    Import(#[from] ImportError),
    /// The backend failed to allocate the memory.
    #[error("A backend error happened\nCaused by:\n  {0}")]
    Backend(#[from] BackendError),
}

impl core::fmt::Debug for EngineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

/// Memory engine bound to one device for its entire lifetime.
///
/// The engine is a passive object shared between threads. The only mutable state is the
/// [usage ledger](UsageLedger); its lock is never held while the [backend](Backend) is called.
#[derive(Debug)]
pub struct Engine<B: Backend> {
    id: EngineId,
    device: Device,
    adapter: CapabilityAdapter,
    ledger: UsageLedger,
    backend: B,
    logger: EngineLogger,
}

impl<B: Backend> Engine<B> {
    pub(crate) fn new(device: Device, backend: B, config: Arc<GlobalConfig>) -> Self {
        let adapter = CapabilityAdapter::new(device.capabilities(), config.memory.disable_usm);

        Self {
            id: EngineId::new(),
            device,
            adapter,
            ledger: UsageLedger::new(),
            backend,
            logger: EngineLogger::from_config(&config),
        }
    }

    /// The engine id, recorded in every memory object it creates.
    pub fn id(&self) -> EngineId {
        self.id
    }

    /// The device the engine is bound to.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The backend performing the allocations.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Whether unified memory can be used on this engine.
    pub fn use_unified_shared_memory(&self) -> bool {
        self.adapter.use_unified_shared_memory()
    }

    /// Whether the general allocation path may use the given type.
    pub fn supports_allocation(&self, ty: AllocationType) -> bool {
        self.adapter.supports(ty)
    }

    /// The largest of the device memory and the host memory, computed once per process.
    pub fn max_memory_size(&self) -> u64 {
        MaxMemory::init(self.device.total_memory())
    }

    /// The allocation type used by [allocate](Self::allocate).
    pub fn preferred_allocation_type(&self, is_image: bool) -> Result<AllocationType, PolicyError> {
        AllocationPolicy::General.resolve(
            is_image,
            &self.adapter,
            self.device.default_allocation_type(),
        )
    }

    /// The allocation type used by [allocate_lockable](Self::allocate_lockable).
    pub fn lockable_preferred_allocation_type(
        &self,
        is_image: bool,
    ) -> Result<AllocationType, PolicyError> {
        AllocationPolicy::LockablePreferred.resolve(
            is_image,
            &self.adapter,
            self.device.default_allocation_type(),
        )
    }

    /// Allocate memory for the layout with the general allocation policy.
    ///
    /// When `reset` is set, the memory is zeroed.
    pub fn allocate(
        &self,
        layout: &Layout,
        reset: bool,
    ) -> Result<MemoryObject<B::Resource>, EngineError> {
        let ty = self.preferred_allocation_type(layout.is_image)?;
        log::trace!("The {} policy resolved to {ty}", AllocationPolicy::General);
        self.allocate_unchecked(layout, ty, reset)
    }

    /// Allocate memory the host can map, with the lockable-preferred allocation policy.
    pub fn allocate_lockable(
        &self,
        layout: &Layout,
    ) -> Result<MemoryObject<B::Resource>, EngineError> {
        let ty = self.lockable_preferred_allocation_type(layout.is_image)?;
        log::trace!("The {} policy resolved to {ty}", AllocationPolicy::LockablePreferred);
        self.allocate_unchecked(layout, ty, false)
    }

    /// Allocate memory with an explicit allocation type.
    ///
    /// [Unified shared](AllocationType::UnifiedShared) memory can be requested here when the
    /// device supports it.
    pub fn allocate_with_type(
        &self,
        layout: &Layout,
        ty: AllocationType,
        reset: bool,
    ) -> Result<MemoryObject<B::Resource>, EngineError> {
        if !self.adapter.supports_lockable(ty) {
            return Err(EngineError::UnsupportedAllocation {
                allocation_type: ty,
                device: self.device.name().into(),
                backtrace: BackTrace::capture(),
            });
        }

        self.allocate_unchecked(layout, ty, reset)
    }

    /// Give memory back to the engine.
    ///
    /// Memory allocated by the engine is released by the backend. Imported and attached memory
    /// is only removed from the bookkeeping, the native resource is never released.
    ///
    /// Memory created by another engine is rejected with [EngineError::ForeignMemory] and dropped
    /// without touching this engine.
    pub fn free(&self, memory: MemoryObject<B::Resource>) -> Result<(), EngineError> {
        if memory.engine() != self.id {
            return Err(EngineError::ForeignMemory {
                memory: memory.id(),
                owner: memory.engine(),
                engine: self.id,
                backtrace: BackTrace::capture(),
            });
        }

        let size = memory.size();
        let result = match memory.origin() {
            MemoryOrigin::Allocated {
                allocation_type, ..
            } => self.ledger.debit(*allocation_type, size),
            MemoryOrigin::Imported(_) => self.ledger.debit_imported(size),
            MemoryOrigin::Attached(_) => Ok(()),
        };

        self.logger
            .log_event(MemoryEvent::Freed, &memory, || self.ledger.snapshot());

        // The resource is released even when the bookkeeping is broken, the error is still
        // reported to the caller.
        if let MemoryOrigin::Allocated { resource, .. } = memory.into_origin() {
            self.backend.deallocate(resource);
        }

        result.map_err(EngineError::from)
    }

    /// Import an externally owned native resource.
    pub fn import(
        &self,
        layout: &Layout,
        handle: SharedHandle,
    ) -> Result<MemoryObject<B::Resource>, EngineError> {
        let memory = import::import(self.id, layout.clone(), handle)?;
        self.ledger.credit_imported(memory.size())?;

        log::trace!("Imported {} handle {:?}", handle.kind(), handle.native());
        self.logger
            .log_event(MemoryEvent::Imported, &memory, || self.ledger.snapshot());

        Ok(memory)
    }

    /// Import an opaque buffer object.
    pub fn share_buffer(
        &self,
        layout: &Layout,
        buffer: NativeHandle,
    ) -> Result<MemoryObject<B::Resource>, EngineError> {
        self.import(layout, SharedHandle::Buffer(buffer))
    }

    /// Import an opaque image object.
    pub fn share_image(
        &self,
        layout: &Layout,
        image: NativeHandle,
    ) -> Result<MemoryObject<B::Resource>, EngineError> {
        self.import(layout, SharedHandle::Image(image))
    }

    /// Import a unified memory pointer.
    pub fn share_unified(
        &self,
        layout: &Layout,
        ptr: NativeHandle,
    ) -> Result<MemoryObject<B::Resource>, EngineError> {
        self.import(layout, SharedHandle::Unified(ptr))
    }

    /// Import one plane of a platform display surface.
    pub fn share_surface(
        &self,
        layout: &Layout,
        surface: NativeHandle,
        plane: u32,
    ) -> Result<MemoryObject<B::Resource>, EngineError> {
        self.import(layout, SharedHandle::Surface { surface, plane })
    }

    /// Import a platform specific buffer object.
    pub fn share_platform_buffer(
        &self,
        layout: &Layout,
        buffer: NativeHandle,
    ) -> Result<MemoryObject<B::Resource>, EngineError> {
        self.import(layout, SharedHandle::PlatformBuffer(buffer))
    }

    /// Wrap caller provided memory, e.g. scratch space, without taking ownership of it.
    ///
    /// Attached memory has no allocation metadata and isn't accounted in the ledger.
    pub fn attach<T>(
        &self,
        layout: &Layout,
        ptr: *mut T,
    ) -> Result<MemoryObject<B::Resource>, EngineError> {
        let memory = import::attach(self.id, layout.clone(), ptr)?;
        self.logger
            .log_event(MemoryEvent::Imported, &memory, || self.ledger.snapshot());

        Ok(memory)
    }

    /// Bytes currently allocated with the given type.
    pub fn used_memory(&self, ty: AllocationType) -> u64 {
        self.ledger.current(ty)
    }

    /// Highest amount of bytes allocated at once with the given type.
    pub fn peak_memory(&self, ty: AllocationType) -> u64 {
        self.ledger.peak(ty)
    }

    /// Sum of the peaks of every allocation type.
    pub fn peak_memory_total(&self) -> u64 {
        self.ledger.peak_total()
    }

    /// Bytes of imported memory currently tracked.
    pub fn imported_memory(&self) -> u64 {
        self.ledger.imported()
    }

    /// Bytes currently in use per allocation type name.
    pub fn memory_statistics(&self) -> BTreeMap<String, u64> {
        self.ledger.snapshot()
    }

    fn allocate_unchecked(
        &self,
        layout: &Layout,
        ty: AllocationType,
        reset: bool,
    ) -> Result<MemoryObject<B::Resource>, EngineError> {
        let bytes = layout
            .bytes_count()
            .ok_or_else(|| EngineError::LayoutTooLarge {
                shape: layout.shape.clone(),
                data_type: layout.data_type,
                backtrace: BackTrace::capture(),
            })?;

        let resource = match self.backend.allocate(layout, ty, reset) {
            Ok(resource) => resource,
            Err(err) => {
                log::debug!("Allocation of {bytes} bytes of type {ty} failed: {err}");
                return Err(err.into());
            }
        };

        if let Err(err) = self.ledger.credit(ty, bytes) {
            self.backend.deallocate(resource);
            return Err(err.into());
        }
        log::debug!("Allocated {bytes} bytes of type {ty}");

        let memory = MemoryObject::allocated(self.id, layout.clone(), bytes, ty, resource);

        self.logger
            .log_event(MemoryEvent::Allocated, &memory, || self.ledger.snapshot());

        Ok(memory)
    }
}
