use std::sync::{Arc, Mutex};

use devmem_runtime::{
    backend::{Backend, BackendError},
    AllocationType, Layout,
};

/// Memory returned by the dummy backend.
#[derive(Debug, PartialEq, Eq)]
pub struct DummyResource {
    pub id: u64,
    pub bytes: u64,
    pub allocation_type: AllocationType,
    pub zeroed: bool,
}

#[derive(Debug, Default)]
struct DummyState {
    next_id: u64,
    in_use: u64,
    allocated: Vec<u64>,
    deallocated: Vec<u64>,
}

/// The dummy backend is used to test the engine without any driver.
/// Allocations only move counters around and can be limited to a capacity.
#[derive(Debug, Clone, Default)]
pub struct DummyBackend {
    capacity: Option<u64>,
    state: Arc<Mutex<DummyState>>,
}

impl DummyBackend {
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            capacity: Some(capacity),
            state: Default::default(),
        }
    }

    /// Ids of every resource returned by the backend.
    pub fn allocated(&self) -> Vec<u64> {
        self.state.lock().unwrap().allocated.clone()
    }

    /// Ids of every resource released by the backend.
    pub fn deallocated(&self) -> Vec<u64> {
        self.state.lock().unwrap().deallocated.clone()
    }

    pub fn in_use(&self) -> u64 {
        self.state.lock().unwrap().in_use
    }
}

impl Backend for DummyBackend {
    type Resource = DummyResource;

    fn allocate(
        &self,
        layout: &Layout,
        allocation_type: AllocationType,
        reset: bool,
    ) -> Result<Self::Resource, BackendError> {
        let bytes = layout
            .bytes_count()
            .expect("The engine only forwards layouts with a byte count");
        let mut state = self.state.lock().unwrap();

        if let Some(capacity) = self.capacity {
            if state.in_use + bytes > capacity {
                return Err(BackendError::OutOfMemory {
                    requested: bytes,
                    allocation_type,
                });
            }
        }

        let id = state.next_id;
        state.next_id += 1;
        state.in_use += bytes;
        state.allocated.push(id);

        Ok(DummyResource {
            id,
            bytes,
            allocation_type,
            zeroed: reset,
        })
    }

    fn deallocate(&self, resource: Self::Resource) {
        let mut state = self.state.lock().unwrap();
        state.in_use -= resource.bytes;
        state.deallocated.push(resource.id);
    }
}
