//! Import of externally owned native resources.
//!
//! Imported memory is tracked by the engine, but never released by it: the owner of the native
//! object stays responsible for destroying it once every derived
//! [memory object](crate::MemoryObject) is freed.

use crate::{
    allocation::{DataType, Layout},
    memory::{EngineId, MemoryObject},
};
use alloc::vec::Vec;
use core::num::NonZeroUsize;
use thiserror::Error;

/// Maximum number of planes of a platform surface (e.g. luma and chroma planes of NV12).
pub const MAX_SURFACE_PLANES: u32 = 3;

/// Errors raised when a native handle can't be imported. The caller may retry with a
/// corrected handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// The native handle is null.
    #[error("Can't import a null {kind} handle")]
    NullHandle {
        /// Name of the handle kind.
        kind: &'static str,
    },
    /// The handle kind doesn't match the layout.
    #[error("Can't import a {kind} handle with a layout where is_image={is_image}")]
    LayoutMismatch {
        /// Name of the handle kind.
        kind: &'static str,
        /// Whether the layout describes an image.
        is_image: bool,
    },
    /// The layout describes more bytes than can be addressed.
    #[error("Can't import a {kind} handle with a layout of {shape:?} {data_type:?} elements, its size overflows")]
    LayoutTooLarge {
        /// Name of the handle kind.
        kind: &'static str,
        /// The logical dimensions of the layout.
        shape: Vec<usize>,
        /// The element format of the layout.
        data_type: DataType,
    },
    /// The surface plane index is out of range.
    #[error("Surface plane {plane} is out of range, surfaces have at most {max} planes", max = MAX_SURFACE_PLANES)]
    InvalidPlane {
        /// The requested plane.
        plane: u32,
    },
}

/// An opaque, non-null native handle value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(NonZeroUsize);

impl NativeHandle {
    /// Wrap a raw handle value.
    pub fn new(raw: usize) -> Result<Self, ImportError> {
        Self::checked(raw, "native")
    }

    /// Wrap a raw pointer.
    pub fn from_ptr<T>(ptr: *mut T) -> Result<Self, ImportError> {
        Self::checked(ptr as usize, "pointer")
    }

    /// The raw handle value.
    pub fn raw(&self) -> usize {
        self.0.get()
    }

    /// The handle as a raw pointer.
    pub fn as_ptr<T>(&self) -> *mut T {
        self.0.get() as *mut T
    }

    fn checked(raw: usize, kind: &'static str) -> Result<Self, ImportError> {
        NonZeroUsize::new(raw)
            .map(Self)
            .ok_or(ImportError::NullHandle { kind })
    }
}

impl core::fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("NativeHandle({:#x})", self.0.get()))
    }
}

/// An externally owned native resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharedHandle {
    /// An opaque buffer object.
    Buffer(NativeHandle),
    /// An opaque image object.
    Image(NativeHandle),
    /// A raw unified memory pointer.
    Unified(NativeHandle),
    /// One plane of a platform display surface.
    Surface {
        /// The surface handle.
        surface: NativeHandle,
        /// The plane index.
        plane: u32,
    },
    /// A platform specific buffer object.
    PlatformBuffer(NativeHandle),
}

impl SharedHandle {
    /// Name of the handle kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SharedHandle::Buffer(_) => "buffer",
            SharedHandle::Image(_) => "image",
            SharedHandle::Unified(_) => "unified memory",
            SharedHandle::Surface { .. } => "surface",
            SharedHandle::PlatformBuffer(_) => "platform buffer",
        }
    }

    /// The native handle.
    pub fn native(&self) -> NativeHandle {
        match self {
            SharedHandle::Buffer(handle)
            | SharedHandle::Image(handle)
            | SharedHandle::Unified(handle)
            | SharedHandle::PlatformBuffer(handle) => *handle,
            SharedHandle::Surface { surface, .. } => *surface,
        }
    }

    /// Whether the handle refers to an image-like object.
    fn is_image(&self) -> bool {
        matches!(self, SharedHandle::Image(_) | SharedHandle::Surface { .. })
    }
}

/// Wrap a native handle into a non-owning memory object.
pub(crate) fn import<Resource>(
    engine: EngineId,
    layout: Layout,
    handle: SharedHandle,
) -> Result<MemoryObject<Resource>, ImportError> {
    if handle.is_image() != layout.is_image {
        return Err(ImportError::LayoutMismatch {
            kind: handle.kind(),
            is_image: layout.is_image,
        });
    }

    if let SharedHandle::Surface { plane, .. } = handle {
        if plane >= MAX_SURFACE_PLANES {
            return Err(ImportError::InvalidPlane { plane });
        }
    }

    let size = checked_size(&layout, handle.kind())?;
    Ok(MemoryObject::imported(engine, layout, size, handle))
}

/// Wrap a caller provided pointer into a non-owning memory object.
pub(crate) fn attach<Resource, T>(
    engine: EngineId,
    layout: Layout,
    ptr: *mut T,
) -> Result<MemoryObject<Resource>, ImportError> {
    let ptr = NativeHandle::from_ptr(ptr)?;
    let size = checked_size(&layout, "pointer")?;
    Ok(MemoryObject::attached(engine, layout, size, ptr))
}

fn checked_size(layout: &Layout, kind: &'static str) -> Result<u64, ImportError> {
    layout
        .bytes_count()
        .ok_or_else(|| ImportError::LayoutTooLarge {
            kind,
            shape: layout.shape.clone(),
            data_type: layout.data_type,
        })
}
