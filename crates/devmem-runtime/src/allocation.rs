use alloc::vec::Vec;

/// Where an allocation lives and whether the host can map it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AllocationType {
    /// Unified memory resident on the device. Fastest for compute, not host mappable.
    UnifiedDevice,
    /// Unified memory resident on the host, accessible by the device.
    UnifiedHost,
    /// Unified memory migrating between host and device with coherence guarantees.
    UnifiedShared,
    /// A plain device buffer object.
    PlainBuffer,
    /// An image object.
    Image,
}

impl AllocationType {
    /// Every allocation type, in declaration order.
    pub const ALL: [AllocationType; 5] = [
        AllocationType::UnifiedDevice,
        AllocationType::UnifiedHost,
        AllocationType::UnifiedShared,
        AllocationType::PlainBuffer,
        AllocationType::Image,
    ];

    /// Whether the type belongs to the unified memory tiers.
    pub fn is_unified(&self) -> bool {
        matches!(
            self,
            AllocationType::UnifiedDevice
                | AllocationType::UnifiedHost
                | AllocationType::UnifiedShared
        )
    }

    /// Whether the host can map memory of this type without an explicit transfer.
    pub fn is_lockable(&self) -> bool {
        match self {
            AllocationType::UnifiedHost
            | AllocationType::UnifiedShared
            | AllocationType::PlainBuffer => true,
            AllocationType::UnifiedDevice | AllocationType::Image => false,
        }
    }

    /// The stable name used in statistics and logs.
    pub fn name(&self) -> &'static str {
        match self {
            AllocationType::UnifiedDevice => "unified_device",
            AllocationType::UnifiedHost => "unified_host",
            AllocationType::UnifiedShared => "unified_shared",
            AllocationType::PlainBuffer => "plain_buffer",
            AllocationType::Image => "image",
        }
    }
}

impl core::fmt::Display for AllocationType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Element format of a memory request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 64-bit float.
    F64,
    /// 32-bit float.
    F32,
    /// 16-bit float.
    F16,
    /// 64-bit signed integer.
    I64,
    /// 32-bit signed integer.
    I32,
    /// 8-bit signed integer.
    I8,
    /// 8-bit unsigned integer.
    U8,
    /// Boolean stored on one byte.
    Bool,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            DataType::F64 | DataType::I64 => 8,
            DataType::F32 | DataType::I32 => 4,
            DataType::F16 => 2,
            DataType::I8 | DataType::U8 | DataType::Bool => 1,
        }
    }
}

/// Describes a memory request: logical shape, element format and whether it targets an image.
#[derive(new, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Layout {
    /// Logical dimensions. An empty shape describes a scalar.
    pub shape: Vec<usize>,
    /// Element format.
    pub data_type: DataType,
    /// Whether the request must be backed by an image object.
    pub is_image: bool,
}

impl Layout {
    /// Create a buffer layout.
    pub fn buffer(shape: impl Into<Vec<usize>>, data_type: DataType) -> Self {
        Self::new(shape.into(), data_type, false)
    }

    /// Create an image layout.
    pub fn image(shape: impl Into<Vec<usize>>, data_type: DataType) -> Self {
        Self::new(shape.into(), data_type, true)
    }

    /// Number of elements described by the shape, `None` when it overflows a `usize`.
    pub fn count(&self) -> Option<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |count, dim| count.checked_mul(*dim))
    }

    /// Number of bytes needed to store the layout, `None` when it overflows a `u64`.
    pub fn bytes_count(&self) -> Option<u64> {
        let elem_size = self.data_type.size() as u64;
        self.shape
            .iter()
            .try_fold(elem_size, |bytes, dim| bytes.checked_mul(*dim as u64))
    }
}
