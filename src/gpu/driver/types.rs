use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a buffer, texture, pipeline or descriptor set.
///
/// Bind caches compare identities, never contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(NonZeroU64);

impl ResourceId {
    pub fn next() -> Self {
        let raw = NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed);
        // The counter starts at one and a u64 will not wrap in practice.
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

/// Anything that carries a [`ResourceId`].
pub trait Identity {
    fn id(&self) -> ResourceId;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn from_size(w: u32, h: u32) -> Self {
        Self::new(0, 0, w as i32, h as i32)
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexClass {
    I16,
    I32,
}

impl IndexClass {
    pub fn element_size(&self) -> usize {
        match self {
            IndexClass::I16 => 2,
            IndexClass::I32 => 4,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Points,
    Lines,
    #[default]
    Triangles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8,
    RG8,
    RGBA8,
    R16,
    RG16,
    RGBA16,
    R32F,
    RG32F,
    RGBA32F,
    Depth16,
    Depth24S8,
    Depth32F,
}

impl TextureFormat {
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::RG8 | TextureFormat::R16 | TextureFormat::Depth16 => 2,
            TextureFormat::RGBA8
            | TextureFormat::RG16
            | TextureFormat::R32F
            | TextureFormat::Depth24S8
            | TextureFormat::Depth32F => 4,
            TextureFormat::RGBA16 | TextureFormat::RG32F => 8,
            TextureFormat::RGBA32F => 16,
        }
    }

    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth16 | TextureFormat::Depth24S8 | TextureFormat::Depth32F
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureLayout {
    Undefined,
    Sampler,
    ColorAttach,
    DepthAttach,
    Present,
    TransferSrc,
    TransferDest,
    Unordered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferLayout {
    Undefined,
    ComputeRead,
    ComputeWrite,
    VertexRead,
    IndexRead,
    UniformRead,
    TransferSrc,
    TransferDest,
}

/// Native encoder currently open on a command buffer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderKind {
    #[default]
    None,
    Draw,
    Compute,
    Blit,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    #[default]
    Idle,
    Recording,
    Ended,
}

bitflags! {
    #[repr(C)]
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "fresco-serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ShaderStages: u32 {
        const VERTEX   = 0x1;
        const FRAGMENT = 0x2;
        const COMPUTE  = 0x4;
        const GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

/// Capabilities the command buffers validate against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProperties {
    pub name: String,
    pub max_threads_per_group: u32,
    pub max_group_count: [u32; 3],
    pub max_push_bytes: u32,
}

impl Default for DeviceProperties {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_threads_per_group: 1024,
            max_group_count: [65535; 3],
            max_push_bytes: 128,
        }
    }
}

impl DeviceProperties {
    /// Panics when a dispatch would exceed what the device can run.
    ///
    /// Returns `false` when one of the group counts is zero and nothing
    /// should be recorded.
    pub fn validate_dispatch(&self, groups: [u32; 3], workgroup: [u32; 3]) -> bool {
        let threads = workgroup.iter().map(|&v| v as u64).product::<u64>();
        assert!(
            threads <= self.max_threads_per_group as u64,
            "dispatch: pipeline needs {} threads per group, device allows {}",
            threads,
            self.max_threads_per_group
        );
        for (axis, (&count, &max)) in groups.iter().zip(self.max_group_count.iter()).enumerate() {
            assert!(
                count <= max,
                "dispatch: group count {} on axis {} exceeds device limit {}",
                count,
                axis,
                max
            );
        }
        groups.iter().all(|&c| c > 0)
    }
}

/// Extent of mip level `level` for a base extent, halved per level and never below one.
pub fn mip_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    let shift = level.min(31);
    ((width >> shift).max(1), (height >> shift).max(1))
}

/// Narrow a caller-supplied count to the 32-bit range native APIs take.
pub(crate) fn to_u32(value: usize, what: &str) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| panic!("{} {} does not fit in 32 bits", what, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_ids_are_unique() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert_ne!(a, b);
        assert!(a.get() > 0);
    }

    #[test]
    fn mip_extent_halves_with_floor_of_one() {
        assert_eq!(mip_extent(256, 64, 0), (256, 64));
        assert_eq!(mip_extent(256, 64, 1), (128, 32));
        assert_eq!(mip_extent(256, 64, 6), (4, 1));
        assert_eq!(mip_extent(256, 64, 8), (1, 1));
        assert_eq!(mip_extent(3, 5, 1), (1, 2));
    }

    #[test]
    fn dispatch_within_limits() {
        let props = DeviceProperties::default();
        assert!(props.validate_dispatch([4, 4, 1], [32, 32, 1]));
        assert!(!props.validate_dispatch([0, 4, 1], [8, 8, 1]));
    }

    #[test]
    #[should_panic(expected = "threads per group")]
    fn dispatch_over_thread_limit() {
        let props = DeviceProperties::default();
        props.validate_dispatch([1, 1, 1], [64, 32, 1]);
    }

    #[test]
    fn texture_format_sizes() {
        assert_eq!(TextureFormat::RGBA8.bytes_per_pixel(), 4);
        assert_eq!(TextureFormat::RGBA32F.bytes_per_pixel(), 16);
        assert!(TextureFormat::Depth24S8.is_depth());
    }
}
