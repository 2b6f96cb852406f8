use std::marker::PhantomData;
use std::sync::Arc;

use crate::gpu::driver::{Identity, ResourceId, TextureFormat, Topology};
use crate::gpu::Backend;

pub mod commands;
pub use commands::MtCommandBuffer;

pub mod driver;
pub use driver::{MtlDriver, MtlIndexType, RenderStage};

pub mod layout;
pub use layout::{MtBind, MtPipelineLayout, MtPushIndex};

#[cfg(all(feature = "fresco-metal", target_vendor = "apple"))]
pub mod native;
#[cfg(all(feature = "fresco-metal", target_vendor = "apple"))]
pub use native::{MetalDriver, MtDevice};

/// The Metal backend. `D` is the native recording seam.
pub struct MetalApi<D>(PhantomData<D>);

impl<D: MtlDriver> Backend for MetalApi<D> {
    type Buffer = MtBuffer<D::Buffer>;
    type Texture = MtTexture<D::Texture>;
    type Framebuffer = MtFramebuffer<D::Framebuffer>;
    type RenderPass = MtRenderPass<D::RenderPass>;
    type Pipeline = MtPipeline<D::RenderPipeline>;
    type CompPipeline = MtCompPipeline<D::ComputePipeline>;
    type Desc = MtDescriptorSet<D>;
    type Fence = D::Fence;
    type CommandBuffer = MtCommandBuffer<D>;
}

#[derive(Debug, Clone)]
pub struct MtBuffer<B> {
    id: ResourceId,
    pub raw: B,
    pub size: u64,
}

impl<B> MtBuffer<B> {
    pub fn from_raw(raw: B, size: u64) -> Self {
        Self {
            id: ResourceId::next(),
            raw,
            size,
        }
    }
}

impl<B> Identity for MtBuffer<B> {
    fn id(&self) -> ResourceId {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct MtTexture<T> {
    id: ResourceId,
    pub raw: T,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
}

impl<T> MtTexture<T> {
    pub fn from_raw(raw: T, format: TextureFormat, width: u32, height: u32, mip_levels: u32) -> Self {
        Self {
            id: ResourceId::next(),
            raw,
            format,
            width,
            height,
            mip_levels,
        }
    }
}

impl<T> Identity for MtTexture<T> {
    fn id(&self) -> ResourceId {
        self.id
    }
}

/// Attachments a render encoder draws into.
#[derive(Debug, Clone)]
pub struct MtFramebuffer<F> {
    pub raw: F,
    pub width: u32,
    pub height: u32,
}

impl<F> MtFramebuffer<F> {
    pub fn from_raw(raw: F, width: u32, height: u32) -> Self {
        Self { raw, width, height }
    }
}

/// Load and store actions of each attachment.
#[derive(Debug, Clone)]
pub struct MtRenderPass<P> {
    pub raw: P,
}

impl<P> MtRenderPass<P> {
    pub fn from_raw(raw: P) -> Self {
        Self { raw }
    }
}

#[derive(Debug, Clone)]
pub struct MtPipeline<P> {
    id: ResourceId,
    pub raw: P,
    pub layout: Arc<MtPipelineLayout>,
    pub topology: Topology,
}

impl<P> MtPipeline<P> {
    pub fn from_raw(raw: P, layout: Arc<MtPipelineLayout>, topology: Topology) -> Self {
        Self {
            id: ResourceId::next(),
            raw,
            layout,
            topology,
        }
    }
}

impl<P> Identity for MtPipeline<P> {
    fn id(&self) -> ResourceId {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct MtCompPipeline<P> {
    id: ResourceId,
    pub raw: P,
    pub layout: Arc<MtPipelineLayout>,
    /// Threads per threadgroup the kernel is dispatched with.
    pub workgroup: [u32; 3],
}

impl<P> MtCompPipeline<P> {
    pub fn from_raw(raw: P, layout: Arc<MtPipelineLayout>, workgroup: [u32; 3]) -> Self {
        Self {
            id: ResourceId::next(),
            raw,
            layout,
            workgroup,
        }
    }
}

impl<P> Identity for MtCompPipeline<P> {
    fn id(&self) -> ResourceId {
        self.id
    }
}

pub enum MtDescEntry<D: MtlDriver> {
    Buffer {
        buf: D::Buffer,
        offset: usize,
    },
    /// A sampled texture carries its sampler; a storage image does not.
    Texture {
        tex: D::Texture,
        sampler: Option<D::Sampler>,
    },
}

/// Resources for the slots of a pipeline layout.
///
/// Metal has no descriptor sets; the entries are bound one by one when the
/// set is flushed. A set is immutable once built so its identity stays
/// meaningful to the bind cache.
pub struct MtDescriptorSet<D: MtlDriver> {
    id: ResourceId,
    entries: Arc<Vec<Option<MtDescEntry<D>>>>,
}

impl<D: MtlDriver> Clone for MtDescriptorSet<D> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<D: MtlDriver> Identity for MtDescriptorSet<D> {
    fn id(&self) -> ResourceId {
        self.id
    }
}

impl<D: MtlDriver> MtDescriptorSet<D> {
    pub fn builder() -> MtDescriptorSetBuilder<D> {
        MtDescriptorSetBuilder {
            entries: Vec::new(),
        }
    }

    /// Occupied slots in ascending order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &MtDescEntry<D>)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, e)| e.as_ref().map(|e| (slot as u32, e)))
    }

    pub fn entry(&self, slot: u32) -> Option<&MtDescEntry<D>> {
        self.entries.get(slot as usize).and_then(|e| e.as_ref())
    }
}

pub struct MtDescriptorSetBuilder<D: MtlDriver> {
    entries: Vec<Option<MtDescEntry<D>>>,
}

impl<D: MtlDriver> MtDescriptorSetBuilder<D> {
    fn put(mut self, slot: u32, entry: MtDescEntry<D>) -> Self {
        let slot = slot as usize;
        if self.entries.len() <= slot {
            self.entries.resize_with(slot + 1, || None);
        }
        self.entries[slot] = Some(entry);
        self
    }

    pub fn buffer(self, slot: u32, buf: &MtBuffer<D::Buffer>, offset: usize) -> Self {
        self.put(
            slot,
            MtDescEntry::Buffer {
                buf: buf.raw.clone(),
                offset,
            },
        )
    }

    pub fn texture(self, slot: u32, tex: &MtTexture<D::Texture>, sampler: &D::Sampler) -> Self {
        self.put(
            slot,
            MtDescEntry::Texture {
                tex: tex.raw.clone(),
                sampler: Some(sampler.clone()),
            },
        )
    }

    pub fn storage_image(self, slot: u32, tex: &MtTexture<D::Texture>) -> Self {
        self.put(
            slot,
            MtDescEntry::Texture {
                tex: tex.raw.clone(),
                sampler: None,
            },
        )
    }

    pub fn build(self) -> MtDescriptorSet<D> {
        MtDescriptorSet {
            id: ResourceId::next(),
            entries: Arc::new(self.entries),
        }
    }
}
