use std::marker::PhantomData;
use std::sync::Arc;

use ash::vk;

use crate::gpu::driver::{Identity, ResourceId, TextureFormat, Topology};
use crate::gpu::Backend;

pub mod conversions;
pub use conversions::*;

mod command_pool;
pub use command_pool::CommandPool;

pub mod commands;
pub use commands::VkCommandBuffer;

pub mod context;
pub use context::VulkanContext;

pub mod layout;
pub use layout::{VkBind, VkPipelineLayout, VkPushRange};

pub mod raw;
pub use raw::{AshCommands, RawCommands};

/// The Vulkan backend. `R` is the native recording seam.
pub struct VulkanApi<R = AshCommands>(PhantomData<R>);

impl<R: RawCommands> Backend for VulkanApi<R> {
    type Buffer = VkBuffer;
    type Texture = VkTexture;
    type Framebuffer = VkFramebuffer;
    type RenderPass = VkRenderPass;
    type Pipeline = VkPipeline;
    type CompPipeline = VkCompPipeline;
    type Desc = VkDescriptorSet;
    type Fence = VkFence;
    type CommandBuffer = VkCommandBuffer<R>;
}

#[derive(Debug, Clone, Copy)]
pub struct VkBuffer {
    id: ResourceId,
    pub raw: vk::Buffer,
    pub size: vk::DeviceSize,
}

impl VkBuffer {
    pub fn from_raw(raw: vk::Buffer, size: vk::DeviceSize) -> Self {
        Self {
            id: ResourceId::next(),
            raw,
            size,
        }
    }
}

impl Identity for VkBuffer {
    fn id(&self) -> ResourceId {
        self.id
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VkTexture {
    id: ResourceId,
    pub raw: vk::Image,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
}

impl VkTexture {
    pub fn from_raw(
        raw: vk::Image,
        format: TextureFormat,
        width: u32,
        height: u32,
        mip_levels: u32,
    ) -> Self {
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

impl Identity for VkTexture {
    fn id(&self) -> ResourceId {
        self.id
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VkFramebuffer {
    pub raw: vk::Framebuffer,
    pub width: u32,
    pub height: u32,
}

impl VkFramebuffer {
    pub fn from_raw(raw: vk::Framebuffer, width: u32, height: u32) -> Self {
        Self { raw, width, height }
    }
}

#[derive(Clone)]
pub struct VkRenderPass {
    pub raw: vk::RenderPass,
    /// One clear value per attachment that is cleared on load.
    pub clear: Vec<vk::ClearValue>,
}

impl VkRenderPass {
    pub fn from_raw(raw: vk::RenderPass, clear: Vec<vk::ClearValue>) -> Self {
        Self { raw, clear }
    }
}

#[derive(Debug, Clone)]
pub struct VkPipeline {
    id: ResourceId,
    pub raw: vk::Pipeline,
    pub layout: Arc<VkPipelineLayout>,
    pub topology: Topology,
}

impl VkPipeline {
    pub fn from_raw(raw: vk::Pipeline, layout: Arc<VkPipelineLayout>, topology: Topology) -> Self {
        Self {
            id: ResourceId::next(),
            raw,
            layout,
            topology,
        }
    }
}

impl Identity for VkPipeline {
    fn id(&self) -> ResourceId {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct VkCompPipeline {
    id: ResourceId,
    pub raw: vk::Pipeline,
    pub layout: Arc<VkPipelineLayout>,
    /// Local workgroup size declared by the shader.
    pub workgroup: [u32; 3],
}

impl VkCompPipeline {
    pub fn from_raw(raw: vk::Pipeline, layout: Arc<VkPipelineLayout>, workgroup: [u32; 3]) -> Self {
        Self {
            id: ResourceId::next(),
            raw,
            layout,
            workgroup,
        }
    }
}

impl Identity for VkCompPipeline {
    fn id(&self) -> ResourceId {
        self.id
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VkDescriptorSet {
    id: ResourceId,
    pub raw: vk::DescriptorSet,
}

impl VkDescriptorSet {
    pub fn from_raw(raw: vk::DescriptorSet) -> Self {
        Self {
            id: ResourceId::next(),
            raw,
        }
    }
}

impl Identity for VkDescriptorSet {
    fn id(&self) -> ResourceId {
        self.id
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VkFence {
    pub raw: vk::Fence,
}
