//! The native recording seam of the Metal backend.
//!
//! Encoders are values owned by [`MtCommandBuffer`](super::MtCommandBuffer),
//! which decides when they open and close. The driver only turns calls into
//! native work.

use crate::gpu::driver::{IndexClass, Rect, Topology};
use crate::gpu::Result;

/// Graphics stage a binding is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderStage {
    Vertex,
    Fragment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MtlIndexType {
    UInt16,
    UInt32,
}

impl From<IndexClass> for MtlIndexType {
    fn from(cls: IndexClass) -> Self {
        match cls {
            IndexClass::I16 => MtlIndexType::UInt16,
            IndexClass::I32 => MtlIndexType::UInt32,
        }
    }
}

pub trait MtlDriver {
    type CommandBuffer;
    type RenderEncoder;
    type ComputeEncoder;
    type BlitEncoder;
    type Fence;

    type Buffer: Clone;
    type Texture: Clone;
    type Sampler: Clone;
    type RenderPipeline: Clone;
    type ComputePipeline: Clone;
    type Framebuffer: Clone;
    type RenderPass: Clone;

    fn command_buffer(&mut self) -> Result<Self::CommandBuffer>;

    /// Open a render encoder. With `resume` set the attachments are loaded
    /// instead of running the pass's load actions again.
    fn render_encoder(
        &mut self,
        cmd: &Self::CommandBuffer,
        fbo: &Self::Framebuffer,
        pass: &Self::RenderPass,
        resume: bool,
    ) -> Self::RenderEncoder;
    fn compute_encoder(&mut self, cmd: &Self::CommandBuffer) -> Self::ComputeEncoder;
    fn blit_encoder(&mut self, cmd: &Self::CommandBuffer) -> Self::BlitEncoder;

    fn end_render(&mut self, enc: Self::RenderEncoder);
    fn end_compute(&mut self, enc: Self::ComputeEncoder);
    fn end_blit(&mut self, enc: Self::BlitEncoder);

    fn set_render_pipeline(&mut self, enc: &Self::RenderEncoder, pipeline: &Self::RenderPipeline);
    fn set_viewport(&mut self, enc: &Self::RenderEncoder, rect: Rect);
    fn set_render_buffer(
        &mut self,
        enc: &Self::RenderEncoder,
        stage: RenderStage,
        index: u32,
        buf: &Self::Buffer,
        offset: usize,
    );
    /// Bind a texture and, for sampled textures, its sampler.
    fn set_render_texture(
        &mut self,
        enc: &Self::RenderEncoder,
        stage: RenderStage,
        index: u32,
        tex: &Self::Texture,
        sampler: Option<(u32, &Self::Sampler)>,
    );
    fn set_render_bytes(
        &mut self,
        enc: &Self::RenderEncoder,
        stage: RenderStage,
        index: u32,
        data: &[u8],
    );
    fn draw(
        &mut self,
        enc: &Self::RenderEncoder,
        topology: Topology,
        first_vertex: u32,
        vertex_count: u32,
        first_instance: u32,
        instance_count: u32,
    );
    #[allow(clippy::too_many_arguments)]
    fn draw_indexed(
        &mut self,
        enc: &Self::RenderEncoder,
        topology: Topology,
        ibo: &Self::Buffer,
        ty: MtlIndexType,
        index_count: u32,
        ibo_offset: usize,
        base_vertex: i32,
        first_instance: u32,
        instance_count: u32,
    );

    fn set_compute_pipeline(&mut self, enc: &Self::ComputeEncoder, pipeline: &Self::ComputePipeline);
    fn set_compute_buffer(
        &mut self,
        enc: &Self::ComputeEncoder,
        index: u32,
        buf: &Self::Buffer,
        offset: usize,
    );
    fn set_compute_texture(
        &mut self,
        enc: &Self::ComputeEncoder,
        index: u32,
        tex: &Self::Texture,
        sampler: Option<(u32, &Self::Sampler)>,
    );
    fn set_compute_bytes(&mut self, enc: &Self::ComputeEncoder, index: u32, data: &[u8]);
    fn dispatch(&mut self, enc: &Self::ComputeEncoder, groups: [u32; 3], threads_per_group: [u32; 3]);

    /// Fill `dst_level` from `src_level` by filtering.
    fn blit_mip_level(
        &mut self,
        enc: &Self::BlitEncoder,
        tex: &Self::Texture,
        src_level: u32,
        src_size: (u32, u32),
        dst_level: u32,
        dst_size: (u32, u32),
    );
    #[allow(clippy::too_many_arguments)]
    fn copy_texture_to_buffer(
        &mut self,
        enc: &Self::BlitEncoder,
        tex: &Self::Texture,
        mip: u32,
        size: (u32, u32),
        buf: &Self::Buffer,
        offset: usize,
        bytes_per_row: usize,
        bytes_per_image: usize,
    );
}
