//! Metal driver on top of `metal-rs`.

use std::ffi::c_void;

use metal::{
    MTLBlitOption, MTLClearColor, MTLIndexType, MTLLoadAction, MTLOrigin, MTLPrimitiveType,
    MTLSize, MTLStoreAction, MTLViewport, NSRange,
};
use parking_lot::Mutex;

use super::driver::{MtlDriver, MtlIndexType, RenderStage};
use super::{MetalApi, MtCommandBuffer};
use crate::gpu::driver::{CommandBuffer, Device, DeviceProperties, Rect, RecordState, Topology};
use crate::gpu::structs::ContextInfo;
use crate::gpu::{GPUError, Result};

/// Load and store behaviour of one attachment.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentOps {
    pub load: MTLLoadAction,
    pub store: MTLStoreAction,
    /// Clear color; depth attachments use the first component.
    pub clear: [f64; 4],
}

impl Default for AttachmentOps {
    fn default() -> Self {
        Self {
            load: MTLLoadAction::Clear,
            store: MTLStoreAction::Store,
            clear: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[derive(Clone, Default)]
pub struct NativeFramebuffer {
    pub color: Vec<metal::Texture>,
    pub depth: Option<metal::Texture>,
}

#[derive(Debug, Clone, Default)]
pub struct NativeRenderPass {
    pub color: Vec<AttachmentOps>,
    pub depth: Option<AttachmentOps>,
}

/// Signalled when the command buffer submitted with it completes.
#[derive(Default)]
pub struct MtFence {
    pending: Mutex<Option<metal::CommandBuffer>>,
}

impl From<Topology> for MTLPrimitiveType {
    fn from(value: Topology) -> Self {
        match value {
            Topology::Points => MTLPrimitiveType::Point,
            Topology::Lines => MTLPrimitiveType::Line,
            Topology::Triangles => MTLPrimitiveType::Triangle,
        }
    }
}

impl From<MtlIndexType> for MTLIndexType {
    fn from(value: MtlIndexType) -> Self {
        match value {
            MtlIndexType::UInt16 => MTLIndexType::UInt16,
            MtlIndexType::UInt32 => MTLIndexType::UInt32,
        }
    }
}

fn size3(v: [u32; 3]) -> MTLSize {
    MTLSize::new(v[0] as u64, v[1] as u64, v[2] as u64)
}

pub struct MetalDriver {
    queue: metal::CommandQueue,
}

impl MetalDriver {
    pub fn new(queue: metal::CommandQueue) -> Self {
        Self { queue }
    }
}

impl MtlDriver for MetalDriver {
    type CommandBuffer = metal::CommandBuffer;
    type RenderEncoder = metal::RenderCommandEncoder;
    type ComputeEncoder = metal::ComputeCommandEncoder;
    type BlitEncoder = metal::BlitCommandEncoder;
    type Fence = MtFence;

    type Buffer = metal::Buffer;
    type Texture = metal::Texture;
    type Sampler = metal::SamplerState;
    type RenderPipeline = metal::RenderPipelineState;
    type ComputePipeline = metal::ComputePipelineState;
    type Framebuffer = NativeFramebuffer;
    type RenderPass = NativeRenderPass;

    fn command_buffer(&mut self) -> Result<metal::CommandBuffer> {
        Ok(self.queue.new_command_buffer().to_owned())
    }

    fn render_encoder(
        &mut self,
        cmd: &metal::CommandBuffer,
        fbo: &NativeFramebuffer,
        pass: &NativeRenderPass,
        resume: bool,
    ) -> metal::RenderCommandEncoder {
        let desc = metal::RenderPassDescriptor::new();
        for (i, tex) in fbo.color.iter().enumerate() {
            let ops = pass.color.get(i).copied().unwrap_or_default();
            if let Some(att) = desc.color_attachments().object_at(i as u64) {
                let tex: &metal::TextureRef = tex;
                att.set_texture(Some(tex));
                att.set_load_action(if resume { MTLLoadAction::Load } else { ops.load });
                att.set_store_action(ops.store);
                att.set_clear_color(MTLClearColor::new(
                    ops.clear[0],
                    ops.clear[1],
                    ops.clear[2],
                    ops.clear[3],
                ));
            }
        }
        if let (Some(tex), Some(att)) = (fbo.depth.as_ref(), desc.depth_attachment()) {
            let ops = pass.depth.unwrap_or_default();
            let tex: &metal::TextureRef = tex;
            att.set_texture(Some(tex));
            att.set_load_action(if resume { MTLLoadAction::Load } else { ops.load });
            att.set_store_action(ops.store);
            att.set_clear_depth(ops.clear[0]);
        }
        cmd.new_render_command_encoder(desc).to_owned()
    }

    fn compute_encoder(&mut self, cmd: &metal::CommandBuffer) -> metal::ComputeCommandEncoder {
        cmd.new_compute_command_encoder().to_owned()
    }

    fn blit_encoder(&mut self, cmd: &metal::CommandBuffer) -> metal::BlitCommandEncoder {
        cmd.new_blit_command_encoder().to_owned()
    }

    fn end_render(&mut self, enc: metal::RenderCommandEncoder) {
        enc.end_encoding();
    }

    fn end_compute(&mut self, enc: metal::ComputeCommandEncoder) {
        enc.end_encoding();
    }

    fn end_blit(&mut self, enc: metal::BlitCommandEncoder) {
        enc.end_encoding();
    }

    fn set_render_pipeline(&mut self, enc: &metal::RenderCommandEncoder, pipeline: &metal::RenderPipelineState) {
        enc.set_render_pipeline_state(pipeline);
    }

    fn set_viewport(&mut self, enc: &metal::RenderCommandEncoder, rect: Rect) {
        enc.set_viewport(MTLViewport {
            originX: rect.x as f64,
            originY: rect.y as f64,
            width: rect.w as f64,
            height: rect.h as f64,
            znear: 0.0,
            zfar: 1.0,
        });
    }

    fn set_render_buffer(
        &mut self,
        enc: &metal::RenderCommandEncoder,
        stage: RenderStage,
        index: u32,
        buf: &metal::Buffer,
        offset: usize,
    ) {
        let buf: &metal::BufferRef = buf;
        match stage {
            RenderStage::Vertex => enc.set_vertex_buffer(index as u64, Some(buf), offset as u64),
            RenderStage::Fragment => enc.set_fragment_buffer(index as u64, Some(buf), offset as u64),
        }
    }

    fn set_render_texture(
        &mut self,
        enc: &metal::RenderCommandEncoder,
        stage: RenderStage,
        index: u32,
        tex: &metal::Texture,
        sampler: Option<(u32, &metal::SamplerState)>,
    ) {
        let tex: &metal::TextureRef = tex;
        match stage {
            RenderStage::Vertex => {
                enc.set_vertex_texture(index as u64, Some(tex));
                if let Some((idx, smp)) = sampler {
                    let smp: &metal::SamplerStateRef = smp;
                    enc.set_vertex_sampler_state(idx as u64, Some(smp));
                }
            }
            RenderStage::Fragment => {
                enc.set_fragment_texture(index as u64, Some(tex));
                if let Some((idx, smp)) = sampler {
                    let smp: &metal::SamplerStateRef = smp;
                    enc.set_fragment_sampler_state(idx as u64, Some(smp));
                }
            }
        }
    }

    fn set_render_bytes(
        &mut self,
        enc: &metal::RenderCommandEncoder,
        stage: RenderStage,
        index: u32,
        data: &[u8],
    ) {
        let ptr = data.as_ptr() as *const c_void;
        match stage {
            RenderStage::Vertex => enc.set_vertex_bytes(index as u64, data.len() as u64, ptr),
            RenderStage::Fragment => enc.set_fragment_bytes(index as u64, data.len() as u64, ptr),
        }
    }

    fn draw(
        &mut self,
        enc: &metal::RenderCommandEncoder,
        topology: Topology,
        first_vertex: u32,
        vertex_count: u32,
        first_instance: u32,
        instance_count: u32,
    ) {
        enc.draw_primitives_instanced_base_instance(
            topology.into(),
            first_vertex as u64,
            vertex_count as u64,
            instance_count as u64,
            first_instance as u64,
        );
    }

    fn draw_indexed(
        &mut self,
        enc: &metal::RenderCommandEncoder,
        topology: Topology,
        ibo: &metal::Buffer,
        ty: MtlIndexType,
        index_count: u32,
        ibo_offset: usize,
        base_vertex: i32,
        first_instance: u32,
        instance_count: u32,
    ) {
        enc.draw_indexed_primitives_instanced_base_instance(
            topology.into(),
            index_count as u64,
            ty.into(),
            ibo,
            ibo_offset as u64,
            instance_count as u64,
            base_vertex as i64,
            first_instance as u64,
        );
    }

    fn set_compute_pipeline(&mut self, enc: &metal::ComputeCommandEncoder, pipeline: &metal::ComputePipelineState) {
        enc.set_compute_pipeline_state(pipeline);
    }

    fn set_compute_buffer(
        &mut self,
        enc: &metal::ComputeCommandEncoder,
        index: u32,
        buf: &metal::Buffer,
        offset: usize,
    ) {
        let buf: &metal::BufferRef = buf;
        enc.set_buffer(index as u64, Some(buf), offset as u64);
    }

    fn set_compute_texture(
        &mut self,
        enc: &metal::ComputeCommandEncoder,
        index: u32,
        tex: &metal::Texture,
        sampler: Option<(u32, &metal::SamplerState)>,
    ) {
        let tex: &metal::TextureRef = tex;
        enc.set_texture(index as u64, Some(tex));
        if let Some((idx, smp)) = sampler {
            let smp: &metal::SamplerStateRef = smp;
            enc.set_sampler_state(idx as u64, Some(smp));
        }
    }

    fn set_compute_bytes(&mut self, enc: &metal::ComputeCommandEncoder, index: u32, data: &[u8]) {
        enc.set_bytes(index as u64, data.len() as u64, data.as_ptr() as *const c_void);
    }

    fn dispatch(&mut self, enc: &metal::ComputeCommandEncoder, groups: [u32; 3], threads_per_group: [u32; 3]) {
        enc.dispatch_thread_groups(size3(groups), size3(threads_per_group));
    }

    fn blit_mip_level(
        &mut self,
        enc: &metal::BlitCommandEncoder,
        tex: &metal::Texture,
        src_level: u32,
        _src_size: (u32, u32),
        dst_level: u32,
        _dst_size: (u32, u32),
    ) {
        // A two level view makes generate_mipmaps fill exactly dst_level.
        let view = tex.new_texture_view_from_slice(
            tex.pixel_format(),
            tex.texture_type(),
            NSRange::new(src_level as u64, (dst_level - src_level + 1) as u64),
            NSRange::new(0, 1),
        );
        enc.generate_mipmaps(&view);
    }

    fn copy_texture_to_buffer(
        &mut self,
        enc: &metal::BlitCommandEncoder,
        tex: &metal::Texture,
        mip: u32,
        size: (u32, u32),
        buf: &metal::Buffer,
        offset: usize,
        bytes_per_row: usize,
        bytes_per_image: usize,
    ) {
        enc.copy_from_texture_to_buffer(
            tex,
            0,
            mip as u64,
            MTLOrigin { x: 0, y: 0, z: 0 },
            MTLSize::new(size.0 as u64, size.1 as u64, 1),
            buf,
            offset as u64,
            bytes_per_row as u64,
            bytes_per_image as u64,
            MTLBlitOption::empty(),
        );
    }
}

/// The system Metal device and one command queue.
pub struct MtDevice {
    device: metal::Device,
    queue: metal::CommandQueue,
    props: DeviceProperties,
}

impl MtDevice {
    pub fn new(info: &ContextInfo) -> Result<Self> {
        let device = match info.device_index {
            Some(idx) => metal::Device::all()
                .into_iter()
                .nth(idx)
                .ok_or(GPUError::NoDevice("device index out of range"))?,
            None => metal::Device::system_default()
                .ok_or(GPUError::NoDevice("no Metal capable device"))?,
        };
        let queue = device.new_command_queue();
        let threads = device.max_threads_per_threadgroup();
        let props = DeviceProperties {
            name: device.name().to_string(),
            max_threads_per_group: threads.width.min(u32::MAX as u64) as u32,
            max_group_count: [u32::MAX; 3],
            // setBytes accepts up to 4 KiB.
            max_push_bytes: 4096,
        };
        if info.validation {
            log::warn!("Metal validation is controlled by MTL_DEBUG_LAYER, ignoring the request");
        }
        log::info!("created Metal device '{}'", props.name);
        Ok(Self {
            device,
            queue,
            props,
        })
    }

    pub fn raw_device(&self) -> &metal::Device {
        &self.device
    }

    pub fn raw_queue(&self) -> &metal::CommandQueue {
        &self.queue
    }
}

impl Device<MetalApi<MetalDriver>> for MtDevice {
    fn properties(&self) -> &DeviceProperties {
        &self.props
    }

    fn command_buffer(&self) -> Result<MtCommandBuffer<MetalDriver>> {
        Ok(MtCommandBuffer::new(
            MetalDriver::new(self.queue.clone()),
            self.props.clone(),
        ))
    }

    fn fence(&self) -> Result<MtFence> {
        Ok(MtFence::default())
    }

    fn submit(&self, cmd: &mut MtCommandBuffer<MetalDriver>, fence: Option<&MtFence>) -> Result<()> {
        if cmd.state() != RecordState::Ended {
            return Err(GPUError::InvalidState);
        }
        let native = cmd.take_native()?;
        native.commit();
        if let Some(fence) = fence {
            *fence.pending.lock() = Some(native);
        }
        Ok(())
    }

    fn wait(&self, fence: &MtFence) -> Result<()> {
        if let Some(cmd) = fence.pending.lock().take() {
            cmd.wait_until_completed();
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        // Queues execute in order, so an empty buffer completes last.
        let cmd = self.queue.new_command_buffer();
        cmd.commit();
        cmd.wait_until_completed();
        Ok(())
    }
}
