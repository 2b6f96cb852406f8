#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use ash::vk::{self, Handle};
use fresco::gpu::driver::{
    BindingKind, Device, DeviceProperties, LayoutBinding, PipelineLayoutDesc, Rect,
    ShaderStages, Topology,
};
use fresco::gpu::metal::{
    MetalApi, MtCommandBuffer, MtCompPipeline, MtPipeline, MtPipelineLayout, MtlDriver,
    MtlIndexType, RenderStage,
};
use fresco::gpu::vulkan::{
    RawCommands, VkCommandBuffer, VkCompPipeline, VkPipeline, VkPipelineLayout,
};
use fresco::gpu::{GPUError, Result};

//===----------------------------------------------------------------------===//
// Vulkan recorder
//===----------------------------------------------------------------------===//

#[derive(Debug, Clone, PartialEq)]
pub enum VkCall {
    Begin,
    End,
    Reset,
    BeginPass {
        pass: vk::RenderPass,
        fbo: vk::Framebuffer,
        width: u32,
        height: u32,
    },
    EndPass,
    BindPipeline(vk::PipelineBindPoint, vk::Pipeline),
    BindSet(vk::PipelineBindPoint, vk::DescriptorSet),
    Push(Vec<u8>),
    Viewport {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    BindVertex(vk::Buffer),
    BindIndex(vk::Buffer, vk::IndexType),
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    Dispatch(u32, u32, u32),
    Blit {
        src_mip: u32,
        dst_mip: u32,
        dst_size: (i32, i32),
    },
    Copy {
        mip: u32,
        row_length: u32,
        image_height: u32,
        offset: u64,
    },
    Barrier {
        buffers: usize,
        images: usize,
        by_region: bool,
    },
}

/// Records every native call instead of executing it.
#[derive(Debug, Default)]
pub struct VkRecorder {
    pub calls: Vec<VkCall>,
}

impl VkRecorder {
    pub fn count(&self, pred: impl Fn(&VkCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

impl RawCommands for VkRecorder {
    fn begin(&mut self) -> Result<()> {
        self.calls.push(VkCall::Begin);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.calls.push(VkCall::End);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.calls.push(VkCall::Reset);
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        pass: vk::RenderPass,
        fbo: vk::Framebuffer,
        area: vk::Rect2D,
        _clear: &[vk::ClearValue],
    ) {
        self.calls.push(VkCall::BeginPass {
            pass,
            fbo,
            width: area.extent.width,
            height: area.extent.height,
        });
    }

    fn end_render_pass(&mut self) {
        self.calls.push(VkCall::EndPass);
    }

    fn bind_pipeline(&mut self, point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        self.calls.push(VkCall::BindPipeline(point, pipeline));
    }

    fn bind_descriptor_set(
        &mut self,
        point: vk::PipelineBindPoint,
        _layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        self.calls.push(VkCall::BindSet(point, set));
    }

    fn push_constants(&mut self, _layout: vk::PipelineLayout, _stages: vk::ShaderStageFlags, data: &[u8]) {
        self.calls.push(VkCall::Push(data.to_vec()));
    }

    fn set_viewport(&mut self, viewport: vk::Viewport, _scissor: vk::Rect2D) {
        self.calls.push(VkCall::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
        });
    }

    fn bind_vertex_buffer(&mut self, buffer: vk::Buffer, _offset: vk::DeviceSize) {
        self.calls.push(VkCall::BindVertex(buffer));
    }

    fn bind_index_buffer(&mut self, buffer: vk::Buffer, _offset: vk::DeviceSize, ty: vk::IndexType) {
        self.calls.push(VkCall::BindIndex(buffer, ty));
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.calls.push(VkCall::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.calls.push(VkCall::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.calls.push(VkCall::Dispatch(x, y, z));
    }

    fn blit_image(&mut self, _image: vk::Image, region: vk::ImageBlit, _filter: vk::Filter) {
        self.calls.push(VkCall::Blit {
            src_mip: region.src_subresource.mip_level,
            dst_mip: region.dst_subresource.mip_level,
            dst_size: (region.dst_offsets[1].x, region.dst_offsets[1].y),
        });
    }

    fn copy_image_to_buffer(
        &mut self,
        _image: vk::Image,
        _layout: vk::ImageLayout,
        _buffer: vk::Buffer,
        region: vk::BufferImageCopy,
    ) {
        self.calls.push(VkCall::Copy {
            mip: region.image_subresource.mip_level,
            row_length: region.buffer_row_length,
            image_height: region.buffer_image_height,
            offset: region.buffer_offset,
        });
    }

    fn pipeline_barrier(
        &mut self,
        _src_stage: vk::PipelineStageFlags,
        _dst_stage: vk::PipelineStageFlags,
        dependency: vk::DependencyFlags,
        buffers: &[vk::BufferMemoryBarrier],
        images: &[vk::ImageMemoryBarrier],
    ) {
        self.calls.push(VkCall::Barrier {
            buffers: buffers.len(),
            images: images.len(),
            by_region: dependency.contains(vk::DependencyFlags::BY_REGION),
        });
    }
}

pub fn vk_cmd(props: DeviceProperties) -> VkCommandBuffer<VkRecorder> {
    VkCommandBuffer::new(VkRecorder::default(), props)
}

pub fn vk_layout(desc: &PipelineLayoutDesc) -> Arc<VkPipelineLayout> {
    Arc::new(VkPipelineLayout::new(vk::PipelineLayout::from_raw(0x1000), desc, None).unwrap())
}

pub fn vk_pipeline(raw: u64, desc: &PipelineLayoutDesc) -> VkPipeline {
    VkPipeline::from_raw(vk::Pipeline::from_raw(raw), vk_layout(desc), Topology::Triangles)
}

pub fn vk_comp_pipeline(raw: u64, workgroup: [u32; 3]) -> VkCompPipeline {
    let desc = PipelineLayoutDesc::new().binding(LayoutBinding::new(
        0,
        BindingKind::Ssbo,
        ShaderStages::COMPUTE,
    ));
    VkCompPipeline::from_raw(vk::Pipeline::from_raw(raw), vk_layout(&desc), workgroup)
}

//===----------------------------------------------------------------------===//
// Metal recorder
//===----------------------------------------------------------------------===//

#[derive(Debug, Clone, PartialEq)]
pub enum MtCall {
    CommandBuffer(u32),
    RenderEncoder {
        fbo: u32,
        pass: u32,
        resume: bool,
    },
    ComputeEncoder,
    BlitEncoder,
    EndRender,
    EndCompute,
    EndBlit,
    RenderPipeline(u32),
    Viewport(Rect),
    RenderBuffer {
        stage: RenderStage,
        index: u32,
        buf: u32,
        offset: usize,
    },
    RenderTexture {
        stage: RenderStage,
        index: u32,
        tex: u32,
        sampler: Option<(u32, u32)>,
    },
    RenderBytes {
        stage: RenderStage,
        index: u32,
        data: Vec<u8>,
    },
    Draw {
        first_vertex: u32,
        vertex_count: u32,
        first_instance: u32,
        instance_count: u32,
    },
    DrawIndexed {
        ibo: u32,
        ty: MtlIndexType,
        index_count: u32,
        ibo_offset: usize,
        base_vertex: i32,
    },
    ComputePipeline(u32),
    ComputeBuffer {
        index: u32,
        buf: u32,
    },
    ComputeTexture {
        index: u32,
        tex: u32,
        sampler: Option<(u32, u32)>,
    },
    ComputeBytes {
        index: u32,
        data: Vec<u8>,
    },
    Dispatch {
        groups: [u32; 3],
        threads: [u32; 3],
    },
    BlitMip {
        src: u32,
        dst: u32,
        dst_size: (u32, u32),
    },
    CopyToBuffer {
        mip: u32,
        size: (u32, u32),
        buf: u32,
        offset: usize,
        bytes_per_row: usize,
        bytes_per_image: usize,
    },
}

/// Metal driver whose handles are plain integers. Fails loudly if a second
/// encoder is opened while one is still open.
#[derive(Debug, Default)]
pub struct MockMtl {
    pub calls: Vec<MtCall>,
    pub open: usize,
    next_cmd: u32,
    pub fail_command_buffer: bool,
}

impl MockMtl {
    pub fn count(&self, pred: impl Fn(&MtCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn open_encoder(&mut self, call: MtCall) -> u32 {
        assert_eq!(self.open, 0, "{:?} while another encoder is open", call);
        self.open += 1;
        self.calls.push(call);
        self.calls.len() as u32
    }

    fn close_encoder(&mut self, call: MtCall) {
        assert_eq!(self.open, 1, "{:?} without an open encoder", call);
        self.open -= 1;
        self.calls.push(call);
    }
}

#[derive(Debug, Default)]
pub struct MockFence {
    pub pending: Cell<Option<u32>>,
}

impl MtlDriver for MockMtl {
    type CommandBuffer = u32;
    type RenderEncoder = u32;
    type ComputeEncoder = u32;
    type BlitEncoder = u32;
    type Fence = MockFence;

    type Buffer = u32;
    type Texture = u32;
    type Sampler = u32;
    type RenderPipeline = u32;
    type ComputePipeline = u32;
    type Framebuffer = u32;
    type RenderPass = u32;

    fn command_buffer(&mut self) -> Result<u32> {
        if self.fail_command_buffer {
            return Err(GPUError::OutOfMemory);
        }
        self.next_cmd += 1;
        self.calls.push(MtCall::CommandBuffer(self.next_cmd));
        Ok(self.next_cmd)
    }

    fn render_encoder(&mut self, _cmd: &u32, fbo: &u32, pass: &u32, resume: bool) -> u32 {
        self.open_encoder(MtCall::RenderEncoder {
            fbo: *fbo,
            pass: *pass,
            resume,
        })
    }

    fn compute_encoder(&mut self, _cmd: &u32) -> u32 {
        self.open_encoder(MtCall::ComputeEncoder)
    }

    fn blit_encoder(&mut self, _cmd: &u32) -> u32 {
        self.open_encoder(MtCall::BlitEncoder)
    }

    fn end_render(&mut self, _enc: u32) {
        self.close_encoder(MtCall::EndRender);
    }

    fn end_compute(&mut self, _enc: u32) {
        self.close_encoder(MtCall::EndCompute);
    }

    fn end_blit(&mut self, _enc: u32) {
        self.close_encoder(MtCall::EndBlit);
    }

    fn set_render_pipeline(&mut self, _enc: &u32, pipeline: &u32) {
        self.calls.push(MtCall::RenderPipeline(*pipeline));
    }

    fn set_viewport(&mut self, _enc: &u32, rect: Rect) {
        self.calls.push(MtCall::Viewport(rect));
    }

    fn set_render_buffer(&mut self, _enc: &u32, stage: RenderStage, index: u32, buf: &u32, offset: usize) {
        self.calls.push(MtCall::RenderBuffer {
            stage,
            index,
            buf: *buf,
            offset,
        });
    }

    fn set_render_texture(
        &mut self,
        _enc: &u32,
        stage: RenderStage,
        index: u32,
        tex: &u32,
        sampler: Option<(u32, &u32)>,
    ) {
        self.calls.push(MtCall::RenderTexture {
            stage,
            index,
            tex: *tex,
            sampler: sampler.map(|(i, s)| (i, *s)),
        });
    }

    fn set_render_bytes(&mut self, _enc: &u32, stage: RenderStage, index: u32, data: &[u8]) {
        self.calls.push(MtCall::RenderBytes {
            stage,
            index,
            data: data.to_vec(),
        });
    }

    fn draw(
        &mut self,
        _enc: &u32,
        _topology: Topology,
        first_vertex: u32,
        vertex_count: u32,
        first_instance: u32,
        instance_count: u32,
    ) {
        self.calls.push(MtCall::Draw {
            first_vertex,
            vertex_count,
            first_instance,
            instance_count,
        });
    }

    fn draw_indexed(
        &mut self,
        _enc: &u32,
        _topology: Topology,
        ibo: &u32,
        ty: MtlIndexType,
        index_count: u32,
        ibo_offset: usize,
        base_vertex: i32,
        _first_instance: u32,
        _instance_count: u32,
    ) {
        self.calls.push(MtCall::DrawIndexed {
            ibo: *ibo,
            ty,
            index_count,
            ibo_offset,
            base_vertex,
        });
    }

    fn set_compute_pipeline(&mut self, _enc: &u32, pipeline: &u32) {
        self.calls.push(MtCall::ComputePipeline(*pipeline));
    }

    fn set_compute_buffer(&mut self, _enc: &u32, index: u32, buf: &u32, _offset: usize) {
        self.calls.push(MtCall::ComputeBuffer { index, buf: *buf });
    }

    fn set_compute_texture(&mut self, _enc: &u32, index: u32, tex: &u32, sampler: Option<(u32, &u32)>) {
        self.calls.push(MtCall::ComputeTexture {
            index,
            tex: *tex,
            sampler: sampler.map(|(i, s)| (i, *s)),
        });
    }

    fn set_compute_bytes(&mut self, _enc: &u32, index: u32, data: &[u8]) {
        self.calls.push(MtCall::ComputeBytes {
            index,
            data: data.to_vec(),
        });
    }

    fn dispatch(&mut self, _enc: &u32, groups: [u32; 3], threads_per_group: [u32; 3]) {
        self.calls.push(MtCall::Dispatch {
            groups,
            threads: threads_per_group,
        });
    }

    fn blit_mip_level(
        &mut self,
        _enc: &u32,
        _tex: &u32,
        src_level: u32,
        _src_size: (u32, u32),
        dst_level: u32,
        dst_size: (u32, u32),
    ) {
        self.calls.push(MtCall::BlitMip {
            src: src_level,
            dst: dst_level,
            dst_size,
        });
    }

    fn copy_texture_to_buffer(
        &mut self,
        _enc: &u32,
        _tex: &u32,
        mip: u32,
        size: (u32, u32),
        buf: &u32,
        offset: usize,
        bytes_per_row: usize,
        bytes_per_image: usize,
    ) {
        self.calls.push(MtCall::CopyToBuffer {
            mip,
            size,
            buf: *buf,
            offset,
            bytes_per_row,
            bytes_per_image,
        });
    }
}

pub type MockApi = MetalApi<MockMtl>;

pub fn mt_cmd(props: DeviceProperties) -> MtCommandBuffer<MockMtl> {
    MtCommandBuffer::new(MockMtl::default(), props)
}

pub fn mt_layout(desc: &PipelineLayoutDesc) -> Arc<MtPipelineLayout> {
    Arc::new(MtPipelineLayout::new(desc, None).unwrap())
}

pub fn mt_pipeline(raw: u32, desc: &PipelineLayoutDesc) -> MtPipeline<u32> {
    MtPipeline::from_raw(raw, mt_layout(desc), Topology::Triangles)
}

pub fn mt_comp_pipeline(raw: u32, workgroup: [u32; 3]) -> MtCompPipeline<u32> {
    let desc = PipelineLayoutDesc::new().binding(LayoutBinding::new(
        0,
        BindingKind::Ssbo,
        ShaderStages::COMPUTE,
    ));
    MtCompPipeline::from_raw(raw, mt_layout(&desc), workgroup)
}

/// Device over [`MockMtl`] that remembers submissions and fence waits.
#[derive(Default)]
pub struct MockDevice {
    pub props: DeviceProperties,
    pub submitted: RefCell<Vec<u32>>,
    pub waited: RefCell<Vec<u32>>,
}

impl Device<MockApi> for MockDevice {
    fn properties(&self) -> &DeviceProperties {
        &self.props
    }

    fn command_buffer(&self) -> Result<MtCommandBuffer<MockMtl>> {
        Ok(mt_cmd(self.props.clone()))
    }

    fn fence(&self) -> Result<MockFence> {
        Ok(MockFence::default())
    }

    fn submit(&self, cmd: &mut MtCommandBuffer<MockMtl>, fence: Option<&MockFence>) -> Result<()> {
        let native = cmd.take_native()?;
        self.submitted.borrow_mut().push(native);
        if let Some(fence) = fence {
            fence.pending.set(Some(native));
        }
        Ok(())
    }

    fn wait(&self, fence: &MockFence) -> Result<()> {
        if let Some(native) = fence.pending.take() {
            self.waited.borrow_mut().push(native);
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(())
    }
}
