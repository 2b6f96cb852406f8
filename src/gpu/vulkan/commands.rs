//! Encoder state machine of the Vulkan backend.
//!
//! Vulkan has one native encoder scope, the render pass. Compute and copy
//! work are tracked as logical encoders so both backends report the same
//! [`EncoderKind`] sequence. Neither may be recorded inside a render pass.

use std::sync::Arc;

use ash::vk;

use super::conversions::{
    aspect_of, buffer_sync, layout_to_vk, rect_to_scissor, rect_to_viewport, texture_sync,
};
use super::raw::{AshCommands, RawCommands};
use super::{
    VkBuffer, VkCompPipeline, VkDescriptorSet, VkFramebuffer, VkPipeline, VkPipelineLayout,
    VkRenderPass, VkTexture, VulkanApi,
};
use crate::gpu::driver::binds::{BindCache, PendingBinds};
use crate::gpu::driver::types::to_u32;
use crate::gpu::driver::{
    BufferLayout, CommandBuffer, DeviceProperties, EncoderKind, Identity, IndexClass, Rect,
    RecordState, ResourceId, TextureLayout, mip_extent,
};
use crate::gpu::{GPUError, Result};

#[derive(Debug, Clone, Copy)]
struct ActivePass {
    width: u32,
    height: u32,
}

pub struct VkCommandBuffer<R: RawCommands = AshCommands> {
    raw: R,
    props: DeviceProperties,
    state: RecordState,
    encoder: EncoderKind,
    pass: Option<ActivePass>,

    pipeline: BindCache,
    layout: Option<Arc<VkPipelineLayout>>,
    binds: PendingBinds<VkDescriptorSet>,
    vbo: BindCache,
    ibo: Option<(ResourceId, IndexClass)>,

    comp_pipeline: BindCache,
    comp_layout: Option<Arc<VkPipelineLayout>>,
    workgroup: Option<[u32; 3]>,
    comp_binds: PendingBinds<VkDescriptorSet>,
}

impl<R: RawCommands> VkCommandBuffer<R> {
    pub fn new(raw: R, props: DeviceProperties) -> Self {
        Self {
            raw,
            props,
            state: RecordState::Idle,
            encoder: EncoderKind::None,
            pass: None,
            pipeline: BindCache::default(),
            layout: None,
            binds: PendingBinds::default(),
            vbo: BindCache::default(),
            ibo: None,
            comp_pipeline: BindCache::default(),
            comp_layout: None,
            workgroup: None,
            comp_binds: PendingBinds::default(),
        }
    }

    pub fn raw(&self) -> &R {
        &self.raw
    }

    pub fn raw_mut(&mut self) -> &mut R {
        &mut self.raw
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.props
    }

    /// Size of the active render pass.
    pub fn render_area(&self) -> Option<(u32, u32)> {
        self.pass.map(|p| (p.width, p.height))
    }

    fn assert_recording(&self, what: &str) {
        assert!(
            self.state == RecordState::Recording,
            "{}: command buffer is not recording",
            what
        );
    }

    fn clear_state(&mut self) {
        self.encoder = EncoderKind::None;
        self.pass = None;
        self.invalidate_graphics();
        self.binds.clear();
        self.comp_pipeline.invalidate();
        self.comp_layout = None;
        self.workgroup = None;
        self.comp_binds.clear();
    }

    /// Graphics state does not survive the render pass it was set in.
    fn invalidate_graphics(&mut self) {
        self.pipeline.invalidate();
        self.layout = None;
        self.binds.pipeline_changed();
        self.vbo.invalidate();
        self.ibo = None;
    }

    fn close_encoder(&mut self) {
        if self.encoder == EncoderKind::Draw {
            self.raw.end_render_pass();
            self.pass = None;
            self.invalidate_graphics();
        }
        self.encoder = EncoderKind::None;
    }

    /// Switch to a logical compute or blit encoder.
    fn switch_to(&mut self, kind: EncoderKind, what: &str) {
        assert!(
            self.pass.is_none(),
            "{}: not allowed inside a render pass on Vulkan",
            what
        );
        self.encoder = kind;
    }

    fn flush_graphics(&mut self) {
        let Self {
            raw, binds, layout, ..
        } = self;
        let Some(layout) = layout.as_ref() else {
            return;
        };
        if let Some(set) = binds.uniforms.take_changed() {
            raw.bind_descriptor_set(vk::PipelineBindPoint::GRAPHICS, layout.raw(), set.raw);
        }
        if let (Some(bytes), Some(range)) = (binds.push.take_dirty(), layout.push_range()) {
            raw.push_constants(layout.raw(), range.stages, bytes);
        }
    }

    fn flush_compute(&mut self) {
        let Self {
            raw,
            comp_binds,
            comp_layout,
            ..
        } = self;
        let Some(layout) = comp_layout.as_ref() else {
            return;
        };
        if let Some(set) = comp_binds.uniforms.take_changed() {
            raw.bind_descriptor_set(vk::PipelineBindPoint::COMPUTE, layout.raw(), set.raw);
        }
        if let (Some(bytes), Some(range)) = (comp_binds.push.take_dirty(), layout.push_range()) {
            raw.push_constants(layout.raw(), range.stages, bytes);
        }
    }

    fn stage_bytes(
        binds: &mut PendingBinds<VkDescriptorSet>,
        layout: &VkPipelineLayout,
        data: &[u8],
        what: &str,
    ) {
        let range = layout
            .push_range()
            .unwrap_or_else(|| panic!("{}: pipeline layout has no push block", what));
        assert!(
            data.len() <= range.size as usize,
            "{}: {} bytes do not fit the {} byte push block",
            what,
            data.len(),
            range.size
        );
        binds.push.stage(data);
    }

    fn image_barrier(
        &mut self,
        tex: &VkTexture,
        base_mip: u32,
        mip_count: u32,
        transition: (vk::ImageLayout, vk::ImageLayout),
        access: (vk::AccessFlags, vk::AccessFlags),
        stages: (vk::PipelineStageFlags, vk::PipelineStageFlags),
    ) {
        let barrier = vk::ImageMemoryBarrier::builder()
            .image(tex.raw)
            .old_layout(transition.0)
            .new_layout(transition.1)
            .src_access_mask(access.0)
            .dst_access_mask(access.1)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_of(tex.format),
                base_mip_level: base_mip,
                level_count: mip_count,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            })
            .build();
        self.raw.pipeline_barrier(
            stages.0,
            stages.1,
            vk::DependencyFlags::empty(),
            &[],
            &[barrier],
        );
    }
}

impl<R: RawCommands> CommandBuffer<VulkanApi<R>> for VkCommandBuffer<R> {
    fn begin(&mut self) -> Result<()> {
        if self.state == RecordState::Recording {
            return Err(GPUError::InvalidState);
        }
        self.clear_state();
        self.raw.begin()?;
        self.state = RecordState::Recording;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if self.state != RecordState::Recording {
            return Err(GPUError::InvalidState);
        }
        if self.encoder == EncoderKind::Draw {
            log::warn!("end: closing a render pass that was left open");
        }
        self.close_encoder();
        self.raw.end()?;
        self.state = RecordState::Ended;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.raw.reset()?;
        self.clear_state();
        self.state = RecordState::Idle;
        Ok(())
    }

    fn state(&self) -> RecordState {
        self.state
    }

    fn encoder(&self) -> EncoderKind {
        self.encoder
    }

    fn begin_render_pass(
        &mut self,
        fbo: &VkFramebuffer,
        pass: &VkRenderPass,
        width: u32,
        height: u32,
    ) {
        self.assert_recording("begin_render_pass");
        assert!(
            self.pass.is_none(),
            "begin_render_pass: a render pass is already active"
        );
        assert!(
            fbo.raw != vk::Framebuffer::null(),
            "begin_render_pass: framebuffer is null"
        );
        assert!(
            pass.raw != vk::RenderPass::null(),
            "begin_render_pass: render pass is null"
        );

        self.close_encoder();
        let area = rect_to_scissor(Rect::from_size(width, height));
        self.raw.begin_render_pass(pass.raw, fbo.raw, area, &pass.clear);
        self.encoder = EncoderKind::Draw;
        self.pass = Some(ActivePass { width, height });

        let viewport = self
            .binds
            .viewport
            .take()
            .unwrap_or_else(|| Rect::from_size(width, height));
        self.raw
            .set_viewport(rect_to_viewport(viewport), rect_to_scissor(viewport));
    }

    fn end_render_pass(&mut self) {
        self.assert_recording("end_render_pass");
        assert!(
            self.encoder == EncoderKind::Draw,
            "end_render_pass: no render pass is active"
        );
        self.close_encoder();
    }

    fn set_pipeline(&mut self, pipeline: &VkPipeline) {
        self.assert_recording("set_pipeline");
        assert!(
            self.encoder == EncoderKind::Draw,
            "set_pipeline: no render pass is active"
        );
        if self.pipeline.update(pipeline.id()) {
            self.raw
                .bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.raw);
            self.layout = Some(Arc::clone(&pipeline.layout));
            self.binds.pipeline_changed();
        }
    }

    fn set_compute_pipeline(&mut self, pipeline: &VkCompPipeline) {
        self.assert_recording("set_compute_pipeline");
        self.switch_to(EncoderKind::Compute, "set_compute_pipeline");
        if self.comp_pipeline.update(pipeline.id()) {
            self.raw
                .bind_pipeline(vk::PipelineBindPoint::COMPUTE, pipeline.raw);
            self.comp_layout = Some(Arc::clone(&pipeline.layout));
            self.workgroup = Some(pipeline.workgroup);
            self.comp_binds.pipeline_changed();
        }
    }

    fn set_bytes(&mut self, pipeline: &VkPipeline, data: &[u8]) {
        self.assert_recording("set_bytes");
        assert!(
            self.pipeline.bound() == Some(pipeline.id()),
            "set_bytes: pipeline is not bound"
        );
        Self::stage_bytes(&mut self.binds, &pipeline.layout, data, "set_bytes");
    }

    fn set_compute_bytes(&mut self, pipeline: &VkCompPipeline, data: &[u8]) {
        self.assert_recording("set_compute_bytes");
        assert!(
            self.comp_pipeline.bound() == Some(pipeline.id()),
            "set_compute_bytes: pipeline is not bound"
        );
        Self::stage_bytes(&mut self.comp_binds, &pipeline.layout, data, "set_compute_bytes");
    }

    fn set_uniforms(&mut self, pipeline: &VkPipeline, desc: &VkDescriptorSet) {
        self.assert_recording("set_uniforms");
        assert!(
            self.pipeline.bound() == Some(pipeline.id()),
            "set_uniforms: pipeline is not bound"
        );
        self.binds.uniforms.stage(desc);
    }

    fn set_compute_uniforms(&mut self, pipeline: &VkCompPipeline, desc: &VkDescriptorSet) {
        self.assert_recording("set_compute_uniforms");
        assert!(
            self.comp_pipeline.bound() == Some(pipeline.id()),
            "set_compute_uniforms: pipeline is not bound"
        );
        self.comp_binds.uniforms.stage(desc);
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.assert_recording("set_viewport");
        if self.encoder == EncoderKind::Draw {
            self.raw
                .set_viewport(rect_to_viewport(rect), rect_to_scissor(rect));
        } else {
            self.binds.viewport = Some(rect);
        }
    }

    fn draw(
        &mut self,
        vbo: &VkBuffer,
        offset: usize,
        vertex_count: usize,
        first_instance: usize,
        instance_count: usize,
    ) {
        self.assert_recording("draw");
        assert!(
            self.encoder == EncoderKind::Draw,
            "draw: no render pass is active"
        );
        assert!(self.layout.is_some(), "draw: no pipeline is bound");

        self.flush_graphics();
        if self.vbo.update(vbo.id()) {
            self.raw.bind_vertex_buffer(vbo.raw, 0);
        }
        self.raw.draw(
            to_u32(vertex_count, "vertex count"),
            to_u32(instance_count, "instance count"),
            to_u32(offset, "vertex offset"),
            to_u32(first_instance, "first instance"),
        );
    }

    fn draw_indexed(
        &mut self,
        vbo: &VkBuffer,
        ibo: &VkBuffer,
        cls: IndexClass,
        ioffset: usize,
        isize: usize,
        voffset: usize,
        first_instance: usize,
        instance_count: usize,
    ) {
        self.assert_recording("draw_indexed");
        assert!(
            self.encoder == EncoderKind::Draw,
            "draw_indexed: no render pass is active"
        );
        assert!(self.layout.is_some(), "draw_indexed: no pipeline is bound");

        self.flush_graphics();
        if self.vbo.update(vbo.id()) {
            self.raw.bind_vertex_buffer(vbo.raw, 0);
        }
        if self.ibo != Some((ibo.id(), cls)) {
            self.raw.bind_index_buffer(ibo.raw, 0, cls.into());
            self.ibo = Some((ibo.id(), cls));
        }
        let voffset = i32::try_from(voffset)
            .unwrap_or_else(|_| panic!("draw_indexed: vertex offset {} is too large", voffset));
        self.raw.draw_indexed(
            to_u32(isize, "index count"),
            to_u32(instance_count, "instance count"),
            to_u32(ioffset, "index offset"),
            voffset,
            to_u32(first_instance, "first instance"),
        );
    }

    fn dispatch(&mut self, x: usize, y: usize, z: usize) {
        self.assert_recording("dispatch");
        let workgroup = self
            .workgroup
            .unwrap_or_else(|| panic!("dispatch: no compute pipeline is bound"));
        self.switch_to(EncoderKind::Compute, "dispatch");

        let groups = [
            to_u32(x, "group count"),
            to_u32(y, "group count"),
            to_u32(z, "group count"),
        ];
        if !self.props.validate_dispatch(groups, workgroup) {
            return;
        }
        self.flush_compute();
        self.raw.dispatch(groups[0], groups[1], groups[2]);
    }

    fn generate_mipmap(
        &mut self,
        image: &VkTexture,
        layout: TextureLayout,
        width: u32,
        height: u32,
        mip_levels: u32,
    ) {
        self.assert_recording("generate_mipmap");
        assert!(
            layout != TextureLayout::Undefined,
            "generate_mipmap: target layout must be defined"
        );
        self.switch_to(EncoderKind::Blit, "generate_mipmap");

        let def = layout_to_vk(layout, image.format);
        let (def_stage, def_access) = texture_sync(layout);
        let aspect = aspect_of(image.format);

        for level in 1..mip_levels {
            let src_old = if level == 1 {
                def
            } else {
                vk::ImageLayout::TRANSFER_DST_OPTIMAL
            };
            let src_access = if level == 1 {
                def_access
            } else {
                vk::AccessFlags::TRANSFER_WRITE
            };
            self.image_barrier(
                image,
                level - 1,
                1,
                (src_old, vk::ImageLayout::TRANSFER_SRC_OPTIMAL),
                (src_access, vk::AccessFlags::TRANSFER_READ),
                (def_stage | vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::TRANSFER),
            );
            self.image_barrier(
                image,
                level,
                1,
                (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
                (vk::AccessFlags::empty(), vk::AccessFlags::TRANSFER_WRITE),
                (vk::PipelineStageFlags::TOP_OF_PIPE, vk::PipelineStageFlags::TRANSFER),
            );

            let (sw, sh) = mip_extent(width, height, level - 1);
            let (dw, dh) = mip_extent(width, height, level);
            let region = vk::ImageBlit {
                src_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: aspect,
                    mip_level: level - 1,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                src_offsets: [
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D {
                        x: sw as i32,
                        y: sh as i32,
                        z: 1,
                    },
                ],
                dst_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: aspect,
                    mip_level: level,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                dst_offsets: [
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D {
                        x: dw as i32,
                        y: dh as i32,
                        z: 1,
                    },
                ],
            };
            self.raw.blit_image(image.raw, region, vk::Filter::LINEAR);
        }

        if mip_levels > 1 {
            let last = mip_levels - 1;
            self.image_barrier(
                image,
                0,
                last,
                (vk::ImageLayout::TRANSFER_SRC_OPTIMAL, def),
                (vk::AccessFlags::TRANSFER_READ, def_access),
                (vk::PipelineStageFlags::TRANSFER, def_stage),
            );
            self.image_barrier(
                image,
                last,
                1,
                (vk::ImageLayout::TRANSFER_DST_OPTIMAL, def),
                (vk::AccessFlags::TRANSFER_WRITE, def_access),
                (vk::PipelineStageFlags::TRANSFER, def_stage),
            );
        }
        self.close_encoder();
    }

    fn copy(
        &mut self,
        dest: &VkBuffer,
        layout: TextureLayout,
        width: u32,
        height: u32,
        mip: u32,
        src: &VkTexture,
        offset: usize,
    ) {
        self.assert_recording("copy");
        let bpp = src.format.bytes_per_pixel() as u64;
        let needed = (width as u64 * bpp)
            .checked_mul(height as u64)
            .and_then(|image| image.checked_add(offset as u64))
            .unwrap_or(u64::MAX);
        assert!(
            needed <= dest.size,
            "copy: {} bytes do not fit a {} byte buffer",
            needed,
            dest.size
        );
        self.switch_to(EncoderKind::Blit, "copy");

        let old = layout_to_vk(layout, src.format);
        let (old_stage, old_access) = texture_sync(layout);
        let needs_transition = old != vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
        if needs_transition {
            self.image_barrier(
                src,
                mip,
                1,
                (old, vk::ImageLayout::TRANSFER_SRC_OPTIMAL),
                (old_access, vk::AccessFlags::TRANSFER_READ),
                (old_stage, vk::PipelineStageFlags::TRANSFER),
            );
        }

        let region = vk::BufferImageCopy {
            buffer_offset: offset as vk::DeviceSize,
            buffer_row_length: width,
            buffer_image_height: height,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: aspect_of(src.format),
                mip_level: mip,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
        };
        self.raw.copy_image_to_buffer(
            src.raw,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            dest.raw,
            region,
        );

        if needs_transition && old != vk::ImageLayout::UNDEFINED {
            self.image_barrier(
                src,
                mip,
                1,
                (vk::ImageLayout::TRANSFER_SRC_OPTIMAL, old),
                (vk::AccessFlags::TRANSFER_READ, old_access),
                (vk::PipelineStageFlags::TRANSFER, old_stage),
            );
        }
        self.close_encoder();
    }

    fn change_buffer_layout(&mut self, buf: &VkBuffer, prev: BufferLayout, next: BufferLayout) {
        self.assert_recording("change_buffer_layout");
        let (src_stage, src_access) = buffer_sync(prev);
        let (dst_stage, dst_access) = buffer_sync(next);
        let barrier = vk::BufferMemoryBarrier::builder()
            .buffer(buf.raw)
            .offset(0)
            .size(vk::WHOLE_SIZE)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .build();
        self.raw.pipeline_barrier(
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[barrier],
            &[],
        );
    }

    fn change_texture_layout(
        &mut self,
        tex: &VkTexture,
        prev: TextureLayout,
        next: TextureLayout,
        by_region: bool,
    ) {
        self.assert_recording("change_texture_layout");
        assert!(
            next != TextureLayout::Undefined,
            "change_texture_layout: cannot transition to Undefined"
        );
        let (src_stage, src_access) = texture_sync(prev);
        let (dst_stage, dst_access) = texture_sync(next);
        let barrier = vk::ImageMemoryBarrier::builder()
            .image(tex.raw)
            .old_layout(layout_to_vk(prev, tex.format))
            .new_layout(layout_to_vk(next, tex.format))
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_of(tex.format),
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            })
            .build();
        let dependency = if by_region {
            vk::DependencyFlags::BY_REGION
        } else {
            vk::DependencyFlags::empty()
        };
        self.raw
            .pipeline_barrier(src_stage, dst_stage, dependency, &[], &[barrier]);
    }
}
