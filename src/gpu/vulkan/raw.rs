//! The native recording seam of the Vulkan backend.
//!
//! [`VkCommandBuffer`](super::VkCommandBuffer) decides *what* to record;
//! a [`RawCommands`] implementation writes it into a native command buffer.
//! [`AshCommands`] is the real one. Tests substitute a recorder.

use ash::vk;

use crate::gpu::Result;

pub trait RawCommands {
    /// Reset and start the native command buffer.
    fn begin(&mut self) -> Result<()>;
    fn end(&mut self) -> Result<()>;
    fn reset(&mut self) -> Result<()>;

    fn begin_render_pass(
        &mut self,
        pass: vk::RenderPass,
        fbo: vk::Framebuffer,
        area: vk::Rect2D,
        clear: &[vk::ClearValue],
    );
    fn end_render_pass(&mut self);

    fn bind_pipeline(&mut self, point: vk::PipelineBindPoint, pipeline: vk::Pipeline);
    fn bind_descriptor_set(
        &mut self,
        point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    );
    fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        data: &[u8],
    );
    fn set_viewport(&mut self, viewport: vk::Viewport, scissor: vk::Rect2D);

    fn bind_vertex_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize);
    fn bind_index_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, ty: vk::IndexType);
    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    /// Blit within one image, from a level in `TRANSFER_SRC_OPTIMAL` to a
    /// level in `TRANSFER_DST_OPTIMAL`.
    fn blit_image(&mut self, image: vk::Image, region: vk::ImageBlit, filter: vk::Filter);
    fn copy_image_to_buffer(
        &mut self,
        image: vk::Image,
        layout: vk::ImageLayout,
        buffer: vk::Buffer,
        region: vk::BufferImageCopy,
    );
    fn pipeline_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        dependency: vk::DependencyFlags,
        buffers: &[vk::BufferMemoryBarrier],
        images: &[vk::ImageMemoryBarrier],
    );
}

/// [`RawCommands`] over an `ash` device.
///
/// The command buffer belongs to the pool of the context that created it and
/// must not outlive that context.
pub struct AshCommands {
    device: ash::Device,
    cmd: vk::CommandBuffer,
}

impl AshCommands {
    pub(super) fn new(device: ash::Device, cmd: vk::CommandBuffer) -> Self {
        Self { device, cmd }
    }

    pub fn raw(&self) -> vk::CommandBuffer {
        self.cmd
    }
}

impl RawCommands for AshCommands {
    fn begin(&mut self) -> Result<()> {
        unsafe {
            self.device
                .reset_command_buffer(self.cmd, vk::CommandBufferResetFlags::empty())?;
            self.device.begin_command_buffer(
                self.cmd,
                &vk::CommandBufferBeginInfo::builder()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
                    .build(),
            )?;
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        unsafe { self.device.end_command_buffer(self.cmd)? };
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        unsafe {
            self.device
                .reset_command_buffer(self.cmd, vk::CommandBufferResetFlags::empty())?
        };
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        pass: vk::RenderPass,
        fbo: vk::Framebuffer,
        area: vk::Rect2D,
        clear: &[vk::ClearValue],
    ) {
        unsafe {
            self.device.cmd_begin_render_pass(
                self.cmd,
                &vk::RenderPassBeginInfo::builder()
                    .render_pass(pass)
                    .framebuffer(fbo)
                    .render_area(area)
                    .clear_values(clear)
                    .build(),
                vk::SubpassContents::INLINE,
            );
        }
    }

    fn end_render_pass(&mut self) {
        unsafe { self.device.cmd_end_render_pass(self.cmd) };
    }

    fn bind_pipeline(&mut self, point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe { self.device.cmd_bind_pipeline(self.cmd, point, pipeline) };
    }

    fn bind_descriptor_set(
        &mut self,
        point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        unsafe {
            self.device
                .cmd_bind_descriptor_sets(self.cmd, point, layout, 0, &[set], &[]);
        }
    }

    fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        data: &[u8],
    ) {
        unsafe {
            self.device
                .cmd_push_constants(self.cmd, layout, stages, 0, data);
        }
    }

    fn set_viewport(&mut self, viewport: vk::Viewport, scissor: vk::Rect2D) {
        unsafe {
            self.device.cmd_set_viewport(self.cmd, 0, &[viewport]);
            self.device.cmd_set_scissor(self.cmd, 0, &[scissor]);
        }
    }

    fn bind_vertex_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.cmd, 0, &[buffer], &[offset]);
        }
    }

    fn bind_index_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, ty: vk::IndexType) {
        unsafe {
            self.device
                .cmd_bind_index_buffer(self.cmd, buffer, offset, ty);
        }
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.device.cmd_draw(
                self.cmd,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed(
                self.cmd,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        unsafe { self.device.cmd_dispatch(self.cmd, x, y, z) };
    }

    fn blit_image(&mut self, image: vk::Image, region: vk::ImageBlit, filter: vk::Filter) {
        unsafe {
            self.device.cmd_blit_image(
                self.cmd,
                image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
                filter,
            );
        }
    }

    fn copy_image_to_buffer(
        &mut self,
        image: vk::Image,
        layout: vk::ImageLayout,
        buffer: vk::Buffer,
        region: vk::BufferImageCopy,
    ) {
        unsafe {
            self.device
                .cmd_copy_image_to_buffer(self.cmd, image, layout, buffer, &[region]);
        }
    }

    fn pipeline_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        dependency: vk::DependencyFlags,
        buffers: &[vk::BufferMemoryBarrier],
        images: &[vk::ImageMemoryBarrier],
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.cmd,
                src_stage,
                dst_stage,
                dependency,
                &[],
                buffers,
                images,
            );
        }
    }
}
