use bytemuck::Pod;

use super::types::{
    BufferLayout, DeviceProperties, EncoderKind, IndexClass, Rect, RecordState, TextureLayout,
};
use crate::gpu::{Backend, Result};

//===----------------------------------------------------------------------===//
// Command buffer
//===----------------------------------------------------------------------===//

/// Records draw, dispatch and copy work for one backend.
///
/// Only one native encoder is open at a time. Calls that need a different
/// encoder kind close the current one and open the right one. Calling an
/// operation outside of its contract (drawing without a render pass,
/// dispatching without a compute pipeline, ...) panics with a message naming
/// the violated rule. Failures of the native API are returned as errors.
pub trait CommandBuffer<B: Backend> {
    /// Start recording. Fails with [`GPUError::InvalidState`] while already
    /// recording. All bind caches and pending state are reset.
    ///
    /// [`GPUError::InvalidState`]: crate::gpu::GPUError::InvalidState
    fn begin(&mut self) -> Result<()>;

    /// Close any open encoder and finish recording.
    fn end(&mut self) -> Result<()>;

    /// Discard recorded work and return to [`RecordState::Idle`].
    ///
    /// The buffer must not be referenced by a submission that is still
    /// executing.
    fn reset(&mut self) -> Result<()>;

    fn state(&self) -> RecordState;

    fn is_recording(&self) -> bool {
        self.state() == RecordState::Recording
    }

    fn encoder(&self) -> EncoderKind;

    fn begin_render_pass(
        &mut self,
        fbo: &B::Framebuffer,
        pass: &B::RenderPass,
        width: u32,
        height: u32,
    );

    fn end_render_pass(&mut self);

    fn set_pipeline(&mut self, pipeline: &B::Pipeline);

    fn set_compute_pipeline(&mut self, pipeline: &B::CompPipeline);

    /// Stage push bytes for `pipeline`, applied at the next draw.
    fn set_bytes(&mut self, pipeline: &B::Pipeline, data: &[u8]);

    fn set_compute_bytes(&mut self, pipeline: &B::CompPipeline, data: &[u8]);

    /// Stage a descriptor set for `pipeline`, applied at the next draw if it
    /// differs from the one applied last.
    fn set_uniforms(&mut self, pipeline: &B::Pipeline, desc: &B::Desc);

    fn set_compute_uniforms(&mut self, pipeline: &B::CompPipeline, desc: &B::Desc);

    /// Applied right away inside a render pass, otherwise when the next one
    /// opens.
    fn set_viewport(&mut self, rect: Rect);

    fn draw(
        &mut self,
        vbo: &B::Buffer,
        offset: usize,
        vertex_count: usize,
        first_instance: usize,
        instance_count: usize,
    );

    /// `ioffset` is the first index, `isize` the number of indices and
    /// `voffset` the value added to each index.
    #[allow(clippy::too_many_arguments)]
    fn draw_indexed(
        &mut self,
        vbo: &B::Buffer,
        ibo: &B::Buffer,
        cls: IndexClass,
        ioffset: usize,
        isize: usize,
        voffset: usize,
        first_instance: usize,
        instance_count: usize,
    );

    fn dispatch(&mut self, x: usize, y: usize, z: usize);

    /// Fill levels `1..mip_levels` of `image` from level 0 and leave every
    /// level in `layout`.
    fn generate_mipmap(
        &mut self,
        image: &B::Texture,
        layout: TextureLayout,
        width: u32,
        height: u32,
        mip_levels: u32,
    );

    /// Copy the `width`×`height` region of level `mip` of `src` into `dest`
    /// at byte `offset`. `layout` is the layout `src` is in before and after.
    #[allow(clippy::too_many_arguments)]
    fn copy(
        &mut self,
        dest: &B::Buffer,
        layout: TextureLayout,
        width: u32,
        height: u32,
        mip: u32,
        src: &B::Texture,
        offset: usize,
    );

    fn change_buffer_layout(&mut self, buf: &B::Buffer, prev: BufferLayout, next: BufferLayout);

    fn change_texture_layout(
        &mut self,
        tex: &B::Texture,
        prev: TextureLayout,
        next: TextureLayout,
        by_region: bool,
    );

    /// [`CommandBuffer::set_bytes`] for a plain-old-data value.
    fn set_push<T: Pod>(&mut self, pipeline: &B::Pipeline, value: &T)
    where
        Self: Sized,
    {
        self.set_bytes(pipeline, bytemuck::bytes_of(value));
    }

    fn set_compute_push<T: Pod>(&mut self, pipeline: &B::CompPipeline, value: &T)
    where
        Self: Sized,
    {
        self.set_compute_bytes(pipeline, bytemuck::bytes_of(value));
    }
}

//===----------------------------------------------------------------------===//
// Device
//===----------------------------------------------------------------------===//

/// Queue and allocation glue around one native device.
pub trait Device<B: Backend> {
    fn properties(&self) -> &DeviceProperties;

    fn command_buffer(&self) -> Result<B::CommandBuffer>;

    /// Fences start unsignaled.
    fn fence(&self) -> Result<B::Fence>;

    /// Submit a finished recording. `fence` is signaled once the GPU is done.
    fn submit(&self, cmd: &mut B::CommandBuffer, fence: Option<&B::Fence>) -> Result<()>;

    /// Block until `fence` signals, then reset it.
    fn wait(&self, fence: &B::Fence) -> Result<()>;

    fn wait_idle(&self) -> Result<()>;
}
