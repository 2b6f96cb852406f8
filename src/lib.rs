//! A small graphics HAL.
//!
//! Command buffers of the Vulkan and Metal backends share one recording API,
//! [`gpu::driver::CommandBuffer`], and one encoder model: at most one native
//! encoder is open at a time and bindings are flushed lazily right before a
//! draw or dispatch. The [`system`] module provides windows, input and the
//! application loop.
//!
//! ```ignore
//! use fresco::gpu::{self, driver::CommandBuffer, driver::Device, ContextInfo};
//!
//! let info = ContextInfo::from_env();
//! let dev = gpu::VulkanContext::new(&info)?;
//! let mut cmd = dev.command_buffer()?;
//! cmd.begin()?;
//! cmd.begin_render_pass(&fbo, &pass, 800, 600);
//! cmd.set_pipeline(&pipeline);
//! cmd.set_uniforms(&pipeline, &desc);
//! cmd.draw(&vbo, 0, 3, 0, 1);
//! cmd.end_render_pass();
//! cmd.end()?;
//! dev.submit(&mut cmd, None)?;
//! ```

pub mod gpu;
pub mod system;

pub use gpu::driver::{CommandBuffer, Device};
pub use gpu::{Backend, GPUError, Result};
