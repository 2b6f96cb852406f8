/// Defines the interface that rendering backends must implement.
///
/// A backend names the resource handles its command buffers record with.
/// Handles that take part in redundant-bind elimination carry a
/// [`ResourceId`](driver::ResourceId) through [`Identity`](driver::Identity).
///
/// # Examples
/// ```ignore
/// use fresco::gpu::{Backend, driver::CommandBuffer};
/// fn clear<B: Backend>(cmd: &mut B::CommandBuffer, fbo: &B::Framebuffer, pass: &B::RenderPass) {
///     cmd.begin_render_pass(fbo, pass, 800, 600);
///     cmd.end_render_pass();
/// }
/// ```
pub trait Backend: Sized {
    type Buffer: Identity;
    type Texture: Identity;
    type Framebuffer;
    type RenderPass;
    type Pipeline: Identity;
    type CompPipeline: Identity;
    type Desc: Identity + Clone;
    type Fence;
    type CommandBuffer: CommandBuffer<Self>;
}

pub mod driver;
use driver::{CommandBuffer, Device, DeviceProperties, Identity};

pub mod error;
pub use error::{ErrorKind, GPUError, Result};

pub mod framed;
pub use framed::FramedCommandBuffers;

pub mod structs;
pub use structs::*;

pub mod vulkan;
pub use vulkan::{VulkanApi, VulkanContext};

pub mod metal;
pub use self::metal::MetalApi;

/// A device of whichever backend [`ContextInfo::backend`] selected.
pub enum AnyDevice {
    Vulkan(VulkanContext),
    #[cfg(all(feature = "fresco-metal", target_vendor = "apple"))]
    Metal(self::metal::MtDevice),
}

impl AnyDevice {
    pub fn kind(&self) -> BackendKind {
        match self {
            AnyDevice::Vulkan(_) => BackendKind::Vulkan,
            #[cfg(all(feature = "fresco-metal", target_vendor = "apple"))]
            AnyDevice::Metal(_) => BackendKind::Metal,
        }
    }

    pub fn properties(&self) -> &DeviceProperties {
        match self {
            AnyDevice::Vulkan(dev) => dev.properties(),
            #[cfg(all(feature = "fresco-metal", target_vendor = "apple"))]
            AnyDevice::Metal(dev) => dev.properties(),
        }
    }
}

/// Open the device `info` asks for.
///
/// Fails with [`GPUError::BackendUnavailable`] when the backend was not
/// compiled in.
pub fn create_device(info: &ContextInfo) -> Result<AnyDevice> {
    log::debug!("creating {:?} device", info.backend);
    match info.backend {
        BackendKind::Vulkan => Ok(AnyDevice::Vulkan(VulkanContext::new(info)?)),
        #[cfg(all(feature = "fresco-metal", target_vendor = "apple"))]
        BackendKind::Metal => Ok(AnyDevice::Metal(self::metal::MtDevice::new(info)?)),
        #[cfg(not(all(feature = "fresco-metal", target_vendor = "apple")))]
        BackendKind::Metal => Err(GPUError::BackendUnavailable(BackendKind::Metal)),
    }
}
