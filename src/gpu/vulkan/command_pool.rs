use ash::{vk, Device};

use crate::gpu::Result;

/// Thin wrapper around a Vulkan command pool.
///
/// Hands out primary command buffers that can be reset individually and
/// keeps returned ones for reuse. Vulkan pools are externally synchronized,
/// so the owning context keeps this behind a mutex.
pub struct CommandPool {
    device: Device,
    raw: vk::CommandPool,
    free: Vec<vk::CommandBuffer>,
}

impl CommandPool {
    /// Create a new command pool for the given queue family.
    pub(super) fn new(device: Device, family: u32) -> Result<Self> {
        let ci = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .build();
        let raw = unsafe { device.create_command_pool(&ci, None)? };
        Ok(Self {
            device,
            raw,
            free: Vec::new(),
        })
    }

    /// A primary command buffer, recycled if one is available.
    pub fn alloc(&mut self) -> Result<vk::CommandBuffer> {
        if let Some(buf) = self.free.pop() {
            unsafe {
                self.device
                    .reset_command_buffer(buf, vk::CommandBufferResetFlags::empty())?;
            }
            return Ok(buf);
        }
        let cmd = unsafe {
            self.device.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::builder()
                    .command_pool(self.raw)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1)
                    .build(),
            )?
        };
        cmd.into_iter().next().ok_or(crate::gpu::GPUError::OutOfMemory)
    }

    /// Return a command buffer whose GPU work has completed.
    pub fn recycle(&mut self, buf: vk::CommandBuffer) {
        self.free.push(buf);
    }

    /// Destroy the underlying Vulkan command pool. Command buffers allocated
    /// from this pool become invalid after this call.
    pub fn destroy(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.raw, None);
        }
        self.raw = vk::CommandPool::null();
        self.free.clear();
    }

    /// Raw Vulkan command pool handle.
    pub fn raw(&self) -> vk::CommandPool {
        self.raw
    }
}
