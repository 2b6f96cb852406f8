use std::ffi::{c_char, c_void, CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use parking_lot::Mutex;

use super::raw::AshCommands;
use super::{CommandPool, VkCommandBuffer, VkFence, VulkanApi};
use crate::gpu::driver::{CommandBuffer, Device, DeviceProperties, RecordState};
use crate::gpu::structs::{ContextInfo, DeviceType};
use crate::gpu::{GPUError, Result};

/// Names of debugging layers that should be enabled when validation is requested.
pub const DEBUG_LAYER_NAMES: [*const c_char; 1] =
    [b"VK_LAYER_KHRONOS_validation\0".as_ptr() as *const c_char];

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    let message = unsafe { CStr::from_ptr((*p_callback_data).p_message) }.to_string_lossy();
    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[{:?}] {}", message_type, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("[{:?}] {}", message_type, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::debug!("[{:?}] {}", message_type, message);
    } else {
        log::trace!("[{:?}] {}", message_type, message);
    }
    vk::FALSE
}

impl From<vk::PhysicalDeviceType> for DeviceType {
    fn from(value: vk::PhysicalDeviceType) -> Self {
        match value {
            vk::PhysicalDeviceType::DISCRETE_GPU => DeviceType::Dedicated,
            vk::PhysicalDeviceType::INTEGRATED_GPU => DeviceType::Integrated,
            _ => DeviceType::Other,
        }
    }
}

/// Instance, logical device, one graphics+compute queue and a command pool.
pub struct VulkanContext {
    _entry: Entry,
    instance: ash::Instance,
    pdevice: vk::PhysicalDevice,
    device: ash::Device,
    family: u32,
    queue: Mutex<vk::Queue>,
    pool: Mutex<CommandPool>,
    props: DeviceProperties,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanContext {
    /// Create a device from `info`.
    ///
    /// Validation layers are enabled when `info.validation` is set and the
    /// layer is installed; messages are forwarded to the `log` facade.
    pub fn new(info: &ContextInfo) -> Result<Self> {
        let entry = unsafe { Entry::load() }?;

        let app_name = CString::new(info.app_name.as_str()).unwrap_or_default();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .engine_name(&app_name)
            .api_version(vk::make_api_version(0, 1, 1, 0))
            .build();

        let mut inst_exts = Vec::new();
        let mut inst_layers = Vec::new();
        if info.validation {
            inst_exts.push(DebugUtils::name().as_ptr());
            let available_layers = entry.enumerate_instance_layer_properties()?;
            for &layer in &DEBUG_LAYER_NAMES {
                let name = unsafe { CStr::from_ptr(layer) };
                if available_layers
                    .iter()
                    .any(|prop| unsafe { CStr::from_ptr(prop.layer_name.as_ptr()) == name })
                {
                    inst_layers.push(layer);
                } else {
                    log::warn!("validation requested but {:?} is not installed", name);
                }
            }
        }

        let instance = unsafe {
            entry.create_instance(
                &vk::InstanceCreateInfo::builder()
                    .application_info(&app_info)
                    .enabled_extension_names(&inst_exts)
                    .enabled_layer_names(&inst_layers)
                    .build(),
                None,
            )
        }?;

        let debug = if info.validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger_ci = vk::DebugUtilsMessengerCreateInfoEXT::builder()
                .message_severity(
                    vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                        | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
                )
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(vulkan_debug_callback));
            let messenger =
                unsafe { debug_utils.create_debug_utils_messenger(&messenger_ci, None)? };
            Some((debug_utils, messenger))
        } else {
            None
        };

        let pdevice = Self::select_physical_device(&instance, info.device_index)?;
        let device_prop = unsafe { instance.get_physical_device_properties(pdevice) };
        let queue_prop = unsafe { instance.get_physical_device_queue_family_properties(pdevice) };
        let family = queue_prop
            .iter()
            .position(|prop| {
                prop.queue_flags
                    .contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
            })
            .ok_or(GPUError::NoDevice("no queue family supports graphics and compute"))?
            as u32;

        let priorities = [1.0];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(family)
            .queue_priorities(&priorities)
            .build()];
        let device = unsafe {
            instance.create_device(
                pdevice,
                &vk::DeviceCreateInfo::builder()
                    .queue_create_infos(&queue_infos)
                    .build(),
                None,
            )
        }?;
        let queue = unsafe { device.get_device_queue(family, 0) };
        let pool = CommandPool::new(device.clone(), family)?;

        let limits = &device_prop.limits;
        let props = DeviceProperties {
            name: unsafe { CStr::from_ptr(device_prop.device_name.as_ptr()) }
                .to_string_lossy()
                .into_owned(),
            max_threads_per_group: limits.max_compute_work_group_invocations,
            max_group_count: limits.max_compute_work_group_count,
            max_push_bytes: limits.max_push_constants_size,
        };
        log::info!(
            "created Vulkan device '{}' (queue family {})",
            props.name,
            family
        );

        Ok(Self {
            _entry: entry,
            instance,
            pdevice,
            device,
            family,
            queue: Mutex::new(queue),
            pool: Mutex::new(pool),
            props,
            debug,
        })
    }

    fn select_physical_device(
        instance: &ash::Instance,
        index: Option<usize>,
    ) -> Result<vk::PhysicalDevice> {
        let pdevices = unsafe { instance.enumerate_physical_devices()? };
        if let Some(idx) = index {
            return pdevices
                .get(idx)
                .copied()
                .ok_or(GPUError::NoDevice("device index out of range"));
        }
        let dedicated = pdevices.iter().copied().find(|&pd| {
            let prop = unsafe { instance.get_physical_device_properties(pd) };
            DeviceType::from(prop.device_type) == DeviceType::Dedicated
        });
        dedicated
            .or_else(|| pdevices.first().copied())
            .ok_or(GPUError::NoDevice("no Vulkan capable device"))
    }

    pub fn raw_device(&self) -> &ash::Device {
        &self.device
    }

    pub fn raw_instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.pdevice
    }

    pub fn queue_family(&self) -> u32 {
        self.family
    }

    /// Give a command buffer back to the pool. Its GPU work must be complete.
    pub fn release(&self, cmd: VkCommandBuffer<AshCommands>) {
        self.pool.lock().recycle(cmd.raw().raw());
    }

    pub fn destroy_fence(&self, fence: VkFence) {
        unsafe { self.device.destroy_fence(fence.raw, None) };
    }
}

impl Device<VulkanApi> for VulkanContext {
    fn properties(&self) -> &DeviceProperties {
        &self.props
    }

    fn command_buffer(&self) -> Result<VkCommandBuffer<AshCommands>> {
        let raw = self.pool.lock().alloc()?;
        Ok(VkCommandBuffer::new(
            AshCommands::new(self.device.clone(), raw),
            self.props.clone(),
        ))
    }

    fn fence(&self) -> Result<VkFence> {
        let raw = unsafe {
            self.device
                .create_fence(&vk::FenceCreateInfo::builder().build(), None)?
        };
        Ok(VkFence { raw })
    }

    fn submit(&self, cmd: &mut VkCommandBuffer<AshCommands>, fence: Option<&VkFence>) -> Result<()> {
        if cmd.state() != RecordState::Ended {
            return Err(GPUError::InvalidState);
        }
        let bufs = [cmd.raw().raw()];
        let submit = vk::SubmitInfo::builder().command_buffers(&bufs).build();
        let queue = self.queue.lock();
        unsafe {
            self.device.queue_submit(
                *queue,
                &[submit],
                fence.map_or(vk::Fence::null(), |f| f.raw),
            )?;
        }
        Ok(())
    }

    fn wait(&self, fence: &VkFence) -> Result<()> {
        unsafe {
            self.device
                .wait_for_fences(&[fence.raw], true, u64::MAX)?;
            self.device.reset_fences(&[fence.raw])?;
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        let _queue = self.queue.lock();
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            if let Err(err) = self.device.device_wait_idle() {
                log::error!("wait idle before teardown failed: {}", err);
            }
            self.pool.lock().destroy();
            self.device.destroy_device(None);
            if let Some((utils, messenger)) = self.debug.take() {
                utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("destroyed Vulkan device '{}'", self.props.name);
    }
}
