//! Vulkan instance, device and command pool
//!
//! [`VulkanContext`] owns everything that lives for the whole run: instance,
//! optional validation messenger, window surface, the chosen physical device,
//! the logical device with its queues, and the command pool. Swap chains are
//! built from it through [`RenderDevice::create_swap_chain`].

use std::ffi::{c_char, CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};

use crate::config::RendererConfig;
use crate::render::backend::{full_scissor, full_viewport, RenderDevice};
use crate::render::error::{RenderError, RenderResult};
use crate::render::vulkan::swapchain::VulkanSwapChain;
use crate::render::vulkan::window::Window;

const VALIDATION_LAYER: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// Surface capabilities, formats and present modes of a device
pub struct SwapChainSupport {
    /// Image count and extent limits
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported presentation modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Queue family indices used by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Family used for command submission
    pub graphics: u32,
    /// Family used for presentation
    pub present: u32,
}

/// Selected GPU and its queue families
pub struct PhysicalDeviceInfo {
    /// Device handle
    pub device: vk::PhysicalDevice,
    /// Device properties, including the name and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Queue families chosen for graphics and present
    pub queue_families: QueueFamilies,
}

impl PhysicalDeviceInfo {
    fn select_suitable_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> RenderResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices()? };
        log::debug!("Found {} physical device(s)", devices.len());

        for device in devices {
            match Self::evaluate_device(instance, device, surface, surface_loader) {
                Ok(info) => {
                    log::info!("Selected GPU: {}", unsafe {
                        CStr::from_ptr(info.properties.device_name.as_ptr()).to_string_lossy()
                    });
                    return Ok(info);
                }
                Err(e) => log::debug!("Skipping physical device: {}", e),
            }
        }

        Err(RenderError::InitializationFailed(
            "No suitable GPU found".to_string(),
        ))
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> RenderResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut graphics = None;
        let mut present = None;
        for (index, family) in queue_families.iter().enumerate() {
            let index = index as u32;
            if family.queue_count > 0
                && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && graphics.is_none()
            {
                graphics = Some(index);
            }

            let present_support = unsafe {
                surface_loader.get_physical_device_surface_support(device, index, surface)?
            };
            if family.queue_count > 0 && present_support && present.is_none() {
                present = Some(index);
            }

            if graphics.is_some() && present.is_some() {
                break;
            }
        }

        let queue_families = match (graphics, present) {
            (Some(graphics), Some(present)) => QueueFamilies { graphics, present },
            _ => {
                return Err(RenderError::InitializationFailed(
                    "No graphics and present queue families".to_string(),
                ))
            }
        };

        let extensions = unsafe { instance.enumerate_device_extension_properties(device)? };
        let has_swapchain = extensions.iter().any(|available| {
            let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Err(RenderError::InitializationFailed(
                "VK_KHR_swapchain not supported".to_string(),
            ));
        }

        let support = query_swap_chain_support(surface_loader, device, surface)?;
        if support.formats.is_empty() || support.present_modes.is_empty() {
            return Err(RenderError::InitializationFailed(
                "Surface offers no formats or present modes".to_string(),
            ));
        }

        Ok(Self {
            device,
            properties,
            queue_families,
        })
    }
}

fn query_swap_chain_support(
    surface_loader: &Surface,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> RenderResult<SwapChainSupport> {
    unsafe {
        Ok(SwapChainSupport {
            capabilities: surface_loader.get_physical_device_surface_capabilities(device, surface)?,
            formats: surface_loader.get_physical_device_surface_formats(device, surface)?,
            present_modes: surface_loader.get_physical_device_surface_present_modes(device, surface)?,
        })
    }
}

/// Long-lived Vulkan state shared by the renderer and its resources
pub struct VulkanContext {
    _entry: Entry,
    instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    surface_loader: Surface,
    surface: vk::SurfaceKHR,
    physical_device: PhysicalDeviceInfo,
    device: Device,
    swapchain_loader: SwapchainLoader,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    command_pool: vk::CommandPool,
    prefer_mailbox: bool,
    fence_timeout: u64,
}

impl VulkanContext {
    /// Bring up Vulkan for `window`
    pub fn new(window: &mut Window, config: &RendererConfig) -> RenderResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            RenderError::InitializationFailed(format!("Failed to load Vulkan: {:?}", e))
        })?;

        let enable_validation = config.enable_validation && validation_layer_available(&entry)?;
        if config.enable_validation && !enable_validation {
            log::warn!("Validation requested but VK_LAYER_KHRONOS_validation is not installed");
        }

        let instance = create_instance(&entry, window, &config.application_name, enable_validation)?;

        let debug = if enable_validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = setup_debug_messenger(&debug_utils)?;
            Some((debug_utils, messenger))
        } else {
            None
        };

        let surface_loader = Surface::new(&entry, &instance);
        let surface = window.create_vulkan_surface(instance.handle())?;

        let physical_device =
            PhysicalDeviceInfo::select_suitable_device(&instance, surface, &surface_loader)?;
        let families = physical_device.queue_families;

        let device = create_logical_device(&instance, &physical_device, enable_validation)?;
        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let swapchain_loader = SwapchainLoader::new(&instance, &device);

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(families.graphics)
            .flags(
                vk::CommandPoolCreateFlags::TRANSIENT
                    | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            );
        let command_pool = unsafe { device.create_command_pool(&pool_info, None)? };

        log::info!(
            "Vulkan context ready (validation {})",
            if enable_validation { "on" } else { "off" }
        );

        Ok(Self {
            _entry: entry,
            instance,
            debug,
            surface_loader,
            surface,
            physical_device,
            device,
            swapchain_loader,
            graphics_queue,
            present_queue,
            command_pool,
            prefer_mailbox: config.prefer_mailbox,
            fence_timeout: config.fence_timeout_ns(),
        })
    }

    /// Logical device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Selected GPU
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }

    /// Window surface
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Command pool shared by every command buffer
    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    /// Whether mailbox presentation should be preferred over FIFO
    pub fn prefer_mailbox(&self) -> bool {
        self.prefer_mailbox
    }

    /// Upper bound for fence waits, in nanoseconds
    pub fn fence_timeout(&self) -> u64 {
        self.fence_timeout
    }

    /// Current surface capabilities, formats and present modes
    pub fn swap_chain_support(&self) -> RenderResult<SwapChainSupport> {
        query_swap_chain_support(&self.surface_loader, self.physical_device.device, self.surface)
    }

    /// Find a memory type allowed by `type_filter` with all of `properties`
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> RenderResult<u32> {
        let memory_properties = unsafe {
            self.instance
                .get_physical_device_memory_properties(self.physical_device.device)
        };
        select_memory_type(&memory_properties, type_filter, properties)
    }

    /// First format in `candidates` supporting `features` with `tiling`
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> RenderResult<vk::Format> {
        candidates
            .iter()
            .copied()
            .find(|&format| {
                let props = unsafe {
                    self.instance
                        .get_physical_device_format_properties(self.physical_device.device, format)
                };
                match tiling {
                    vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                    vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                    _ => false,
                }
            })
            .ok_or_else(|| RenderError::InvalidOperation {
                reason: format!("None of {:?} supports {:?}", candidates, features),
            })
    }

    /// Allocate and begin a throwaway command buffer
    pub fn begin_single_time_commands(&self) -> RenderResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_pool(self.command_pool)
            .command_buffer_count(1);
        let command_buffer = unsafe { self.device.allocate_command_buffers(&alloc_info)?[0] };

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(command_buffer, &begin_info)? };
        Ok(command_buffer)
    }

    /// Submit a command buffer from [`Self::begin_single_time_commands`], wait, and free it
    pub fn end_single_time_commands(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        let command_buffers = [command_buffer];
        let result = unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .and_then(|()| {
                    let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
                    self.device
                        .queue_submit(self.graphics_queue, &[submit_info.build()], vk::Fence::null())
                })
                .and_then(|()| self.device.queue_wait_idle(self.graphics_queue))
        };
        unsafe {
            self.device
                .free_command_buffers(self.command_pool, &command_buffers);
        }
        result.map_err(RenderError::from)
    }

    /// Copy `size` bytes between buffers and wait for completion
    pub fn copy_buffer(
        &self,
        src: vk::Buffer,
        dst: vk::Buffer,
        size: vk::DeviceSize,
    ) -> RenderResult<()> {
        let command_buffer = self.begin_single_time_commands()?;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.device
                .cmd_copy_buffer(command_buffer, src, dst, &[region]);
        }
        self.end_single_time_commands(command_buffer)
    }
}

impl RenderDevice for VulkanContext {
    type SwapChain = VulkanSwapChain;

    fn wait_idle(&self) -> RenderResult<()> {
        unsafe { self.device.device_wait_idle().map_err(RenderError::from) }
    }

    fn create_swap_chain(
        &self,
        extent: vk::Extent2D,
        predecessor: Option<VulkanSwapChain>,
    ) -> RenderResult<VulkanSwapChain> {
        VulkanSwapChain::new(self, extent, predecessor)
    }

    fn allocate_command_buffers(&self, count: usize) -> RenderResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_pool(self.command_pool)
            .command_buffer_count(count as u32);
        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| {
                    log::error!("Failed to allocate {} command buffers: {:?}", count, e);
                    RenderError::from(e)
                })
        }
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        unsafe {
            self.device.free_command_buffers(self.command_pool, buffers);
        }
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(RenderError::from)
        }
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .map_err(RenderError::from)
        }
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) {
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(full_scissor(extent))
            .clear_values(clear_values);
        unsafe {
            self.device.cmd_begin_render_pass(
                command_buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }
    }

    fn cmd_set_viewport_and_scissor(&self, command_buffer: vk::CommandBuffer, extent: vk::Extent2D) {
        unsafe {
            self.device
                .cmd_set_viewport(command_buffer, 0, &[full_viewport(extent)]);
            self.device
                .cmd_set_scissor(command_buffer, 0, &[full_scissor(extent)]);
        }
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.cmd_end_render_pass(command_buffer);
        }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Pick the first memory type index allowed by `type_filter` with all of `properties`
pub fn select_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> RenderResult<u32> {
    (0..memory_properties.memory_type_count)
        .find(|&i| {
            (type_filter & (1 << i)) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
        })
        .ok_or(RenderError::NoSuitableMemoryType)
}

fn validation_layer_available(entry: &Entry) -> RenderResult<bool> {
    let layers = entry.enumerate_instance_layer_properties()?;
    Ok(layers.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == VALIDATION_LAYER
    }))
}

fn create_instance(
    entry: &Entry,
    window: &Window,
    app_name: &str,
    enable_validation: bool,
) -> RenderResult<Instance> {
    let app_name_cstr = CString::new(app_name).map_err(|_| {
        RenderError::InitializationFailed("Application name contains a NUL byte".to_string())
    })?;
    let engine_name_cstr = CString::new("Frame Engine").map_err(|_| {
        RenderError::InitializationFailed("Engine name contains a NUL byte".to_string())
    })?;
    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name_cstr)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(&engine_name_cstr)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_0);

    let required_extensions = window.get_required_instance_extensions()?;
    let extension_cstrs = required_extensions
        .iter()
        .map(|ext| CString::new(ext.as_str()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| {
            RenderError::InitializationFailed("Extension name contains a NUL byte".to_string())
        })?;
    let mut extensions: Vec<*const c_char> = extension_cstrs.iter().map(|ext| ext.as_ptr()).collect();
    if enable_validation {
        extensions.push(DebugUtils::name().as_ptr());
    }
    log::debug!("Instance extensions: {:?}", required_extensions);

    let layers: Vec<*const c_char> = if enable_validation {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        Vec::new()
    };

    let create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);

    unsafe { entry.create_instance(&create_info, None).map_err(RenderError::from) }
}

fn create_logical_device(
    instance: &Instance,
    physical_device: &PhysicalDeviceInfo,
    enable_validation: bool,
) -> RenderResult<Device> {
    let families = physical_device.queue_families;
    let mut unique_families = vec![families.graphics];
    if families.present != families.graphics {
        unique_families.push(families.present);
    }

    let priorities = [1.0];
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&priorities)
                .build()
        })
        .collect();

    let extensions = [SwapchainLoader::name().as_ptr()];
    let layers: Vec<*const c_char> = if enable_validation {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        Vec::new()
    };
    let features = vk::PhysicalDeviceFeatures::default();

    let create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers)
        .enabled_features(&features);

    unsafe {
        instance
            .create_device(physical_device.device, &create_info, None)
            .map_err(RenderError::from)
    }
}

fn setup_debug_messenger(debug_utils: &DebugUtils) -> RenderResult<vk::DebugUtilsMessengerEXT> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    unsafe {
        debug_utils
            .create_debug_utils_messenger(&create_info, None)
            .map_err(RenderError::from)
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}
