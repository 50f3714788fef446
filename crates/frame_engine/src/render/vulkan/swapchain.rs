//! Vulkan swap chain
//!
//! Owns the presentable images and everything sized to them (image views,
//! depth buffers, framebuffers), the render pass, and the per-frame
//! synchronization objects. A replacement chain is built from its predecessor:
//! the old `VkSwapchainKHR` is handed to the driver as `oldSwapchain` and the
//! frame sync objects move across, so fences that are still pending from the
//! last frames stay valid.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use crate::render::backend::{PresentStatus, SwapChainBackend, SwapFormats, MAX_FRAMES_IN_FLIGHT};
use crate::render::error::{RenderError, RenderResult};
use crate::render::vulkan::context::VulkanContext;
use crate::render::vulkan::sync::{wait_for_fence, FrameSync, ImageFenceTable};
use crate::render::vulkan::targets::{find_depth_format, DepthBuffer, Framebuffer, RenderPass};

/// Swap chain and its render targets
pub struct VulkanSwapChain {
    device: Device,
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    formats: SwapFormats,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    depth_buffers: Vec<DepthBuffer>,
    render_pass: Option<RenderPass>,
    framebuffers: Vec<Framebuffer>,
    frame_sync: Vec<FrameSync>,
    images_in_flight: ImageFenceTable,
    current_frame: usize,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    fence_timeout: u64,
}

impl VulkanSwapChain {
    /// Build a swap chain for `extent`, adopting `predecessor`'s frame sync
    pub fn new(
        context: &VulkanContext,
        extent: vk::Extent2D,
        predecessor: Option<VulkanSwapChain>,
    ) -> RenderResult<Self> {
        let support = context.swap_chain_support()?;
        let surface_format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes, context.prefer_mailbox());
        let extent = choose_extent(&support.capabilities, extent);
        let min_image_count = choose_image_count(&support.capabilities)?;

        let families = context.physical_device().queue_families;
        let family_indices = [families.graphics, families.present];
        let old_swapchain = predecessor
            .as_ref()
            .map_or(vk::SwapchainKHR::null(), |old| old.swapchain);

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface())
            .min_image_count(min_image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        create_info = if families.graphics != families.present {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let loader = context.swapchain_loader().clone();
        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };

        let (frame_sync, current_frame) = match predecessor {
            Some(mut old) => (std::mem::take(&mut old.frame_sync), old.current_frame),
            None => (Vec::new(), 0),
        };

        let mut chain = Self {
            device: context.device().clone(),
            loader,
            swapchain,
            formats: SwapFormats {
                color: surface_format.format,
                depth: vk::Format::UNDEFINED,
            },
            extent,
            images: Vec::new(),
            image_views: Vec::new(),
            depth_buffers: Vec::new(),
            render_pass: None,
            framebuffers: Vec::new(),
            frame_sync,
            images_in_flight: ImageFenceTable::new(0),
            current_frame,
            graphics_queue: context.graphics_queue(),
            present_queue: context.present_queue(),
            fence_timeout: context.fence_timeout(),
        };

        chain.images = unsafe { chain.loader.get_swapchain_images(swapchain)? };
        chain.create_image_views()?;
        chain.formats.depth = find_depth_format(context)?;
        chain.render_pass = Some(RenderPass::new_forward_pass(
            chain.device.clone(),
            chain.formats.color,
            chain.formats.depth,
        )?);
        chain.create_depth_buffers(context)?;
        chain.create_framebuffers()?;
        if chain.frame_sync.is_empty() {
            chain.create_sync_objects()?;
        }
        chain.images_in_flight = ImageFenceTable::new(chain.images.len());

        log::debug!(
            "Swap chain {}x{}: {} images, {:?}, {:?}, depth {:?}",
            extent.width,
            extent.height,
            chain.images.len(),
            present_mode,
            chain.formats.color,
            chain.formats.depth
        );
        Ok(chain)
    }

    fn create_image_views(&mut self) -> RenderResult<()> {
        for &image in &self.images {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.formats.color)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { self.device.create_image_view(&create_info, None)? };
            self.image_views.push(view);
        }
        Ok(())
    }

    fn create_depth_buffers(&mut self, context: &VulkanContext) -> RenderResult<()> {
        for _ in 0..self.images.len() {
            self.depth_buffers
                .push(DepthBuffer::new(context, self.formats.depth, self.extent)?);
        }
        Ok(())
    }

    fn create_framebuffers(&mut self) -> RenderResult<()> {
        let render_pass = self.render_pass();
        for (view, depth) in self.image_views.iter().zip(&self.depth_buffers) {
            let attachments = [*view, depth.image_view()];
            self.framebuffers.push(Framebuffer::new(
                self.device.clone(),
                render_pass,
                &attachments,
                self.extent,
            )?);
        }
        Ok(())
    }

    fn create_sync_objects(&mut self) -> RenderResult<()> {
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            self.frame_sync.push(FrameSync::new(self.device.clone())?);
        }
        Ok(())
    }
}

impl SwapChainBackend for VulkanSwapChain {
    fn acquire_next_image(&mut self) -> RenderResult<(u32, PresentStatus)> {
        let sync = &self.frame_sync[self.current_frame];
        sync.in_flight.wait(self.fence_timeout)?;

        let result = unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                self.fence_timeout,
                sync.image_available.handle(),
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, false)) => Ok((image_index, PresentStatus::Success)),
            Ok((image_index, true)) => Ok((image_index, PresentStatus::Suboptimal)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok((0, PresentStatus::OutOfDate)),
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Err(RenderError::Timeout {
                operation: "swap chain image",
            }),
            Err(e) => {
                log::error!("Failed to acquire swap chain image: {:?}", e);
                Err(e.into())
            }
        }
    }

    fn submit_command_buffers(
        &mut self,
        buffers: &[vk::CommandBuffer],
        image_index: u32,
    ) -> RenderResult<PresentStatus> {
        let sync = &self.frame_sync[self.current_frame];
        let in_flight = sync.in_flight.handle();

        if let Some(previous) = self.images_in_flight.claim(image_index as usize, in_flight) {
            wait_for_fence(&self.device, previous, self.fence_timeout, "image in flight")?;
        }
        sync.in_flight.reset()?;

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[submit_info.build()], in_flight)?;
        }

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.loader.queue_present(self.present_queue, &present_info) };
        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;

        match result {
            Ok(false) => Ok(PresentStatus::Success),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
            Err(e) => {
                log::error!("Failed to present swap chain image: {:?}", e);
                Err(e.into())
            }
        }
    }

    fn formats(&self) -> SwapFormats {
        self.formats
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
            .as_ref()
            .map_or(vk::RenderPass::null(), RenderPass::handle)
    }

    fn framebuffer(&self, image_index: usize) -> vk::Framebuffer {
        self.framebuffers[image_index].handle()
    }
}

impl Drop for VulkanSwapChain {
    fn drop(&mut self) {
        self.framebuffers.clear();
        self.render_pass = None;
        self.depth_buffers.clear();
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Prefer sRGB BGRA, otherwise take whatever the surface lists first
pub fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
) -> RenderResult<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first())
        .copied()
        .ok_or_else(|| RenderError::InitializationFailed("Surface has no formats".to_string()))
}

/// Mailbox when preferred and available, otherwise FIFO (always supported)
pub fn choose_present_mode(available: &[vk::PresentModeKHR], prefer_mailbox: bool) -> vk::PresentModeKHR {
    if prefer_mailbox && available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Use the surface's fixed extent when it has one, else clamp the window size
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: window_extent.width.clamp(min.width, max.width),
        height: window_extent.height.clamp(min.height, max.height),
    }
}

/// One image above the minimum, at least `MAX_FRAMES_IN_FLIGHT`, within the maximum
///
/// A `max_image_count` of zero means unbounded.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> RenderResult<u32> {
    let wanted = (capabilities.min_image_count + 1).max(MAX_FRAMES_IN_FLIGHT as u32);
    let count = if capabilities.max_image_count > 0 {
        wanted.min(capabilities.max_image_count)
    } else {
        wanted
    };
    if count < MAX_FRAMES_IN_FLIGHT as u32 {
        return Err(RenderError::InitializationFailed(format!(
            "Surface allows at most {} images, need {}",
            capabilities.max_image_count, MAX_FRAMES_IN_FLIGHT
        )));
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    /// sRGB BGRA wins regardless of position
    #[test]
    fn test_surface_format_prefers_srgb() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(
            choose_surface_format(&available).unwrap().format,
            vk::Format::B8G8R8A8_SRGB
        );
    }

    /// Without the preferred format the first listed one is used
    #[test]
    fn test_surface_format_fallback() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(
            choose_surface_format(&available).unwrap().format,
            vk::Format::R8G8B8A8_UNORM
        );
        assert!(choose_surface_format(&[]).is_err());
    }

    /// Mailbox only when both preferred and offered
    #[test]
    fn test_present_mode() {
        let with_mailbox = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        let fifo_only = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];

        assert_eq!(choose_present_mode(&with_mailbox, true), vk::PresentModeKHR::MAILBOX);
        assert_eq!(choose_present_mode(&with_mailbox, false), vk::PresentModeKHR::FIFO);
        assert_eq!(choose_present_mode(&fifo_only, true), vk::PresentModeKHR::FIFO);
    }

    /// Fixed surface extents override the window size
    #[test]
    fn test_extent_fixed_by_surface() {
        let mut caps = capabilities(2, 3);
        caps.current_extent = vk::Extent2D { width: 1280, height: 720 };
        let extent = choose_extent(&caps, vk::Extent2D { width: 800, height: 600 });
        assert_eq!(extent, vk::Extent2D { width: 1280, height: 720 });
    }

    /// Free extents are clamped into the supported range
    #[test]
    fn test_extent_clamped() {
        let caps = capabilities(2, 3);
        let extent = choose_extent(&caps, vk::Extent2D { width: 800, height: 600 });
        assert_eq!(extent, vk::Extent2D { width: 800, height: 600 });

        let extent = choose_extent(&caps, vk::Extent2D { width: 10_000, height: 0 });
        assert_eq!(extent, vk::Extent2D { width: 4096, height: 1 });
    }

    /// Image count is never below the number of frames in flight
    #[test]
    fn test_image_count_covers_frames_in_flight() {
        for (min, max) in [(1, 0), (1, 2), (2, 3), (2, 0), (3, 3), (1, 8)] {
            let count = choose_image_count(&capabilities(min, max)).unwrap();
            assert!(count as usize >= MAX_FRAMES_IN_FLIGHT, "min {} max {}", min, max);
            if max > 0 {
                assert!(count <= max);
            }
        }
        assert_eq!(choose_image_count(&capabilities(2, 0)).unwrap(), 3);
        assert_eq!(choose_image_count(&capabilities(2, 2)).unwrap(), 2);
    }

    /// Surfaces capped below the frames in flight are rejected
    #[test]
    fn test_image_count_too_small() {
        assert!(choose_image_count(&capabilities(1, 1)).is_err());
    }
}
