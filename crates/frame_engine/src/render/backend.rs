//! Seams between the frame state machine and the graphics backend
//!
//! [`Renderer`](crate::render::renderer::Renderer) only talks to the window,
//! device and swap chain through these traits. The Vulkan backend implements
//! them for real hardware; tests drive the same state machine with a scripted
//! backend.

use ash::vk;

use crate::render::error::RenderResult;

/// Number of frames the CPU may record ahead of the GPU
///
/// Also the number of per-frame synchronization sets owned by a swap chain and
/// the size of the renderer's initial command buffer pool.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Outcome of acquiring or presenting a swap chain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    /// The swap chain matches the surface
    Success,
    /// The image was acquired or presented but the surface has drifted
    Suboptimal,
    /// The swap chain can no longer present to the surface
    OutOfDate,
}

impl PresentStatus {
    /// Whether the swap chain should be rebuilt
    pub fn needs_recreate(self) -> bool {
        !matches!(self, Self::Success)
    }
}

/// Color and depth attachment formats of a swap chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapFormats {
    /// Presentable image format
    pub color: vk::Format,
    /// Depth attachment format
    pub depth: vk::Format,
}

/// Window surface as seen by the renderer
pub trait PresentSurface {
    /// Current drawable size in pixels
    fn extent(&self) -> vk::Extent2D;

    /// Whether the framebuffer was resized since the flag was last reset
    fn was_resized(&self) -> bool;

    /// Clear the resize flag
    fn reset_resized_flag(&mut self);

    /// Block until the window system delivers at least one event
    fn wait_events(&mut self);
}

/// A presentable image chain with its render targets and frame pacing
pub trait SwapChainBackend {
    /// Wait for the current frame slot and acquire the next image
    ///
    /// The returned index is only meaningful when the status is not
    /// [`PresentStatus::OutOfDate`].
    fn acquire_next_image(&mut self) -> RenderResult<(u32, PresentStatus)>;

    /// Submit recorded work for `image_index` and queue it for presentation
    fn submit_command_buffers(
        &mut self,
        buffers: &[vk::CommandBuffer],
        image_index: u32,
    ) -> RenderResult<PresentStatus>;

    /// Attachment formats chosen at creation
    fn formats(&self) -> SwapFormats;

    /// Whether this chain renders with the same formats as `previous`
    fn compare_swap_formats(&self, previous: &SwapFormats) -> bool {
        self.formats() == *previous
    }

    /// Image size
    fn extent(&self) -> vk::Extent2D;

    /// Number of presentable images
    fn image_count(&self) -> usize;

    /// Render pass compatible with every framebuffer of this chain
    fn render_pass(&self) -> vk::RenderPass;

    /// Framebuffer wrapping image `image_index`
    fn framebuffer(&self, image_index: usize) -> vk::Framebuffer;

    /// Width over height
    fn extent_aspect_ratio(&self) -> f32 {
        let extent = self.extent();
        extent.width as f32 / extent.height as f32
    }
}

/// Logical device operations needed by the frame lifecycle
pub trait RenderDevice {
    /// Swap chain type produced by this device
    type SwapChain: SwapChainBackend;

    /// Block until all queues are idle
    fn wait_idle(&self) -> RenderResult<()>;

    /// Build a swap chain for `extent`
    ///
    /// When `predecessor` is given it is consumed: its synchronization objects
    /// move into the new chain and the rest of its resources are released.
    fn create_swap_chain(
        &self,
        extent: vk::Extent2D,
        predecessor: Option<Self::SwapChain>,
    ) -> RenderResult<Self::SwapChain>;

    /// Allocate `count` primary command buffers
    fn allocate_command_buffers(&self, count: usize) -> RenderResult<Vec<vk::CommandBuffer>>;

    /// Return command buffers to the pool
    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]);

    /// Start recording
    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()>;

    /// Finish recording
    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()>;

    /// Record the start of `render_pass` on `framebuffer`
    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    );

    /// Record a full-extent dynamic viewport and scissor
    fn cmd_set_viewport_and_scissor(&self, command_buffer: vk::CommandBuffer, extent: vk::Extent2D);

    /// Record the end of the active render pass
    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer);
}

/// Viewport covering `extent` with the full 0..1 depth range
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Scissor rectangle covering `extent`
pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}
