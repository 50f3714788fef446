//! Frame lifecycle and swap chain recreation
//!
//! The renderer owns the current swap chain and one command buffer per frame
//! in flight, and walks every frame through
//!
//! ```text
//! Idle --begin_frame--> Recording --begin_swap_chain_render_pass--> InRenderPass
//!   ^                       |  ^                                          |
//!   +-------end_frame-------+  +------end_swap_chain_render_pass---------+
//! ```
//!
//! Out-of-date and suboptimal swap chains, and window resizes, are absorbed
//! here by rebuilding the swap chain. `begin_frame` returns `None` for a frame
//! that was skipped that way; callers simply try again on the next loop
//! iteration.

use std::rc::Rc;

use ash::vk;

use crate::render::backend::{
    PresentStatus, PresentSurface, RenderDevice, SwapChainBackend, MAX_FRAMES_IN_FLIGHT,
};
use crate::render::error::{RenderError, RenderResult};

/// Clear color of the swap chain render pass
pub const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.8, 1.0];

/// Depth clear value of the swap chain render pass
pub const CLEAR_DEPTH: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Idle,
    Recording,
    InRenderPass,
}

/// Drives acquisition, recording and presentation of frames
pub struct Renderer<D: RenderDevice> {
    swap_chain: Option<D::SwapChain>,
    command_buffers: Vec<vk::CommandBuffer>,
    current_image_index: u32,
    current_frame_index: usize,
    state: FrameState,
    recreate_pending: bool,
    // Dropped after the swap chain
    device: Rc<D>,
}

impl<D: RenderDevice> Renderer<D> {
    /// Build the first swap chain and the command buffer pool
    ///
    /// Blocks while the surface has a zero extent, same as a later recreation.
    pub fn new<S: PresentSurface>(device: Rc<D>, surface: &mut S) -> RenderResult<Self> {
        let mut renderer = Self {
            swap_chain: None,
            command_buffers: Vec::new(),
            current_image_index: 0,
            current_frame_index: 0,
            state: FrameState::Idle,
            recreate_pending: false,
            device,
        };
        renderer.recreate_swap_chain(surface)?;
        renderer.command_buffers = renderer.device.allocate_command_buffers(MAX_FRAMES_IN_FLIGHT)?;
        log::info!(
            "Renderer ready: {} swap chain images, {} command buffers",
            renderer.image_count(),
            renderer.command_buffers.len()
        );
        Ok(renderer)
    }

    /// Render pass of the current swap chain, for pipeline creation
    pub fn swap_chain_render_pass(&self) -> vk::RenderPass {
        self.swap_chain().render_pass()
    }

    /// Width over height of the current swap chain
    pub fn aspect_ratio(&self) -> f32 {
        self.swap_chain().extent_aspect_ratio()
    }

    /// Extent of the current swap chain
    pub fn swap_chain_extent(&self) -> vk::Extent2D {
        self.swap_chain().extent()
    }

    /// Presentable image count of the current swap chain
    pub fn image_count(&self) -> usize {
        self.swap_chain().image_count()
    }

    /// Size of the command buffer pool
    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }

    /// Whether `begin_frame` succeeded and `end_frame` has not run yet
    pub fn is_frame_in_progress(&self) -> bool {
        self.state != FrameState::Idle
    }

    /// Command buffer of the frame being recorded
    ///
    /// # Panics
    /// If no frame is in progress.
    pub fn current_command_buffer(&self) -> vk::CommandBuffer {
        assert!(
            self.is_frame_in_progress(),
            "Cannot get command buffer when frame not in progress"
        );
        self.command_buffers[self.current_frame_index]
    }

    /// Index of the frame being recorded, in `0..MAX_FRAMES_IN_FLIGHT`
    ///
    /// # Panics
    /// If no frame is in progress.
    pub fn frame_index(&self) -> usize {
        assert!(
            self.is_frame_in_progress(),
            "Cannot get frame index when frame not in progress"
        );
        self.current_frame_index
    }

    /// Acquire an image and start recording
    ///
    /// Returns `None` when the swap chain was out of date; it has been rebuilt
    /// and nothing was recorded.
    ///
    /// # Panics
    /// If a frame is already in progress.
    pub fn begin_frame<S: PresentSurface>(
        &mut self,
        surface: &mut S,
    ) -> RenderResult<Option<vk::CommandBuffer>> {
        assert!(
            !self.is_frame_in_progress(),
            "Can't call begin_frame while already in progress"
        );

        let (image_index, status) = self.swap_chain_mut().acquire_next_image()?;
        match status {
            PresentStatus::OutOfDate => {
                log::debug!("Swap chain out of date on acquire, skipping frame");
                self.recreate_swap_chain(surface)?;
                return Ok(None);
            }
            PresentStatus::Suboptimal => {
                log::debug!("Swap chain suboptimal on acquire, recreating after present");
                self.recreate_pending = true;
            }
            PresentStatus::Success => {}
        }

        let command_buffer = self.command_buffers[self.current_frame_index];
        self.device.begin_command_buffer(command_buffer)?;
        self.current_image_index = image_index;
        self.state = FrameState::Recording;
        Ok(Some(command_buffer))
    }

    /// Finish recording, submit and present
    ///
    /// Rebuilds the swap chain after presenting when it reported out of date or
    /// suboptimal, or when the window was resized. The frame index advances
    /// even if this returns an error.
    ///
    /// # Panics
    /// If no frame is in progress or the render pass is still open.
    pub fn end_frame<S: PresentSurface>(&mut self, surface: &mut S) -> RenderResult<()> {
        assert!(
            self.state == FrameState::Recording,
            "Can't call end_frame while frame is not in progress or render pass is active"
        );
        let command_buffer = self.command_buffers[self.current_frame_index];

        let result = self.submit_frame(surface, command_buffer);

        self.state = FrameState::Idle;
        self.current_frame_index = (self.current_frame_index + 1) % MAX_FRAMES_IN_FLIGHT;
        result
    }

    /// Begin the swap chain render pass with a full-extent viewport and scissor
    ///
    /// # Panics
    /// If no frame is being recorded or `command_buffer` belongs to another frame.
    pub fn begin_swap_chain_render_pass(&mut self, command_buffer: vk::CommandBuffer) {
        assert!(
            self.state == FrameState::Recording,
            "Can't call begin_swap_chain_render_pass if frame is not in progress"
        );
        assert!(
            command_buffer == self.command_buffers[self.current_frame_index],
            "Can't begin render pass on command buffer from a different frame"
        );

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: CLEAR_COLOR },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: CLEAR_DEPTH,
                    stencil: 0,
                },
            },
        ];

        let swap_chain = self.swap_chain();
        let extent = swap_chain.extent();
        self.device.cmd_begin_render_pass(
            command_buffer,
            swap_chain.render_pass(),
            swap_chain.framebuffer(self.current_image_index as usize),
            extent,
            &clear_values,
        );
        self.device.cmd_set_viewport_and_scissor(command_buffer, extent);
        self.state = FrameState::InRenderPass;
    }

    /// End the swap chain render pass
    ///
    /// # Panics
    /// If the render pass is not active or `command_buffer` belongs to another frame.
    pub fn end_swap_chain_render_pass(&mut self, command_buffer: vk::CommandBuffer) {
        assert!(
            self.state == FrameState::InRenderPass,
            "Can't call end_swap_chain_render_pass if render pass is not active"
        );
        assert!(
            command_buffer == self.command_buffers[self.current_frame_index],
            "Can't end render pass on command buffer from a different frame"
        );
        self.device.cmd_end_render_pass(command_buffer);
        self.state = FrameState::Recording;
    }

    fn submit_frame<S: PresentSurface>(
        &mut self,
        surface: &mut S,
        command_buffer: vk::CommandBuffer,
    ) -> RenderResult<()> {
        self.device.end_command_buffer(command_buffer)?;

        let image_index = self.current_image_index;
        let status = self
            .swap_chain_mut()
            .submit_command_buffers(&[command_buffer], image_index)?;

        let resized = surface.was_resized();
        if status.needs_recreate() || resized || self.recreate_pending {
            log::debug!(
                "Recreating after present: status {:?}, resized {}, pending {}",
                status,
                resized,
                self.recreate_pending
            );
            self.recreate_swap_chain(surface)?;
        }
        Ok(())
    }

    fn recreate_swap_chain<S: PresentSurface>(&mut self, surface: &mut S) -> RenderResult<()> {
        let mut extent = surface.extent();
        while extent.width == 0 || extent.height == 0 {
            log::debug!("Window minimized, waiting for a non-zero extent");
            surface.wait_events();
            extent = surface.extent();
        }

        self.device.wait_idle()?;
        surface.reset_resized_flag();
        self.recreate_pending = false;

        let predecessor = self.swap_chain.take();
        let previous = predecessor.as_ref().map(|old| old.formats());
        let swap_chain = self.device.create_swap_chain(extent, predecessor)?;

        let new_formats = swap_chain.formats();
        let new_image_count = swap_chain.image_count();
        let formats_match = previous
            .map_or(true, |formats| swap_chain.compare_swap_formats(&formats));
        self.swap_chain = Some(swap_chain);

        if new_image_count < MAX_FRAMES_IN_FLIGHT {
            return Err(RenderError::InvalidOperation {
                reason: format!(
                    "swap chain has {} images, need at least {}",
                    new_image_count, MAX_FRAMES_IN_FLIGHT
                ),
            });
        }

        match previous {
            None => {
                log::info!(
                    "Created swap chain {}x{} with {} images",
                    extent.width,
                    extent.height,
                    new_image_count
                );
            }
            Some(formats) if !formats_match => {
                log::error!("Swap chain formats changed: {:?} -> {:?}", formats, new_formats);
                return Err(RenderError::SwapFormatMismatch {
                    previous: formats,
                    current: new_formats,
                });
            }
            Some(_) => {
                log::info!("Recreated swap chain {}x{}", extent.width, extent.height);
                if self.command_buffers.len() != new_image_count {
                    self.reallocate_command_buffers(new_image_count)?;
                }
            }
        }
        Ok(())
    }

    fn reallocate_command_buffers(&mut self, count: usize) -> RenderResult<()> {
        log::info!(
            "Resizing command buffer pool {} -> {} to match swap chain images",
            self.command_buffers.len(),
            count
        );
        self.device.free_command_buffers(&self.command_buffers);
        self.command_buffers.clear();
        self.command_buffers = self.device.allocate_command_buffers(count)?;
        Ok(())
    }

    fn swap_chain(&self) -> &D::SwapChain {
        self.swap_chain
            .as_ref()
            .expect("swap chain is only absent while it is being recreated")
    }

    fn swap_chain_mut(&mut self) -> &mut D::SwapChain {
        self.swap_chain
            .as_mut()
            .expect("swap chain is only absent while it is being recreated")
    }
}

impl<D: RenderDevice> Drop for Renderer<D> {
    fn drop(&mut self) {
        if !self.command_buffers.is_empty() {
            self.device.free_command_buffers(&self.command_buffers);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::SwapFormats;
    use crate::render::mock::{MockDevice, MockWindow, MOCK_FORMATS};

    fn setup() -> (Rc<MockDevice>, MockWindow, Renderer<MockDevice>) {
        let device = Rc::new(MockDevice::new());
        let mut window = MockWindow::new(800, 600);
        let renderer = Renderer::new(device.clone(), &mut window).unwrap();
        (device, window, renderer)
    }

    /// Record and present one frame with an empty render pass
    fn run_frame(renderer: &mut Renderer<MockDevice>, window: &mut MockWindow) -> bool {
        match renderer.begin_frame(window).unwrap() {
            Some(command_buffer) => {
                renderer.begin_swap_chain_render_pass(command_buffer);
                renderer.end_swap_chain_render_pass(command_buffer);
                renderer.end_frame(window).unwrap();
                true
            }
            None => false,
        }
    }

    /// Construction builds one swap chain and MAX_FRAMES_IN_FLIGHT command buffers
    #[test]
    fn test_initial_state() {
        let (device, _window, renderer) = setup();
        let state = device.state.borrow();
        assert_eq!(state.swap_chains_created, 1);
        assert_eq!(state.allocations, vec![MAX_FRAMES_IN_FLIGHT]);
        assert_eq!(renderer.command_buffer_count(), MAX_FRAMES_IN_FLIGHT);
        assert!(renderer.image_count() >= MAX_FRAMES_IN_FLIGHT);
        assert!(!renderer.is_frame_in_progress());
        assert_eq!(renderer.swap_chain_extent(), vk::Extent2D { width: 800, height: 600 });
    }

    /// Frame index advances by one per completed frame and wraps
    #[test]
    fn test_frame_index_cycles() {
        let (_device, mut window, mut renderer) = setup();
        let mut seen = Vec::new();
        for _ in 0..5 {
            let command_buffer = renderer.begin_frame(&mut window).unwrap().unwrap();
            seen.push(renderer.frame_index());
            assert_eq!(renderer.current_command_buffer(), command_buffer);
            renderer.end_frame(&mut window).unwrap();
        }
        assert_eq!(seen, vec![0, 1, 0, 1, 0]);
    }

    /// Each frame index maps to its own command buffer
    #[test]
    fn test_command_buffer_per_frame() {
        let (_device, mut window, mut renderer) = setup();
        let first = renderer.begin_frame(&mut window).unwrap().unwrap();
        renderer.end_frame(&mut window).unwrap();
        let second = renderer.begin_frame(&mut window).unwrap().unwrap();
        renderer.end_frame(&mut window).unwrap();
        let third = renderer.begin_frame(&mut window).unwrap().unwrap();
        renderer.end_frame(&mut window).unwrap();

        assert_ne!(first, second);
        assert_eq!(first, third);
    }

    /// Starting a second frame before ending the first is a programming error
    #[test]
    #[should_panic(expected = "already in progress")]
    fn test_double_begin_frame_panics() {
        let (_device, mut window, mut renderer) = setup();
        renderer.begin_frame(&mut window).unwrap();
        let _ = renderer.begin_frame(&mut window);
    }

    /// Ending a frame that never started is a programming error
    #[test]
    #[should_panic(expected = "end_frame")]
    fn test_end_frame_without_begin_panics() {
        let (_device, mut window, mut renderer) = setup();
        let _ = renderer.end_frame(&mut window);
    }

    /// Ending a frame with the render pass still open is rejected
    #[test]
    #[should_panic(expected = "render pass is active")]
    fn test_end_frame_inside_render_pass_panics() {
        let (_device, mut window, mut renderer) = setup();
        let command_buffer = renderer.begin_frame(&mut window).unwrap().unwrap();
        renderer.begin_swap_chain_render_pass(command_buffer);
        let _ = renderer.end_frame(&mut window);
    }

    /// Render pass must be begun on the current frame's command buffer
    #[test]
    #[should_panic(expected = "different frame")]
    fn test_render_pass_on_foreign_command_buffer_panics() {
        let (_device, mut window, mut renderer) = setup();
        let first = renderer.begin_frame(&mut window).unwrap().unwrap();
        renderer.end_frame(&mut window).unwrap();
        renderer.begin_frame(&mut window).unwrap().unwrap();
        renderer.begin_swap_chain_render_pass(first);
    }

    /// Render pass cannot start outside a frame
    #[test]
    #[should_panic(expected = "frame is not in progress")]
    fn test_render_pass_outside_frame_panics() {
        let (_device, _window, mut renderer) = setup();
        renderer.begin_swap_chain_render_pass(vk::CommandBuffer::null());
    }

    /// Frame accessors are only valid inside a frame
    #[test]
    #[should_panic(expected = "not in progress")]
    fn test_frame_index_outside_frame_panics() {
        let (_device, _window, renderer) = setup();
        renderer.frame_index();
    }

    /// Render pass covers the acquired image and the full extent
    #[test]
    fn test_render_pass_targets_acquired_image() {
        let (device, mut window, mut renderer) = setup();
        for _ in 0..4 {
            assert!(run_frame(&mut renderer, &mut window));
        }
        let state = device.state.borrow();
        let images: Vec<usize> = state.passes.iter().map(|pass| pass.image_index).collect();
        assert_eq!(images, vec![0, 1, 2, 0]);
        assert!(state
            .viewports
            .iter()
            .all(|extent| *extent == vk::Extent2D { width: 800, height: 600 }));
        assert_eq!(state.passes_ended, 4);
        let submitted: Vec<u32> = state.submissions.iter().map(|(_, image)| *image).collect();
        assert_eq!(submitted, vec![0, 1, 2, 0]);
    }

    /// Out of date on acquire skips the frame and the next one uses the new chain
    #[test]
    fn test_out_of_date_on_acquire() {
        let (device, mut window, mut renderer) = setup();
        assert!(run_frame(&mut renderer, &mut window));
        device
            .state
            .borrow_mut()
            .acquire_script
            .push_back(Ok(PresentStatus::OutOfDate));

        let skipped = renderer.begin_frame(&mut window).unwrap();
        assert!(skipped.is_none());
        assert!(!renderer.is_frame_in_progress());
        {
            let state = device.state.borrow();
            assert_eq!(state.swap_chains_created, 2);
            assert_eq!(state.predecessor_ids, vec![None, Some(1)]);
            assert_eq!(state.begun.len(), 1);
            assert_eq!(state.passes.len(), 1);
        }

        assert!(run_frame(&mut renderer, &mut window));
        let state = device.state.borrow();
        assert_eq!(state.passes.last().unwrap().swap_chain_id, 2);
        assert_eq!(state.submissions.last().unwrap().0, 2);
    }

    /// A resize reported through an out of date acquire recreates only once
    #[test]
    fn test_resize_with_out_of_date_acquire_recreates_once() {
        let (device, mut window, mut renderer) = setup();
        window.resize(1024, 768);
        device
            .state
            .borrow_mut()
            .acquire_script
            .push_back(Ok(PresentStatus::OutOfDate));

        assert!(renderer.begin_frame(&mut window).unwrap().is_none());
        assert!(!window.was_resized());
        assert_eq!(device.state.borrow().swap_chains_created, 2);

        assert!(run_frame(&mut renderer, &mut window));
        let state = device.state.borrow();
        assert_eq!(state.swap_chains_created, 2);
        assert_eq!(state.wait_idle_calls, 2);
    }

    /// A skipped frame does not advance the frame index
    #[test]
    fn test_skipped_frame_keeps_frame_index() {
        let (device, mut window, mut renderer) = setup();
        device
            .state
            .borrow_mut()
            .acquire_script
            .push_back(Ok(PresentStatus::OutOfDate));
        assert!(renderer.begin_frame(&mut window).unwrap().is_none());
        renderer.begin_frame(&mut window).unwrap().unwrap();
        assert_eq!(renderer.frame_index(), 0);
    }

    /// Suboptimal present still presents, then recreates before the next acquire
    #[test]
    fn test_suboptimal_submit_recreates() {
        let (device, mut window, mut renderer) = setup();
        device
            .state
            .borrow_mut()
            .submit_script
            .push_back(Ok(PresentStatus::Suboptimal));

        assert!(run_frame(&mut renderer, &mut window));
        {
            let state = device.state.borrow();
            assert_eq!(state.submissions, vec![(1, 0)]);
            assert_eq!(state.swap_chains_created, 2);
            assert_eq!(state.acquire_calls, 1);
        }

        assert!(run_frame(&mut renderer, &mut window));
        assert_eq!(device.state.borrow().submissions[1].0, 2);
    }

    /// Out of date on present recreates as well
    #[test]
    fn test_out_of_date_submit_recreates() {
        let (device, mut window, mut renderer) = setup();
        device
            .state
            .borrow_mut()
            .submit_script
            .push_back(Ok(PresentStatus::OutOfDate));
        assert!(run_frame(&mut renderer, &mut window));
        assert_eq!(device.state.borrow().swap_chains_created, 2);
    }

    /// Suboptimal acquire renders the frame and recreates after present
    #[test]
    fn test_suboptimal_acquire_recreates_after_present() {
        let (device, mut window, mut renderer) = setup();
        device
            .state
            .borrow_mut()
            .acquire_script
            .push_back(Ok(PresentStatus::Suboptimal));

        let command_buffer = renderer.begin_frame(&mut window).unwrap();
        assert!(command_buffer.is_some());
        assert_eq!(device.state.borrow().swap_chains_created, 1);
        renderer.end_frame(&mut window).unwrap();
        assert_eq!(device.state.borrow().swap_chains_created, 2);

        assert!(run_frame(&mut renderer, &mut window));
        assert_eq!(device.state.borrow().swap_chains_created, 2);
    }

    /// A resize flagged by the window recreates at the end of the frame
    #[test]
    fn test_window_resize_recreates() {
        let (device, mut window, mut renderer) = setup();
        window.resize(1024, 768);
        assert!(run_frame(&mut renderer, &mut window));

        assert!(!window.was_resized());
        let state = device.state.borrow();
        assert_eq!(state.swap_chains_created, 2);
        assert_eq!(
            state.created_extents.last(),
            Some(&vk::Extent2D { width: 1024, height: 768 })
        );
        drop(state);
        assert_eq!(renderer.swap_chain_extent(), vk::Extent2D { width: 1024, height: 768 });
    }

    /// A minimized window stalls recreation until it has a size again
    #[test]
    fn test_zero_extent_waits_for_events() {
        let (device, mut window, mut renderer) = setup();
        window.resize(0, 0);
        window.pending_extents.push_back(vk::Extent2D { width: 0, height: 0 });
        window.pending_extents.push_back(vk::Extent2D { width: 800, height: 600 });

        assert!(run_frame(&mut renderer, &mut window));

        assert_eq!(window.wait_calls, 2);
        let state = device.state.borrow();
        assert_eq!(state.swap_chains_created, 2);
        assert_eq!(
            state.created_extents,
            vec![
                vk::Extent2D { width: 800, height: 600 },
                vk::Extent2D { width: 800, height: 600 }
            ]
        );
        assert_eq!(state.wait_idle_calls, 2);
    }

    /// Construction with a minimized window waits as well
    #[test]
    fn test_zero_extent_at_startup() {
        let device = Rc::new(MockDevice::new());
        let mut window = MockWindow::new(0, 0);
        window.pending_extents.push_back(vk::Extent2D { width: 640, height: 480 });
        let renderer = Renderer::new(device.clone(), &mut window).unwrap();
        assert_eq!(window.wait_calls, 1);
        assert_eq!(renderer.swap_chain_extent(), vk::Extent2D { width: 640, height: 480 });
    }

    /// Recreating with an identical extent keeps the formats and sizes the pool to the images
    #[test]
    fn test_recreate_keeps_formats_and_pool() {
        let (device, mut window, mut renderer) = setup();
        let old_formats = renderer.swap_chain().formats();
        let old_image_count = renderer.image_count();
        window.resize(800, 600);
        assert!(run_frame(&mut renderer, &mut window));

        assert_eq!(renderer.swap_chain().formats(), old_formats);
        assert!(renderer.swap_chain().compare_swap_formats(&old_formats));
        assert_eq!(renderer.image_count(), old_image_count);
        assert_eq!(renderer.command_buffer_count(), renderer.image_count());
        let state = device.state.borrow();
        assert_eq!(state.swap_chains_created, 2);
        assert_eq!(state.allocations, vec![MAX_FRAMES_IN_FLIGHT, old_image_count]);
        assert_eq!(state.freed.len(), MAX_FRAMES_IN_FLIGHT);
    }

    /// Once the pool matches the image count, further recreations leave it alone
    #[test]
    fn test_pool_follows_image_count_across_recreations() {
        let (device, mut window, mut renderer) = setup();
        window.resize(1024, 768);
        assert!(run_frame(&mut renderer, &mut window));
        assert_eq!(renderer.command_buffer_count(), renderer.image_count());

        device
            .state
            .borrow_mut()
            .submit_script
            .push_back(Ok(PresentStatus::OutOfDate));
        assert!(run_frame(&mut renderer, &mut window));
        assert_eq!(renderer.command_buffer_count(), renderer.image_count());

        let state = device.state.borrow();
        assert_eq!(state.swap_chains_created, 3);
        assert_eq!(state.allocations.len(), 2);
    }

    /// A different image count after recreation resizes the command buffer pool
    #[test]
    fn test_image_count_change_resizes_pool() {
        let (device, mut window, mut renderer) = setup();
        device.state.borrow_mut().next_image_count = 4;
        window.resize(800, 600);
        assert!(run_frame(&mut renderer, &mut window));

        assert_eq!(renderer.image_count(), 4);
        assert_eq!(renderer.command_buffer_count(), 4);
        let state = device.state.borrow();
        assert_eq!(state.allocations, vec![MAX_FRAMES_IN_FLIGHT, 4]);
        assert_eq!(state.freed.len(), MAX_FRAMES_IN_FLIGHT);
        drop(state);

        let mut seen = Vec::new();
        for _ in 0..3 {
            renderer.begin_frame(&mut window).unwrap().unwrap();
            seen.push(renderer.frame_index());
            renderer.end_frame(&mut window).unwrap();
        }
        assert_eq!(seen, vec![1, 0, 1]);
    }

    /// A format change across recreation is fatal
    #[test]
    fn test_format_mismatch_is_fatal() {
        let (device, mut window, mut renderer) = setup();
        device.state.borrow_mut().next_formats = SwapFormats {
            color: vk::Format::R8G8B8A8_UNORM,
            depth: MOCK_FORMATS.depth,
        };
        window.resize(800, 600);

        let command_buffer = renderer.begin_frame(&mut window).unwrap().unwrap();
        renderer.begin_swap_chain_render_pass(command_buffer);
        renderer.end_swap_chain_render_pass(command_buffer);
        let result = renderer.end_frame(&mut window);

        match result {
            Err(RenderError::SwapFormatMismatch { previous, current }) => {
                assert_eq!(previous, MOCK_FORMATS);
                assert_eq!(current.color, vk::Format::R8G8B8A8_UNORM);
            }
            other => panic!("expected format mismatch, got {:?}", other),
        }
        assert!(!renderer.is_frame_in_progress());
    }

    /// Too few swap chain images is rejected
    #[test]
    fn test_too_few_images_rejected() {
        let device = Rc::new(MockDevice::new());
        device.state.borrow_mut().next_image_count = 1;
        let mut window = MockWindow::new(800, 600);
        let result = Renderer::new(device, &mut window);
        assert!(matches!(result, Err(RenderError::InvalidOperation { .. })));
    }

    /// Hard acquire failures propagate and leave the renderer idle
    #[test]
    fn test_acquire_failure_propagates() {
        let (device, mut window, mut renderer) = setup();
        device
            .state
            .borrow_mut()
            .acquire_script
            .push_back(Err(vk::Result::ERROR_DEVICE_LOST));

        let result = renderer.begin_frame(&mut window);
        assert!(matches!(result, Err(RenderError::DeviceLost)));
        assert!(!renderer.is_frame_in_progress());
    }

    /// Hard present failures still end the frame
    #[test]
    fn test_submit_failure_ends_frame() {
        let (device, mut window, mut renderer) = setup();
        device
            .state
            .borrow_mut()
            .submit_script
            .push_back(Err(vk::Result::ERROR_SURFACE_LOST_KHR));

        renderer.begin_frame(&mut window).unwrap().unwrap();
        let result = renderer.end_frame(&mut window);
        assert!(matches!(result, Err(RenderError::Api(vk::Result::ERROR_SURFACE_LOST_KHR))));
        assert!(!renderer.is_frame_in_progress());

        renderer.begin_frame(&mut window).unwrap().unwrap();
        assert_eq!(renderer.frame_index(), 1);
    }

    /// Aspect ratio follows the swap chain extent
    #[test]
    fn test_aspect_ratio() {
        let (_device, mut window, mut renderer) = setup();
        approx::assert_relative_eq!(renderer.aspect_ratio(), 800.0 / 600.0);
        window.resize(1000, 500);
        assert!(run_frame(&mut renderer, &mut window));
        approx::assert_relative_eq!(renderer.aspect_ratio(), 2.0);
    }

    /// Dropping the renderer returns its command buffers
    #[test]
    fn test_drop_frees_command_buffers() {
        let (device, _window, renderer) = setup();
        drop(renderer);
        assert_eq!(device.state.borrow().freed.len(), MAX_FRAMES_IN_FLIGHT);
    }
}
