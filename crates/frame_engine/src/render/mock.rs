//! Scripted backend for exercising the frame state machine without a GPU
//!
//! Device, swap chains and window share one [`MockState`] so a test can queue
//! acquire/present outcomes up front and inspect what the renderer did
//! afterwards.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ash::vk::{self, Handle};

use crate::render::backend::{
    PresentStatus, PresentSurface, RenderDevice, SwapChainBackend, SwapFormats,
};
use crate::render::error::RenderResult;

/// Formats every mock swap chain uses unless a test overrides them
pub const MOCK_FORMATS: SwapFormats = SwapFormats {
    color: vk::Format::B8G8R8A8_SRGB,
    depth: vk::Format::D32_SFLOAT,
};

/// One recorded render pass begin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedPass {
    pub command_buffer: vk::CommandBuffer,
    pub swap_chain_id: usize,
    pub image_index: usize,
    pub extent: vk::Extent2D,
}

/// Shared script and call log
pub struct MockState {
    /// Outcomes returned by successive acquires; empty means success
    pub acquire_script: VecDeque<Result<PresentStatus, vk::Result>>,
    /// Outcomes returned by successive submits; empty means success
    pub submit_script: VecDeque<Result<PresentStatus, vk::Result>>,
    /// Image count given to the next swap chain
    pub next_image_count: usize,
    /// Formats given to the next swap chain
    pub next_formats: SwapFormats,

    pub swap_chains_created: usize,
    pub created_extents: Vec<vk::Extent2D>,
    pub predecessor_ids: Vec<Option<usize>>,
    pub wait_idle_calls: usize,
    pub acquire_calls: usize,
    /// (swap chain id, image index) per submit
    pub submissions: Vec<(usize, u32)>,
    pub allocations: Vec<usize>,
    pub freed: Vec<vk::CommandBuffer>,
    pub begun: Vec<vk::CommandBuffer>,
    pub ended: Vec<vk::CommandBuffer>,
    pub passes: Vec<RecordedPass>,
    pub viewports: Vec<vk::Extent2D>,
    pub passes_ended: usize,
    next_handle: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            acquire_script: VecDeque::new(),
            submit_script: VecDeque::new(),
            next_image_count: 3,
            next_formats: MOCK_FORMATS,
            swap_chains_created: 0,
            created_extents: Vec::new(),
            predecessor_ids: Vec::new(),
            wait_idle_calls: 0,
            acquire_calls: 0,
            submissions: Vec::new(),
            allocations: Vec::new(),
            freed: Vec::new(),
            begun: Vec::new(),
            ended: Vec::new(),
            passes: Vec::new(),
            viewports: Vec::new(),
            passes_ended: 0,
            next_handle: 1,
        }
    }
}

impl MockState {
    fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

/// Device half of the mock backend
pub struct MockDevice {
    pub state: Rc<RefCell<MockState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MockState::default())),
        }
    }
}

/// Swap chain produced by [`MockDevice`]
pub struct MockSwapChain {
    pub id: usize,
    extent: vk::Extent2D,
    image_count: usize,
    formats: SwapFormats,
    next_image: u32,
    render_pass: vk::RenderPass,
    state: Rc<RefCell<MockState>>,
}

impl SwapChainBackend for MockSwapChain {
    fn acquire_next_image(&mut self) -> RenderResult<(u32, PresentStatus)> {
        let scripted = {
            let mut state = self.state.borrow_mut();
            state.acquire_calls += 1;
            state.acquire_script.pop_front()
        };
        let status = scripted.unwrap_or(Ok(PresentStatus::Success))?;
        let image_index = self.next_image;
        if status != PresentStatus::OutOfDate {
            self.next_image = (self.next_image + 1) % self.image_count as u32;
        }
        Ok((image_index, status))
    }

    fn submit_command_buffers(
        &mut self,
        _buffers: &[vk::CommandBuffer],
        image_index: u32,
    ) -> RenderResult<PresentStatus> {
        let mut state = self.state.borrow_mut();
        state.submissions.push((self.id, image_index));
        let status = state.submit_script.pop_front().unwrap_or(Ok(PresentStatus::Success))?;
        Ok(status)
    }

    fn formats(&self) -> SwapFormats {
        self.formats
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn image_count(&self) -> usize {
        self.image_count
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    fn framebuffer(&self, image_index: usize) -> vk::Framebuffer {
        vk::Framebuffer::from_raw((self.id * 100 + image_index) as u64)
    }
}

impl RenderDevice for MockDevice {
    type SwapChain = MockSwapChain;

    fn wait_idle(&self) -> RenderResult<()> {
        self.state.borrow_mut().wait_idle_calls += 1;
        Ok(())
    }

    fn create_swap_chain(
        &self,
        extent: vk::Extent2D,
        predecessor: Option<MockSwapChain>,
    ) -> RenderResult<MockSwapChain> {
        let mut state = self.state.borrow_mut();
        state.swap_chains_created += 1;
        state.created_extents.push(extent);
        state.predecessor_ids.push(predecessor.as_ref().map(|old| old.id));
        let render_pass = vk::RenderPass::from_raw(state.next_handle());

        Ok(MockSwapChain {
            id: state.swap_chains_created,
            extent,
            image_count: state.next_image_count,
            formats: state.next_formats,
            next_image: 0,
            render_pass,
            state: self.state.clone(),
        })
    }

    fn allocate_command_buffers(&self, count: usize) -> RenderResult<Vec<vk::CommandBuffer>> {
        let mut state = self.state.borrow_mut();
        state.allocations.push(count);
        Ok((0..count)
            .map(|_| vk::CommandBuffer::from_raw(state.next_handle()))
            .collect())
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        self.state.borrow_mut().freed.extend_from_slice(buffers);
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        self.state.borrow_mut().begun.push(command_buffer);
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        self.state.borrow_mut().ended.push(command_buffer);
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        _render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        _clear_values: &[vk::ClearValue],
    ) {
        let raw = framebuffer.as_raw() as usize;
        self.state.borrow_mut().passes.push(RecordedPass {
            command_buffer,
            swap_chain_id: raw / 100,
            image_index: raw % 100,
            extent,
        });
    }

    fn cmd_set_viewport_and_scissor(&self, _command_buffer: vk::CommandBuffer, extent: vk::Extent2D) {
        self.state.borrow_mut().viewports.push(extent);
    }

    fn cmd_end_render_pass(&self, _command_buffer: vk::CommandBuffer) {
        self.state.borrow_mut().passes_ended += 1;
    }
}

/// Window whose size changes only when the test says so
pub struct MockWindow {
    extent: vk::Extent2D,
    resized: bool,
    /// Extents adopted one per `wait_events` call
    pub pending_extents: VecDeque<vk::Extent2D>,
    pub wait_calls: usize,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: vk::Extent2D { width, height },
            resized: false,
            pending_extents: VecDeque::new(),
            wait_calls: 0,
        }
    }

    /// Simulate a framebuffer resize callback
    pub fn resize(&mut self, width: u32, height: u32) {
        self.extent = vk::Extent2D { width, height };
        self.resized = true;
    }
}

impl PresentSurface for MockWindow {
    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }

    fn wait_events(&mut self) {
        self.wait_calls += 1;
        if let Some(extent) = self.pending_extents.pop_front() {
            self.extent = extent;
            self.resized = true;
        }
    }
}
