//! Render systems
//!
//! A system records draw commands for one kind of content into the frame's
//! command buffer. Systems run inside the swap chain render pass and never
//! touch the frame lifecycle themselves.

pub mod point_light;
pub mod simple_render;

pub use point_light::PointLightSystem;
pub use simple_render::SimpleRenderSystem;

use crate::render::error::RenderResult;
use crate::render::frame::{FrameInfo, GlobalUbo};

/// Content drawn every frame
pub trait DrawableSystem {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Per-frame simulation step, before the global uniforms are uploaded
    fn update(&mut self, _frame: &mut FrameInfo<'_>, _ubo: &mut GlobalUbo) {}

    /// Record draw commands; the render pass is active and the viewport set
    fn render(&mut self, frame: &FrameInfo<'_>) -> RenderResult<()>;
}

/// Systems in registration order
#[derive(Default)]
pub struct SystemSchedule {
    systems: Vec<Box<dyn DrawableSystem>>,
}

impl SystemSchedule {
    /// Create an empty schedule
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a system; it runs after every system added before it
    pub fn add<S: DrawableSystem + 'static>(&mut self, system: S) {
        log::debug!("Registered render system '{}'", system.name());
        self.systems.push(Box::new(system));
    }

    /// Run every `update` in order
    pub fn update_all(&mut self, frame: &mut FrameInfo<'_>, ubo: &mut GlobalUbo) {
        for system in &mut self.systems {
            system.update(frame, ubo);
        }
    }

    /// Run every `render` in order, stopping at the first error
    pub fn render_all(&mut self, frame: &FrameInfo<'_>) -> RenderResult<()> {
        for system in &mut self.systems {
            if let Err(e) = system.render(frame) {
                log::error!("Render system '{}' failed: {}", system.name(), e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Names in execution order
    pub fn names(&self) -> Vec<&str> {
        self.systems.iter().map(|system| system.name()).collect()
    }

    /// Number of systems
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Whether no system is registered
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}
