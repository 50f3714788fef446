//! # Frame Engine
//!
//! A small Vulkan renderer organised around one job: getting a frame from
//! acquisition to presentation and surviving everything the window system
//! throws at the swap chain in between (resizes, minimization, surfaces that
//! go out of date).
//!
//! ## Layout
//!
//! - [`foundation`]: math aliases, frame clock, logging bootstrap
//! - [`config`]: TOML/RON backed application configuration
//! - [`render`]: the frame state machine, the backend seams it drives, scene
//!   data, render systems and the Vulkan backend
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use frame_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::default();
//!     let mut window = Window::new(&config.window)?;
//!     let context = Rc::new(VulkanContext::new(&mut window, &config.renderer)?);
//!     let mut renderer = Renderer::new(context.clone(), &mut window)?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         if let Some(command_buffer) = renderer.begin_frame(&mut window)? {
//!             renderer.begin_swap_chain_render_pass(command_buffer);
//!             renderer.end_swap_chain_render_pass(command_buffer);
//!             renderer.end_frame(&mut window)?;
//!         }
//!     }
//!     context.wait_idle()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{ApplicationConfig, Config, ConfigError, EngineConfig, RendererConfig, WindowConfig},
        foundation::{
            math::{Mat4, TransformComponent, Vec3, Vec4},
            time::FrameClock,
        },
        render::{
            backend::{PresentStatus, PresentSurface, RenderDevice, SwapChainBackend, MAX_FRAMES_IN_FLIGHT},
            camera::Camera,
            error::{RenderError, RenderResult},
            frame::{FrameInfo, GlobalUbo},
            game_object::{GameObject, GameObjectRegistry, IdAllocator},
            renderer::Renderer,
            systems::{DrawableSystem, PointLightSystem, SimpleRenderSystem, SystemSchedule},
            vulkan::{GlobalUniforms, Model, ModelData, VulkanContext, Window},
        },
    };
}
