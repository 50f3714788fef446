//! Rendering
//!
//! [`renderer::Renderer`] runs the frame protocol against the traits in
//! [`backend`]. Scene data ([`camera`], [`game_object`], [`frame`]) and the
//! [`systems`] that draw it sit on top; [`vulkan`] provides the real backend.

pub mod backend;
pub mod camera;
pub mod error;
pub mod frame;
pub mod game_object;
#[cfg(test)]
pub(crate) mod mock;
pub mod renderer;
pub mod systems;
pub mod vulkan;
