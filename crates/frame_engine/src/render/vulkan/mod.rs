//! Vulkan backend
//!
//! [`VulkanContext`] implements [`RenderDevice`](crate::render::backend::RenderDevice)
//! and [`VulkanSwapChain`] implements
//! [`SwapChainBackend`](crate::render::backend::SwapChainBackend). The rest are
//! RAII wrappers used by the render systems.

pub mod buffer;
pub mod context;
pub mod descriptor;
pub mod model;
pub mod pipeline;
pub mod swapchain;
pub mod sync;
pub mod targets;
pub mod uniforms;
pub mod window;

pub use context::VulkanContext;
pub use model::{Model, ModelData, Vertex};
pub use swapchain::VulkanSwapChain;
pub use uniforms::GlobalUniforms;
pub use window::{Window, WindowError};
