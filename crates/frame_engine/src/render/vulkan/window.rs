//! Window management using GLFW
//!
//! Provides window creation, resize tracking and Vulkan surface creation.

use ash::vk;
use thiserror::Error;

use crate::config::WindowConfig;
use crate::render::backend::PresentSurface;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialised
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// GLFW refused to create the window
    #[error("Window creation failed")]
    CreationFailed,

    /// The platform has no Vulkan loader
    #[error("Vulkan is not supported by this GLFW build or platform")]
    VulkanUnsupported,

    /// Any other GLFW failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result alias for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    framebuffer_resized: bool,
}

impl Window {
    /// Create a window for Vulkan rendering (no client API)
    pub fn new(config: &WindowConfig) -> WindowResult<Self> {
        let mut glfw =
            glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::VulkanUnsupported);
        }

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(config.resizable));

        let (mut window, events) = glfw
            .create_window(
                config.width,
                config.height,
                &config.title,
                glfw::WindowMode::Windowed,
            )
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!(
            "Created window '{}' ({}x{})",
            config.title,
            config.width,
            config.height
        );

        Ok(Self {
            glfw,
            window,
            events,
            framebuffer_resized: false,
        })
    }

    /// Whether the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request or cancel closing
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Process pending events without blocking
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        self.drain_events();
    }

    /// Whether `key` is currently held down
    pub fn is_key_pressed(&self, key: glfw::Key) -> bool {
        self.window.get_key(key) == glfw::Action::Press
    }

    /// Get required Vulkan instance extensions from GLFW
    pub fn get_required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Failed to get required extensions".to_string()))
    }

    /// Create Vulkan surface using GLFW's built-in functionality
    pub fn create_vulkan_surface(&mut self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!(
                "Failed to create Vulkan surface: {:?}",
                result
            )))
        }
    }

    fn drain_events(&mut self) {
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    log::trace!("Framebuffer resized to {}x{}", width, height);
                    self.framebuffer_resized = true;
                }
                glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    self.window.set_should_close(true);
                }
                _ => {}
            }
        }
    }
}

impl PresentSurface for Window {
    fn extent(&self) -> vk::Extent2D {
        let (width, height) = self.window.get_framebuffer_size();
        vk::Extent2D {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
        }
    }

    fn was_resized(&self) -> bool {
        self.framebuffer_resized
    }

    fn reset_resized_flag(&mut self) {
        self.framebuffer_resized = false;
    }

    fn wait_events(&mut self) {
        self.glfw.wait_events();
        self.drain_events();
    }
}
