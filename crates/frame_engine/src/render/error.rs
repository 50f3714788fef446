//! Renderer errors
//!
//! Only fatal conditions are errors. An out-of-date or suboptimal swap chain
//! and a resized window are reported as [`PresentStatus`] values and handled by
//! recreating the swap chain, so they never reach the caller.
//!
//! [`PresentStatus`]: crate::render::backend::PresentStatus

use ash::vk;
use thiserror::Error;

use crate::render::backend::SwapFormats;
use crate::render::vulkan::window::WindowError;

/// Errors raised by the render core and the Vulkan backend
#[derive(Error, Debug)]
pub enum RenderError {
    /// A Vulkan call failed
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// A bounded wait expired
    #[error("Timed out waiting for {operation}")]
    Timeout {
        /// What was being waited on
        operation: &'static str,
    },

    /// The logical device was lost
    #[error("Device lost")]
    DeviceLost,

    /// A recreated swap chain picked different formats than its predecessor
    #[error("Swap chain image or depth format changed: {previous:?} -> {current:?}")]
    SwapFormatMismatch {
        /// Formats of the replaced swap chain
        previous: SwapFormats,
        /// Formats of the new swap chain
        current: SwapFormats,
    },

    /// Instance, device or surface setup failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// A request that cannot be honoured in the current state
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of the problem
        reason: String,
    },

    /// No memory type satisfies the requested properties
    #[error("No suitable memory type")]
    NoSuitableMemoryType,

    /// Window system failure
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Reading shaders or other resources failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<vk::Result> for RenderError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            vk::Result::TIMEOUT | vk::Result::NOT_READY => Self::Timeout {
                operation: "GPU work",
            },
            other => Self::Api(other),
        }
    }
}

/// Result alias for render operations
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Device loss and timeouts get their own variants
    #[test]
    fn test_vk_result_mapping() {
        assert!(matches!(RenderError::from(vk::Result::ERROR_DEVICE_LOST), RenderError::DeviceLost));
        assert!(matches!(RenderError::from(vk::Result::TIMEOUT), RenderError::Timeout { .. }));
        assert!(matches!(
            RenderError::from(vk::Result::ERROR_OUT_OF_HOST_MEMORY),
            RenderError::Api(vk::Result::ERROR_OUT_OF_HOST_MEMORY)
        ));
    }

    /// Format mismatch messages name both format pairs
    #[test]
    fn test_format_mismatch_message() {
        let error = RenderError::SwapFormatMismatch {
            previous: SwapFormats {
                color: vk::Format::B8G8R8A8_SRGB,
                depth: vk::Format::D32_SFLOAT,
            },
            current: SwapFormats {
                color: vk::Format::R8G8B8A8_UNORM,
                depth: vk::Format::D32_SFLOAT,
            },
        };
        let message = error.to_string();
        assert!(message.contains("B8G8R8A8_SRGB"));
        assert!(message.contains("R8G8B8A8_UNORM"));
    }
}
