//! Configuration system
//!
//! Application settings are plain serde structs grouped by subsystem. Files
//! are read as TOML or RON depending on their extension.

use std::path::Path;

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match extension(path) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Load configuration, falling back to defaults when the file is missing
    fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match extension(path) {
            Some("toml") => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Core engine behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Upper bound on the frame time handed to the simulation, in seconds
    pub max_frame_time: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            max_frame_time: crate::foundation::time::MAX_FRAME_TIME,
        }
    }
}

impl EngineConfig {
    /// Validate the engine section
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_frame_time > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_frame_time must be positive, got {}",
                self.max_frame_time
            )));
        }
        Ok(())
    }
}

/// Window creation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title bar text
    pub title: String,
    /// Initial client width in screen coordinates
    pub width: u32,
    /// Initial client height in screen coordinates
    pub height: u32,
    /// Whether the user may resize the window
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Engine".to_string(),
            width: 800,
            height: 600,
            resizable: true,
        }
    }
}

impl WindowConfig {
    /// Create a window configuration with the given title and size
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            ..Default::default()
        }
    }

    /// Validate the window section
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Vulkan renderer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Whether to enable the Khronos validation layer
    pub enable_validation: bool,
    /// Use mailbox presentation when the surface offers it
    pub prefer_mailbox: bool,
    /// Upper bound on any single fence wait, in milliseconds
    pub fence_timeout_ms: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Vulkan Engine".to_string(),
            enable_validation: cfg!(debug_assertions),
            prefer_mailbox: true,
            fence_timeout_ms: 1000,
        }
    }
}

impl RendererConfig {
    /// Create a renderer configuration for the named application
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = enabled;
        self
    }

    /// Fence timeout in nanoseconds, as Vulkan expects
    pub fn fence_timeout_ns(&self) -> u64 {
        self.fence_timeout_ms.saturating_mul(1_000_000)
    }

    /// Validate the renderer section
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fence_timeout_ms == 0 {
            return Err(ConfigError::Invalid("fence_timeout_ms must be non-zero".to_string()));
        }
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("application_name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Engine behaviour
    pub engine: EngineConfig,
    /// Window settings
    pub window: WindowConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
}

impl Config for ApplicationConfig {}

impl ApplicationConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.window.validate()?;
        self.renderer.validate()
    }
}
