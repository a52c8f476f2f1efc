//! # Configuration System
//!
//! Viewer configuration: window creation parameters, the initial background
//! color, camera control defaults and logging. Every structure can be loaded
//! from TOML or RON through the [`Config`] trait, and every field has a
//! default so partial files are accepted.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        match extension(path) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
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

/// # Window Configuration
///
/// Parameters for the native window created on first use. The window is
/// requested maximized, so `width`/`height` only matter when the window
/// manager ignores that hint or `maximized` is off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
    /// Whether to request a maximized window
    pub maximized: bool,
    /// MSAA sample count; `None` leaves the platform default
    pub samples: Option<u32>,
    /// Whether the window is shown on creation
    pub visible: bool,
}

impl WindowConfig {
    /// Set the initial title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the initial size and disable the maximized hint
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self.maximized = false;
        self
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            width: 640,
            height: 480,
            maximized: true,
            samples: Some(4),
            visible: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter in `env_logger` syntax, e.g. `"info"` or `"datviz=debug"`
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// # Viewer Configuration
///
/// Top-level configuration passed to [`Viewer::new`](crate::Viewer::new).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Native window parameters
    pub window: WindowConfig,
    /// Initial background color (RGBA, each channel in `[0, 1]`)
    pub background: [f32; 4],
    /// Whether interactive camera controls start enabled
    pub camera_controls: bool,
    /// Logging setup used by applications calling `foundation::logging::init`
    pub logging: LoggingConfig,
}

impl ViewerConfig {
    /// Set the window configuration
    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    /// Set the initial background color
    pub fn with_background(mut self, background: [f32; 4]) -> Self {
        self.background = background;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }

        if self.background.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(ConfigError::Invalid(format!(
                "background channels must lie in [0, 1], got {:?}",
                self.background
            )));
        }

        Ok(())
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            background: [0.0, 0.0, 0.0, 1.0],
            camera_controls: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config for ViewerConfig {}
