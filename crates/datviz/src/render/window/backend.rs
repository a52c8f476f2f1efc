//! Backend-agnostic window traits
//!
//! A [`Platform`] is the windowing library (GLFW in production, the
//! headless platform in tests). It hands out [`WindowBackend`]s, each of
//! which owns one native window and its GL context.

use thiserror::Error;

use crate::config::WindowConfig;
use crate::render::device::GraphicsDevice;

/// Window management errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// The windowing library was used before `global_init`
    #[error("windowing library is not initialized; call global_init first")]
    NotInitialized,

    /// The windowing library could not be initialized
    #[error("windowing library initialization failed: {0}")]
    InitializationFailed(String),

    /// The window or its context could not be created
    #[error("window creation failed: {0}")]
    CreationFailed(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Keys the viewer reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Closes the window
    Escape,
    /// Any other key
    Other,
}

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Primary button
    Left,
    /// Secondary button
    Right,
    /// Wheel button
    Middle,
    /// Any further button
    Other,
}

/// Input and window events, translated from the native library
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowEvent {
    /// The user asked to close the window
    CloseRequested,
    /// A key was pressed
    KeyPressed(Key),
    /// The cursor moved, in window coordinates
    CursorMoved {
        /// Horizontal position
        x: f64,
        /// Vertical position, top-down
        y: f64,
    },
    /// A mouse button changed state
    MouseButton {
        /// Which button
        button: MouseButton,
        /// `true` on press, `false` on release
        pressed: bool,
    },
    /// Vertical scroll, positive away from the user
    Scrolled {
        /// Scroll steps
        delta: f64,
    },
    /// The framebuffer was resized
    FramebufferResized {
        /// Width in pixels
        width: i32,
        /// Height in pixels
        height: i32,
    },
}

/// The windowing library
pub trait Platform {
    /// Create a native window with a current-able GL ES 3.0 context
    fn create_window(&mut self, config: &WindowConfig) -> WindowResult<Box<dyn WindowBackend>>;

    /// Process pending events of all windows
    fn poll_events(&mut self);
}

/// One native window and its GL context
pub trait WindowBackend {
    /// Whether the native close flag is set
    fn should_close(&self) -> bool;

    /// Set or clear the native close flag
    fn set_should_close(&mut self, should_close: bool);

    /// Take the events received since the last call
    fn drain_events(&mut self) -> Vec<WindowEvent>;

    /// Client area size in screen coordinates
    fn size(&self) -> (i32, i32);

    /// Drawable size in pixels
    fn framebuffer_size(&self) -> (i32, i32);

    /// Replace the title bar text
    fn set_title(&mut self, title: &str);

    /// Make this window's context current on the calling thread
    fn make_current(&mut self);

    /// Present the back buffer
    fn swap_buffers(&mut self);

    /// Load the GL entry points for this window's context.
    ///
    /// The context must be current.
    fn create_device(&mut self) -> WindowResult<Box<dyn GraphicsDevice>>;
}
