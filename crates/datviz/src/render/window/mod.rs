//! Window management
//!
//! - **`backend`**: the [`Platform`] / [`WindowBackend`] traits and event types
//! - **`handle`**: the [`Window`] used by the viewer
//!
//! Concrete backends live in `crate::backends`.

pub mod backend;
pub mod handle;

pub use backend::{
    Key, MouseButton, Platform, WindowBackend, WindowError, WindowEvent, WindowResult,
};
pub use handle::Window;
