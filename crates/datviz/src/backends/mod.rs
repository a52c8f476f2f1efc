//! Concrete platform and device backends
//!
//! - **`glfw`**: native windows with an OpenGL ES 3.0 context
//! - **`gles`**: [`GraphicsDevice`](crate::render::GraphicsDevice) over `glow`
//! - **`headless`**: in-memory platform and software device for tests

pub mod gles;
pub mod glfw;
pub mod headless;

pub use self::gles::GlesDevice;
pub use self::glfw::GlfwPlatform;
pub use self::headless::{HeadlessDevice, HeadlessPlatform, HeadlessProbe};
