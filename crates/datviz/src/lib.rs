//! # datviz
//!
//! A small point-cloud viewer. It opens a window with an OpenGL ES 3.0
//! context and draws an array of colored points as `GL_POINTS` each frame,
//! under a model/view/projection transform chosen by the caller.
//!
//! ## Features
//!
//! - **Points**: 16-byte [`Vertex`]es (position + RGBA8), re-uploaded per frame
//! - **Camera**: explicit transforms, `look_at`/perspective helpers and
//!   optional mouse orbit controls
//! - **C ABI**: every operation is exported as `datviz_*` (see `include/datviz.h`)
//! - **Headless backend**: the full viewer runs without a display in tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use datviz::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     datviz::global_init()?;
//!
//!     let mut viewer = Viewer::new(ViewerConfig::default());
//!     viewer.set_perspective(1.0, 0.1, 100.0)?;
//!     viewer.look_at(&Vec3::new(0.0, 0.0, 3.0), &Vec3::zeros(), &Vec3::y());
//!
//!     let points = vec![Vertex::new([0.0, 0.0, 0.0], [255, 255, 255, 255])];
//!     while !viewer.should_close() {
//!         viewer.begin_frame()?;
//!         viewer.render_points(&points)?;
//!         viewer.end_frame()?;
//!         viewer.poll_input();
//!     }
//!
//!     viewer.destroy();
//!     datviz::global_cleanup();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::missing_panics_doc)]

pub mod backends;
pub mod config;
pub mod ffi;
pub mod foundation;
pub mod render;

mod global;
mod viewer;

pub use global::{global_cleanup, global_init};
pub use render::vertex::Vertex;
pub use viewer::{Viewer, ViewerError, ViewerResult};

/// Common imports for viewer users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, LoggingConfig, ViewerConfig, WindowConfig},
        foundation::math::{look_at, perspective, Mat4, Vec3},
        global_cleanup, global_init,
        render::{
            vertex::Vertex,
            window::{WindowError, WindowEvent},
            CameraController,
        },
        Viewer, ViewerError, ViewerResult,
    };
}
