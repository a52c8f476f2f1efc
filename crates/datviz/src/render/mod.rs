//! Rendering
//!
//! Everything between a slice of [`Vertex`]es and pixels on screen: the
//! window abstraction, the graphics device seam, GPU resource wrappers and
//! the point pipeline built from them.

pub mod camera;
pub mod device;
pub mod point_pipeline;
pub mod shader;
pub mod vertex;
pub mod vertex_array;
pub mod window;

pub use camera::CameraController;
pub use device::{DeviceError, DeviceResult, GraphicsDevice};
pub use point_pipeline::PointPipeline;
pub use shader::{ShaderError, ShaderResult};
pub use vertex::{PointVertexLayout, Vertex, VERTEX_SIZE};
pub use window::{Platform, Window, WindowBackend, WindowError, WindowEvent, WindowResult};
