//! Graphics device abstraction
//!
//! [`GraphicsDevice`] is the narrow slice of OpenGL ES the viewer uses. The
//! real implementation lives in `backends::gles`; `backends::headless`
//! provides a software device for tests. Every method assumes the owning
//! window's context is current.

use std::fmt;
use std::num::NonZeroU32;

use thiserror::Error;

use crate::render::vertex::VertexAttribute;

/// Handle to a GPU buffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub NonZeroU32);

/// Handle to a vertex array object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArrayId(pub NonZeroU32);

/// Handle to a shader object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub NonZeroU32);

/// Handle to a linked program object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub NonZeroU32);

/// Location of a uniform within a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Fragment shader
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Graphics device errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// An object could not be created
    #[error("failed to create {kind}: {reason}")]
    CreationFailed {
        /// Kind of object ("buffer", "program", ...)
        kind: &'static str,
        /// Driver-provided reason
        reason: String,
    },

    /// The driver reported an error code
    #[error("GL error 0x{0:04X}")]
    Api(u32),

    /// A draw exceeded the range addressable by the API
    #[error("too many vertices for a single draw call: {0}")]
    TooManyVertices(usize),
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// The OpenGL ES operations used by the point pipeline.
pub trait GraphicsDevice {
    /// Generate a buffer object
    fn create_buffer(&mut self) -> DeviceResult<BufferId>;

    /// Delete a buffer object
    fn delete_buffer(&mut self, buffer: BufferId);

    /// Generate a vertex array object
    fn create_vertex_array(&mut self) -> DeviceResult<VertexArrayId>;

    /// Delete a vertex array object
    fn delete_vertex_array(&mut self, array: VertexArrayId);

    /// Bind (or unbind with `None`) the array buffer target
    fn bind_buffer(&mut self, buffer: Option<BufferId>);

    /// Bind (or unbind with `None`) a vertex array object
    fn bind_vertex_array(&mut self, array: Option<VertexArrayId>);

    /// Enable an attribute and point it at the bound array buffer
    fn enable_vertex_attribute(&mut self, attribute: &VertexAttribute, stride: i32);

    /// Replace the contents of the bound array buffer (dynamic usage)
    fn buffer_data(&mut self, data: &[u8]);

    /// Create an empty shader object
    fn create_shader(&mut self, stage: ShaderStage) -> DeviceResult<ShaderId>;

    /// Set the source of a shader and compile it
    fn compile_shader(&mut self, shader: ShaderId, source: &str);

    /// Whether the last compilation succeeded
    fn shader_compile_status(&self, shader: ShaderId) -> bool;

    /// Compiler output for a shader
    fn shader_info_log(&self, shader: ShaderId) -> String;

    /// Delete a shader object
    fn delete_shader(&mut self, shader: ShaderId);

    /// Create an empty program object
    fn create_program(&mut self) -> DeviceResult<ProgramId>;

    /// Attach a shader to a program
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);

    /// Detach a shader from a program
    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId);

    /// Link a program
    fn link_program(&mut self, program: ProgramId);

    /// Whether the last link succeeded
    fn program_link_status(&self, program: ProgramId) -> bool;

    /// Linker output for a program
    fn program_info_log(&self, program: ProgramId) -> String;

    /// Delete a program object
    fn delete_program(&mut self, program: ProgramId);

    /// Make a program current (or none)
    fn use_program(&mut self, program: Option<ProgramId>);

    /// Look up a uniform by name
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Upload a column-major 4x4 matrix to a uniform of the current program
    fn set_uniform_matrix4(&mut self, location: UniformLocation, column_major: &[f32; 16]);

    /// Draw `count` points starting at `first` from the bound vertex array
    fn draw_points(&mut self, first: i32, count: i32);

    /// Enable depth testing
    fn enable_depth_test(&mut self);

    /// Set the color used by [`clear`](Self::clear)
    fn set_clear_color(&mut self, rgba: [f32; 4]);

    /// Clear the color and depth buffers
    fn clear(&mut self);

    /// Set the viewport rectangle
    fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32);

    /// Pop the oldest pending error code, if any
    fn take_error(&mut self) -> Option<u32>;

    /// Convert a pending error into a [`DeviceError::Api`]
    fn check(&mut self) -> DeviceResult<()> {
        match self.take_error() {
            Some(code) => Err(DeviceError::Api(code)),
            None => Ok(()),
        }
    }
}
