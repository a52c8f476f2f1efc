//! Vertex buffer + vertex array object pair
//!
//! Owns one GPU buffer holding the latest frame's points and one VAO
//! recording the [`PointVertexLayout`]. Handles are `Option`s, `None` being
//! the released state, so [`VertexArray::cleanup`] is safe to repeat.

use crate::render::device::{BufferId, DeviceResult, GraphicsDevice, VertexArrayId};
use crate::render::vertex::{PointVertexLayout, Vertex};

/// GPU-side storage for point vertices
#[derive(Debug)]
pub struct VertexArray {
    buffer: Option<BufferId>,
    array: Option<VertexArrayId>,
    bound: bool,
}

impl VertexArray {
    /// Create the buffer and VAO and record the point layout.
    ///
    /// On failure anything already created is deleted again.
    pub fn init(device: &mut dyn GraphicsDevice) -> DeviceResult<Self> {
        let buffer = device.create_buffer()?;
        let array = match device.create_vertex_array() {
            Ok(array) => array,
            Err(err) => {
                device.delete_buffer(buffer);
                return Err(err);
            }
        };

        let mut vertex_array = Self {
            buffer: Some(buffer),
            array: Some(array),
            bound: false,
        };

        device.bind_buffer(Some(buffer));
        device.bind_vertex_array(Some(array));

        for attribute in &PointVertexLayout::attributes() {
            device.enable_vertex_attribute(attribute, PointVertexLayout::STRIDE);
        }

        device.bind_vertex_array(None);
        device.bind_buffer(None);

        if let Err(err) = device.check() {
            vertex_array.cleanup(device);
            return Err(err);
        }

        log::debug!("created point vertex array {array:?} with buffer {buffer:?}");
        Ok(vertex_array)
    }

    /// Whether the GPU objects are still alive
    pub fn is_initialized(&self) -> bool {
        self.buffer.is_some() || self.array.is_some()
    }

    /// Bind the buffer and the VAO
    pub fn bind(&mut self, device: &mut dyn GraphicsDevice) {
        debug_assert!(!self.bound, "vertex array bound twice");
        device.bind_buffer(self.buffer);
        device.bind_vertex_array(self.array);
        self.bound = true;
    }

    /// Unbind the buffer and the VAO
    pub fn unbind(&mut self, device: &mut dyn GraphicsDevice) {
        debug_assert!(self.bound, "vertex array unbound while not bound");
        device.bind_buffer(None);
        device.bind_vertex_array(None);
        self.bound = false;
    }

    /// Replace the whole buffer with `vertices`. Must be bound.
    pub fn buffer_data(&mut self, device: &mut dyn GraphicsDevice, vertices: &[Vertex]) {
        debug_assert!(self.bound, "buffer_data on an unbound vertex array");
        device.buffer_data(Vertex::slice_as_bytes(vertices));
    }

    /// Delete the GPU objects. Handles already released are skipped.
    pub fn cleanup(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(buffer) = self.buffer.take() {
            device.delete_buffer(buffer);
        }

        if let Some(array) = self.array.take() {
            device.delete_vertex_array(array);
        }

        self.bound = false;
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        if self.is_initialized() {
            log::warn!("vertex array dropped without cleanup; GPU objects leaked");
        }
    }
}
