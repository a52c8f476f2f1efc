//! OpenGL ES 3.0 device over `glow`
//!
//! Every call goes straight to the driver. The wrapped context must be
//! current on the calling thread whenever a method runs; the viewer makes
//! its window current before touching the device.

use std::ffi::c_void;

use glow::HasContext;

use crate::render::device::{
    BufferId, DeviceError, DeviceResult, GraphicsDevice, ProgramId, ShaderId, ShaderStage,
    UniformLocation, VertexArrayId,
};
use crate::render::vertex::{ComponentType, VertexAttribute};

/// [`GraphicsDevice`] backed by a native GL ES context
pub struct GlesDevice {
    gl: glow::Context,
}

impl GlesDevice {
    /// Load GL entry points through `loader`.
    ///
    /// # Safety
    /// The context the loader resolves symbols for must be current on this
    /// thread, and must stay alive for as long as the device is used.
    pub unsafe fn from_loader<F>(loader: F) -> Self
    where
        F: FnMut(&str) -> *const c_void,
    {
        let gl = glow::Context::from_loader_function(loader);
        log::debug!("loaded GL ES context: {:?}", gl.version());
        Self { gl }
    }
}

impl std::fmt::Debug for GlesDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlesDevice")
            .field("version", self.gl.version())
            .finish()
    }
}

fn creation_failed(kind: &'static str) -> impl FnOnce(String) -> DeviceError {
    move |reason| DeviceError::CreationFailed { kind, reason }
}

fn component_type(component_type: ComponentType) -> u32 {
    match component_type {
        ComponentType::Float => glow::FLOAT,
        ComponentType::UnsignedByte => glow::UNSIGNED_BYTE,
    }
}

// SAFETY (whole impl): ids passed in were produced by this device, and the
// context is current per the type's contract.
impl GraphicsDevice for GlesDevice {
    fn create_buffer(&mut self) -> DeviceResult<BufferId> {
        let buffer = unsafe { self.gl.create_buffer() }.map_err(creation_failed("buffer"))?;
        Ok(BufferId(buffer.0))
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        unsafe { self.gl.delete_buffer(glow::NativeBuffer(buffer.0)) };
    }

    fn create_vertex_array(&mut self) -> DeviceResult<VertexArrayId> {
        let array =
            unsafe { self.gl.create_vertex_array() }.map_err(creation_failed("vertex array"))?;
        Ok(VertexArrayId(array.0))
    }

    fn delete_vertex_array(&mut self, array: VertexArrayId) {
        unsafe { self.gl.delete_vertex_array(glow::NativeVertexArray(array.0)) };
    }

    fn bind_buffer(&mut self, buffer: Option<BufferId>) {
        unsafe {
            self.gl
                .bind_buffer(glow::ARRAY_BUFFER, buffer.map(|id| glow::NativeBuffer(id.0)));
        }
    }

    fn bind_vertex_array(&mut self, array: Option<VertexArrayId>) {
        unsafe {
            self.gl
                .bind_vertex_array(array.map(|id| glow::NativeVertexArray(id.0)));
        }
    }

    fn enable_vertex_attribute(&mut self, attribute: &VertexAttribute, stride: i32) {
        unsafe {
            self.gl.enable_vertex_attrib_array(attribute.location);
            self.gl.vertex_attrib_pointer_f32(
                attribute.location,
                attribute.components,
                component_type(attribute.component_type),
                attribute.normalized,
                stride,
                attribute.offset,
            );
        }
    }

    fn buffer_data(&mut self, data: &[u8]) {
        unsafe {
            self.gl
                .buffer_data_u8_slice(glow::ARRAY_BUFFER, data, glow::DYNAMIC_DRAW);
        }
    }

    fn create_shader(&mut self, stage: ShaderStage) -> DeviceResult<ShaderId> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        let shader = unsafe { self.gl.create_shader(kind) }.map_err(creation_failed("shader"))?;
        Ok(ShaderId(shader.0))
    }

    fn compile_shader(&mut self, shader: ShaderId, source: &str) {
        let shader = glow::NativeShader(shader.0);
        unsafe {
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
        }
    }

    fn shader_compile_status(&self, shader: ShaderId) -> bool {
        unsafe { self.gl.get_shader_compile_status(glow::NativeShader(shader.0)) }
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        unsafe { self.gl.get_shader_info_log(glow::NativeShader(shader.0)) }
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        unsafe { self.gl.delete_shader(glow::NativeShader(shader.0)) };
    }

    fn create_program(&mut self) -> DeviceResult<ProgramId> {
        let program = unsafe { self.gl.create_program() }.map_err(creation_failed("program"))?;
        Ok(ProgramId(program.0))
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        unsafe {
            self.gl
                .attach_shader(glow::NativeProgram(program.0), glow::NativeShader(shader.0));
        }
    }

    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        unsafe {
            self.gl
                .detach_shader(glow::NativeProgram(program.0), glow::NativeShader(shader.0));
        }
    }

    fn link_program(&mut self, program: ProgramId) {
        unsafe { self.gl.link_program(glow::NativeProgram(program.0)) };
    }

    fn program_link_status(&self, program: ProgramId) -> bool {
        unsafe { self.gl.get_program_link_status(glow::NativeProgram(program.0)) }
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        unsafe { self.gl.get_program_info_log(glow::NativeProgram(program.0)) }
    }

    fn delete_program(&mut self, program: ProgramId) {
        unsafe { self.gl.delete_program(glow::NativeProgram(program.0)) };
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        unsafe {
            self.gl
                .use_program(program.map(|id| glow::NativeProgram(id.0)));
        }
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        unsafe {
            self.gl
                .get_uniform_location(glow::NativeProgram(program.0), name)
                .map(|location| UniformLocation(location.0))
        }
    }

    fn set_uniform_matrix4(&mut self, location: UniformLocation, column_major: &[f32; 16]) {
        let location = glow::NativeUniformLocation(location.0);
        unsafe {
            self.gl
                .uniform_matrix_4_f32_slice(Some(&location), false, column_major);
        }
    }

    fn draw_points(&mut self, first: i32, count: i32) {
        unsafe { self.gl.draw_arrays(glow::POINTS, first, count) };
    }

    fn enable_depth_test(&mut self) {
        unsafe { self.gl.enable(glow::DEPTH_TEST) };
    }

    fn set_clear_color(&mut self, [r, g, b, a]: [f32; 4]) {
        unsafe { self.gl.clear_color(r, g, b, a) };
    }

    fn clear(&mut self) {
        unsafe { self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT) };
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) };
    }

    fn take_error(&mut self) -> Option<u32> {
        match unsafe { self.gl.get_error() } {
            glow::NO_ERROR => None,
            code => Some(code),
        }
    }
}
