//! Headless backend
//!
//! A windowing platform and a software graphics device that need no display
//! and no GPU. Tests drive it through a [`HeadlessProbe`], which shares state
//! with every window and device the platform hands out: it injects input,
//! forces failures and reads back statistics and pixels.
//!
//! The device is not a rasterizer. It validates object lifetimes the way GL
//! does, remembers uniform values, clears a software RGBA8 framebuffer and
//! plots each drawn vertex as a single pixel under the bound `mvp`.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::rc::Rc;

use crate::config::WindowConfig;
use crate::foundation::math::{mat4_from_column_major, Vec4};
use crate::render::device::{
    BufferId, DeviceError, DeviceResult, GraphicsDevice, ProgramId, ShaderId, ShaderStage,
    UniformLocation, VertexArrayId,
};
use crate::render::point_pipeline::MVP_UNIFORM;
use crate::render::vertex::{Vertex, VertexAttribute, VERTEX_SIZE};
use crate::render::window::{Platform, WindowBackend, WindowError, WindowEvent, WindowResult};

const GL_INVALID_VALUE: u32 = 0x0501;
const GL_INVALID_OPERATION: u32 = 0x0502;

/// One recorded `draw_points` call
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// First vertex
    pub first: i32,
    /// Number of vertices
    pub count: i32,
    /// Value of the `mvp` uniform at draw time, column-major
    pub mvp: Option<[f32; 16]>,
}

/// Counters and last-seen values, readable through [`HeadlessProbe::stats`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadlessStats {
    /// Native windows created
    pub windows_created: usize,
    /// Native windows dropped
    pub windows_destroyed: usize,
    /// Buffers created and not yet deleted
    pub live_buffers: usize,
    /// Vertex arrays created and not yet deleted
    pub live_vertex_arrays: usize,
    /// Shaders created and not yet deleted
    pub live_shaders: usize,
    /// Programs created and not yet deleted
    pub live_programs: usize,
    /// Successful buffer deletes
    pub deleted_buffers: usize,
    /// Successful vertex array deletes
    pub deleted_vertex_arrays: usize,
    /// Successful shader deletes
    pub deleted_shaders: usize,
    /// Successful program deletes
    pub deleted_programs: usize,
    /// Deletes of names that were never created or already deleted
    pub invalid_deletes: usize,
    /// Attribute locations enabled, in call order
    pub enabled_attributes: Vec<u32>,
    /// Byte sizes passed to `buffer_data`, in call order
    pub uploads: Vec<usize>,
    /// Every `draw_points` call that was executed
    pub draw_calls: Vec<DrawCall>,
    /// `clear` calls
    pub clears: usize,
    /// Presented frames
    pub swaps: usize,
    /// Whether depth testing was enabled
    pub depth_test: bool,
    /// Last window title
    pub title: String,
    /// Last viewport rectangle
    pub viewport: Option<(i32, i32, i32, i32)>,
}

#[derive(Debug, Default)]
struct Framebuffer {
    width: usize,
    height: usize,
    color: Vec<[u8; 4]>,
    depth: Vec<f32>,
}

impl Framebuffer {
    fn resize(&mut self, width: i32, height: i32) {
        let width = usize::try_from(width).unwrap_or(0);
        let height = usize::try_from(height).unwrap_or(0);
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.color = vec![[0, 0, 0, 0]; width * height];
            self.depth = vec![1.0; width * height];
        }
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }
}

#[derive(Debug, Default)]
struct SharedState {
    stats: HeadlessStats,
    events: VecDeque<WindowEvent>,
    window_size: Option<(i32, i32)>,
    framebuffer_size: Option<(i32, i32)>,
    fail_window_creation: bool,
    fail_compile: Vec<ShaderStage>,
    fail_link: bool,
    injected_errors: VecDeque<u32>,
    framebuffer: Framebuffer,
}

type Shared = Rc<RefCell<SharedState>>;

/// Test-side view of a headless platform
#[derive(Debug, Clone)]
pub struct HeadlessProbe {
    shared: Shared,
}

impl HeadlessProbe {
    /// Snapshot of the counters
    pub fn stats(&self) -> HeadlessStats {
        self.shared.borrow().stats.clone()
    }

    /// Queue an event for the next `poll_events`
    pub fn push_event(&self, event: WindowEvent) {
        self.shared.borrow_mut().events.push_back(event);
    }

    /// Override the window size reported by every window
    pub fn set_window_size(&self, width: i32, height: i32) {
        self.shared.borrow_mut().window_size = Some((width, height));
    }

    /// Override the framebuffer size and queue the matching resize event
    pub fn set_framebuffer_size(&self, width: i32, height: i32) {
        let mut shared = self.shared.borrow_mut();
        shared.framebuffer_size = Some((width, height));
        shared
            .events
            .push_back(WindowEvent::FramebufferResized { width, height });
    }

    /// Make every following window creation fail
    pub fn fail_window_creation(&self) {
        self.shared.borrow_mut().fail_window_creation = true;
    }

    /// Make every following compile of `stage` fail
    pub fn fail_compile(&self, stage: ShaderStage) {
        self.shared.borrow_mut().fail_compile.push(stage);
    }

    /// Make every following program link fail
    pub fn fail_link(&self) {
        self.shared.borrow_mut().fail_link = true;
    }

    /// Report `code` from the next `take_error`
    pub fn inject_error(&self, code: u32) {
        self.shared.borrow_mut().injected_errors.push_back(code);
    }

    /// Read one framebuffer pixel, origin bottom-left
    pub fn read_pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        let shared = self.shared.borrow();
        let framebuffer = &shared.framebuffer;
        framebuffer.index(x, y).map(|index| framebuffer.color[index])
    }
}

/// Windowing platform without a display
#[derive(Debug)]
pub struct HeadlessPlatform {
    shared: Shared,
}

impl HeadlessPlatform {
    /// Create a platform and the probe observing it
    pub fn new() -> (Self, HeadlessProbe) {
        let shared = Shared::default();
        (
            Self {
                shared: Rc::clone(&shared),
            },
            HeadlessProbe { shared },
        )
    }
}

impl Platform for HeadlessPlatform {
    fn create_window(&mut self, config: &WindowConfig) -> WindowResult<Box<dyn WindowBackend>> {
        let mut shared = self.shared.borrow_mut();
        if shared.fail_window_creation {
            return Err(WindowError::CreationFailed(
                "headless window creation disabled".to_owned(),
            ));
        }

        shared.stats.windows_created += 1;
        shared.stats.title = config.title.clone();

        let size = (
            i32::try_from(config.width).unwrap_or(i32::MAX),
            i32::try_from(config.height).unwrap_or(i32::MAX),
        );

        Ok(Box::new(HeadlessWindow {
            shared: Rc::clone(&self.shared),
            size,
            should_close: false,
        }))
    }

    fn poll_events(&mut self) {}
}

/// A window that only exists in memory
#[derive(Debug)]
pub struct HeadlessWindow {
    shared: Shared,
    size: (i32, i32),
    should_close: bool,
}

impl WindowBackend for HeadlessWindow {
    fn should_close(&self) -> bool {
        self.should_close
    }

    fn set_should_close(&mut self, should_close: bool) {
        self.should_close = should_close;
    }

    fn drain_events(&mut self) -> Vec<WindowEvent> {
        self.shared.borrow_mut().events.drain(..).collect()
    }

    fn size(&self) -> (i32, i32) {
        self.shared.borrow().window_size.unwrap_or(self.size)
    }

    fn framebuffer_size(&self) -> (i32, i32) {
        self.shared.borrow().framebuffer_size.unwrap_or(self.size)
    }

    fn set_title(&mut self, title: &str) {
        self.shared.borrow_mut().stats.title = title.to_owned();
    }

    fn make_current(&mut self) {}

    fn swap_buffers(&mut self) {
        self.shared.borrow_mut().stats.swaps += 1;
    }

    fn create_device(&mut self) -> WindowResult<Box<dyn GraphicsDevice>> {
        let (width, height) = self.framebuffer_size();
        self.shared.borrow_mut().framebuffer.resize(width, height);
        Ok(Box::new(HeadlessDevice::new(Rc::clone(&self.shared))))
    }
}

impl Drop for HeadlessWindow {
    fn drop(&mut self) {
        self.shared.borrow_mut().stats.windows_destroyed += 1;
    }
}

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    info_log: String,
}

#[derive(Debug, Default)]
struct ProgramObject {
    attached: Vec<ShaderId>,
    linked: bool,
    info_log: String,
    uniforms: Vec<String>,
    values: HashMap<u32, [f32; 16]>,
}

impl ProgramObject {
    fn value_of(&self, name: &str) -> Option<[f32; 16]> {
        let location = self.uniforms.iter().position(|uniform| uniform == name)?;
        let location = u32::try_from(location).ok()?;
        self.values.get(&location).copied()
    }
}

/// Names declared with `uniform` in a GLSL source, in declaration order
fn declared_uniforms(source: &str) -> impl Iterator<Item = &str> {
    source.lines().filter_map(|line| {
        let declaration = line.trim().strip_prefix("uniform ")?;
        let declaration = declaration.split(';').next()?;
        declaration.split_whitespace().last()
    })
}

/// Software implementation of [`GraphicsDevice`]
#[derive(Debug)]
pub struct HeadlessDevice {
    shared: Shared,
    next_name: u32,
    buffers: HashMap<BufferId, Vec<u8>>,
    vertex_arrays: HashMap<VertexArrayId, Option<BufferId>>,
    shaders: HashMap<ShaderId, ShaderObject>,
    programs: HashMap<ProgramId, ProgramObject>,
    bound_buffer: Option<BufferId>,
    bound_vertex_array: Option<VertexArrayId>,
    current_program: Option<ProgramId>,
    clear_color: [f32; 4],
    depth_test: bool,
    viewport: (i32, i32, i32, i32),
    errors: VecDeque<u32>,
}

impl HeadlessDevice {
    fn new(shared: Shared) -> Self {
        let (width, height) = {
            let state = shared.borrow();
            (
                i32::try_from(state.framebuffer.width).unwrap_or(0),
                i32::try_from(state.framebuffer.height).unwrap_or(0),
            )
        };

        Self {
            shared,
            next_name: 1,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            bound_buffer: None,
            bound_vertex_array: None,
            current_program: None,
            clear_color: [0.0; 4],
            depth_test: false,
            viewport: (0, 0, width, height),
            errors: VecDeque::new(),
        }
    }

    /// A device with its own 640x480 framebuffer and no window
    pub fn standalone() -> (Self, HeadlessProbe) {
        let shared = Shared::default();
        shared.borrow_mut().framebuffer.resize(640, 480);
        (Self::new(Rc::clone(&shared)), HeadlessProbe { shared })
    }

    /// Buffer bound to the array buffer target
    pub fn bound_buffer(&self) -> Option<BufferId> {
        self.bound_buffer
    }

    /// Currently bound vertex array
    pub fn bound_vertex_array(&self) -> Option<VertexArrayId> {
        self.bound_vertex_array
    }

    /// Program in use
    pub fn current_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    /// Size in bytes of a live buffer's contents
    pub fn buffer_len(&self, buffer: BufferId) -> Option<usize> {
        self.buffers.get(&buffer).map(Vec::len)
    }

    fn next_name(&mut self) -> DeviceResult<NonZeroU32> {
        let name = NonZeroU32::new(self.next_name).ok_or_else(|| DeviceError::CreationFailed {
            kind: "object",
            reason: "object names exhausted".to_owned(),
        })?;
        self.next_name = self.next_name.wrapping_add(1);
        Ok(name)
    }

    fn record_error(&mut self, code: u32) {
        log::trace!("headless device raised GL error 0x{code:04X}");
        self.errors.push_back(code);
    }

    fn stats(&self) -> std::cell::RefMut<'_, HeadlessStats> {
        std::cell::RefMut::map(self.shared.borrow_mut(), |shared| &mut shared.stats)
    }

    fn plot(&self, vertices: &[Vertex], mvp: &[f32; 16]) {
        let mvp = mat4_from_column_major(mvp);
        let (vx, vy, vw, vh) = self.viewport;
        let mut shared = self.shared.borrow_mut();
        let framebuffer = &mut shared.framebuffer;

        for vertex in vertices {
            let [x, y, z] = vertex.position;
            let clip = mvp * Vec4::new(x, y, z, 1.0);
            if clip.w <= 0.0 {
                continue;
            }

            let ndc = clip.xyz() / clip.w;
            if ndc.iter().any(|c| !(-1.0..=1.0).contains(c)) {
                continue;
            }

            let px = f64::from(vx) + (f64::from(ndc.x) + 1.0) * 0.5 * f64::from(vw);
            let py = f64::from(vy) + (f64::from(ndc.y) + 1.0) * 0.5 * f64::from(vh);
            if px < 0.0 || py < 0.0 {
                continue;
            }

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let Some(index) = framebuffer.index(px as usize, py as usize) else {
                continue;
            };

            let depth = (ndc.z + 1.0) * 0.5;
            if self.depth_test && depth > framebuffer.depth[index] {
                continue;
            }

            framebuffer.depth[index] = depth;
            framebuffer.color[index] = vertex.color;
        }
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&mut self) -> DeviceResult<BufferId> {
        let buffer = BufferId(self.next_name()?);
        self.buffers.insert(buffer, Vec::new());
        self.stats().live_buffers += 1;
        Ok(buffer)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        let removed = self.buffers.remove(&buffer).is_some();
        let mut stats = self.stats();
        if removed {
            stats.live_buffers -= 1;
            stats.deleted_buffers += 1;
        } else {
            stats.invalid_deletes += 1;
        }
        drop(stats);

        if self.bound_buffer == Some(buffer) {
            self.bound_buffer = None;
        }
    }

    fn create_vertex_array(&mut self) -> DeviceResult<VertexArrayId> {
        let array = VertexArrayId(self.next_name()?);
        self.vertex_arrays.insert(array, None);
        self.stats().live_vertex_arrays += 1;
        Ok(array)
    }

    fn delete_vertex_array(&mut self, array: VertexArrayId) {
        let removed = self.vertex_arrays.remove(&array).is_some();
        let mut stats = self.stats();
        if removed {
            stats.live_vertex_arrays -= 1;
            stats.deleted_vertex_arrays += 1;
        } else {
            stats.invalid_deletes += 1;
        }
        drop(stats);

        if self.bound_vertex_array == Some(array) {
            self.bound_vertex_array = None;
        }
    }

    fn bind_buffer(&mut self, buffer: Option<BufferId>) {
        match buffer {
            Some(id) if !self.buffers.contains_key(&id) => self.record_error(GL_INVALID_OPERATION),
            _ => self.bound_buffer = buffer,
        }
    }

    fn bind_vertex_array(&mut self, array: Option<VertexArrayId>) {
        match array {
            Some(id) if !self.vertex_arrays.contains_key(&id) => {
                self.record_error(GL_INVALID_OPERATION);
            }
            _ => self.bound_vertex_array = array,
        }
    }

    fn enable_vertex_attribute(&mut self, attribute: &VertexAttribute, _stride: i32) {
        let (Some(array), Some(buffer)) = (self.bound_vertex_array, self.bound_buffer) else {
            self.record_error(GL_INVALID_OPERATION);
            return;
        };

        self.vertex_arrays.insert(array, Some(buffer));
        self.stats().enabled_attributes.push(attribute.location);
    }

    fn buffer_data(&mut self, data: &[u8]) {
        let Some(contents) = self.bound_buffer.and_then(|id| self.buffers.get_mut(&id)) else {
            self.record_error(GL_INVALID_OPERATION);
            return;
        };

        contents.clear();
        contents.extend_from_slice(data);
        self.stats().uploads.push(data.len());
    }

    fn create_shader(&mut self, stage: ShaderStage) -> DeviceResult<ShaderId> {
        let shader = ShaderId(self.next_name()?);
        self.shaders.insert(
            shader,
            ShaderObject {
                stage,
                source: String::new(),
                compiled: false,
                info_log: String::new(),
            },
        );
        self.stats().live_shaders += 1;
        Ok(shader)
    }

    fn compile_shader(&mut self, shader: ShaderId, source: &str) {
        let fail = self.shared.borrow().fail_compile.clone();
        let Some(object) = self.shaders.get_mut(&shader) else {
            self.record_error(GL_INVALID_VALUE);
            return;
        };

        object.source = source.to_owned();
        if fail.contains(&object.stage) {
            object.compiled = false;
            object.info_log = format!("ERROR: 0:1: {} stage rejected\n", object.stage);
        } else if !source.contains("void main") {
            object.compiled = false;
            object.info_log = "ERROR: 0:1: missing entry point `main`\n".to_owned();
        } else {
            object.compiled = true;
            object.info_log.clear();
        }
    }

    fn shader_compile_status(&self, shader: ShaderId) -> bool {
        self.shaders.get(&shader).is_some_and(|object| object.compiled)
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        self.shaders
            .get(&shader)
            .map(|object| object.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        let removed = self.shaders.remove(&shader).is_some();
        let mut stats = self.stats();
        if removed {
            stats.live_shaders -= 1;
            stats.deleted_shaders += 1;
        } else {
            stats.invalid_deletes += 1;
        }
    }

    fn create_program(&mut self) -> DeviceResult<ProgramId> {
        let program = ProgramId(self.next_name()?);
        self.programs.insert(program, ProgramObject::default());
        self.stats().live_programs += 1;
        Ok(program)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        match self.programs.get_mut(&program) {
            Some(object) if self.shaders.contains_key(&shader) => object.attached.push(shader),
            _ => self.record_error(GL_INVALID_VALUE),
        }
    }

    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        match self.programs.get_mut(&program) {
            Some(object) if object.attached.contains(&shader) => {
                object.attached.retain(|attached| *attached != shader);
            }
            _ => self.record_error(GL_INVALID_OPERATION),
        }
    }

    fn link_program(&mut self, program: ProgramId) {
        let fail = self.shared.borrow().fail_link;
        let Some(object) = self.programs.get_mut(&program) else {
            self.record_error(GL_INVALID_VALUE);
            return;
        };

        let stages: Vec<&ShaderObject> = object
            .attached
            .iter()
            .filter_map(|shader| self.shaders.get(shader))
            .filter(|shader| shader.compiled)
            .collect();
        let complete = [ShaderStage::Vertex, ShaderStage::Fragment]
            .iter()
            .all(|stage| stages.iter().any(|shader| shader.stage == *stage));

        if fail || !complete {
            object.linked = false;
            object.info_log = "ERROR: program is not linkable\n".to_owned();
            return;
        }

        let mut uniforms: Vec<String> = Vec::new();
        for name in stages.iter().flat_map(|shader| declared_uniforms(&shader.source)) {
            if !uniforms.iter().any(|uniform| uniform == name) {
                uniforms.push(name.to_owned());
            }
        }

        object.uniforms = uniforms;
        object.values.clear();
        object.linked = true;
        object.info_log.clear();
    }

    fn program_link_status(&self, program: ProgramId) -> bool {
        self.programs.get(&program).is_some_and(|object| object.linked)
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        self.programs
            .get(&program)
            .map(|object| object.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: ProgramId) {
        let removed = self.programs.remove(&program).is_some();
        let mut stats = self.stats();
        if removed {
            stats.live_programs -= 1;
            stats.deleted_programs += 1;
        } else {
            stats.invalid_deletes += 1;
        }
        drop(stats);

        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        match program {
            Some(id) if !self.program_link_status(id) => self.record_error(GL_INVALID_OPERATION),
            _ => self.current_program = program,
        }
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let object = self.programs.get(&program).filter(|object| object.linked)?;
        let index = object.uniforms.iter().position(|uniform| uniform == name)?;
        u32::try_from(index).ok().map(UniformLocation)
    }

    fn set_uniform_matrix4(&mut self, location: UniformLocation, column_major: &[f32; 16]) {
        let Some(object) = self.current_program.and_then(|id| self.programs.get_mut(&id)) else {
            self.record_error(GL_INVALID_OPERATION);
            return;
        };

        if usize::try_from(location.0).map_or(true, |index| index >= object.uniforms.len()) {
            self.record_error(GL_INVALID_OPERATION);
            return;
        }

        object.values.insert(location.0, *column_major);
    }

    fn draw_points(&mut self, first: i32, count: i32) {
        if first < 0 || count < 0 {
            self.record_error(GL_INVALID_VALUE);
            return;
        }

        let program = self.current_program.and_then(|id| self.programs.get(&id));
        let source = self
            .bound_vertex_array
            .and_then(|array| self.vertex_arrays.get(&array).copied().flatten())
            .and_then(|buffer| self.buffers.get(&buffer));

        let (Some(program), Some(bytes)) = (program, source) else {
            self.record_error(GL_INVALID_OPERATION);
            return;
        };

        let mvp = program.value_of(MVP_UNIFORM);
        let vertices: Vec<Vertex> = bytes
            .chunks_exact(VERTEX_SIZE)
            .skip(usize::try_from(first).unwrap_or(0))
            .take(usize::try_from(count).unwrap_or(0))
            .map(bytemuck::pod_read_unaligned)
            .collect();

        if let Some(mvp) = mvp.as_ref() {
            self.plot(&vertices, mvp);
        }

        self.stats().draw_calls.push(DrawCall { first, count, mvp });
    }

    fn enable_depth_test(&mut self) {
        self.depth_test = true;
        self.stats().depth_test = true;
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    fn clear(&mut self) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let color = self
            .clear_color
            .map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8);

        let mut shared = self.shared.borrow_mut();
        shared.framebuffer.color.fill(color);
        shared.framebuffer.depth.fill(1.0);
        shared.stats.clears += 1;
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        if width < 0 || height < 0 {
            self.record_error(GL_INVALID_VALUE);
            return;
        }

        self.viewport = (x, y, width, height);
        let mut shared = self.shared.borrow_mut();
        shared.framebuffer.resize(x + width, y + height);
        shared.stats.viewport = Some((x, y, width, height));
    }

    fn take_error(&mut self) -> Option<u32> {
        self.errors
            .pop_front()
            .or_else(|| self.shared.borrow_mut().injected_errors.pop_front())
    }
}
