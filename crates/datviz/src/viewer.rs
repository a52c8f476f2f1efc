//! The point-cloud viewer
//!
//! A [`Viewer`] owns one window, the GL device loaded for that window's
//! context and the point pipeline built on that device. GPU state is created
//! lazily by [`Viewer::realize`], which every operation needing the window or
//! the GPU calls implicitly.
//!
//! # Lifecycle
//! ```text
//! Pending ──realize──► Ready ──release/drop──► Released
//!    │
//!    └──realize fails──► Failed
//! ```
//! A failed viewer stays failed: [`Viewer::should_close`] reports `true` and
//! GPU operations return [`ViewerError::Unusable`].
//!
//! # Frames
//! ```no_run
//! # use datviz::{config::ViewerConfig, Viewer, Vertex};
//! # fn main() -> datviz::ViewerResult<()> {
//! # let points: Vec<Vertex> = Vec::new();
//! datviz::global_init()?;
//! let mut viewer = Viewer::new(ViewerConfig::default());
//! while !viewer.should_close() {
//!     viewer.begin_frame()?;
//!     viewer.render_points(&points)?;
//!     viewer.end_frame()?;
//!     viewer.poll_input();
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;

use thiserror::Error;

use crate::backends::glfw::GlfwPlatform;
use crate::config::ViewerConfig;
use crate::foundation::logging::LoggerProxy;
use crate::foundation::math::{aspect_ratio, look_at, perspective, Mat4, Vec3};
use crate::render::camera::CameraController;
use crate::render::device::{DeviceError, GraphicsDevice};
use crate::render::point_pipeline::PointPipeline;
use crate::render::shader::ShaderError;
use crate::render::vertex::Vertex;
use crate::render::window::{Platform, Window, WindowError, WindowEvent};

/// Viewer errors
#[derive(Error, Debug)]
pub enum ViewerError {
    /// Window or context creation failed
    #[error(transparent)]
    Window(#[from] WindowError),

    /// The point program failed to compile or link
    #[error(transparent)]
    Shader(#[from] ShaderError),

    /// The GL device reported an error
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// The viewer failed to realize earlier, or was released
    #[error("viewer has no usable window or GL context")]
    Unusable,

    /// `render_points` outside of `begin_frame` / `end_frame`
    #[error("render_points called outside of begin_frame/end_frame")]
    NotInFrame,

    /// Rejected `set_perspective` parameters
    #[error("invalid perspective parameters: fovy={fovy}, near={near}, far={far}")]
    InvalidPerspective {
        /// Vertical field of view in radians
        fovy: f32,
        /// Near plane distance
        near: f32,
        /// Far plane distance
        far: f32,
    },
}

/// Result type for viewer operations
pub type ViewerResult<T> = Result<T, ViewerError>;

struct GpuResources {
    device: Box<dyn GraphicsDevice>,
    pipeline: PointPipeline,
}

enum GpuState {
    Pending,
    Ready(GpuResources),
    Failed,
    Released,
}

impl GpuState {
    fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready(_) => "ready",
            Self::Failed => "failed",
            Self::Released => "released",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramePhase {
    BetweenFrames,
    InFrame,
}

/// A window rendering point clouds
pub struct Viewer {
    window: Window,
    gpu: GpuState,
    phase: FramePhase,
    logger: LoggerProxy,
    camera: CameraController,
    model: Mat4,
    view: Mat4,
    projection: Mat4,
    background: [f32; 4],
}

impl Viewer {
    /// Create a viewer on the GLFW platform. Nothing native is created yet.
    pub fn new(config: ViewerConfig) -> Self {
        Self::with_platform(Box::new(GlfwPlatform::new()), config)
    }

    /// Create a viewer on an explicit platform
    pub fn with_platform(platform: Box<dyn Platform>, config: ViewerConfig) -> Self {
        let mut camera = CameraController::new();
        camera.set_enabled(config.camera_controls);

        Self {
            window: Window::new(platform, config.window),
            gpu: GpuState::Pending,
            phase: FramePhase::BetweenFrames,
            logger: LoggerProxy::new(),
            camera,
            model: Mat4::identity(),
            view: Mat4::identity(),
            projection: Mat4::identity(),
            background: config.background,
        }
    }

    /// Create the window, the GL device and the point pipeline.
    ///
    /// Does nothing once realized. A failure is reported to the registered
    /// loggers and leaves the viewer permanently unusable.
    pub fn realize(&mut self) -> ViewerResult<()> {
        match self.gpu {
            GpuState::Ready(_) => return Ok(()),
            GpuState::Failed | GpuState::Released => return Err(ViewerError::Unusable),
            GpuState::Pending => {}
        }

        match self.create_resources() {
            Ok(resources) => {
                self.gpu = GpuState::Ready(resources);
                let (width, height) = self.window.framebuffer_size()?;
                self.logger
                    .info(format_args!("viewer ready, framebuffer {width}x{height}"));
                Ok(())
            }
            Err(err) => {
                self.logger.error(format_args!("{err}"));
                self.gpu = GpuState::Failed;
                self.window.close();
                Err(err)
            }
        }
    }

    fn create_resources(&mut self) -> ViewerResult<GpuResources> {
        self.window.make_context_current()?;
        let mut device = self.window.create_device()?;
        device.enable_depth_test();

        let mut pipeline = PointPipeline::new(device.as_mut())?;
        if let Err(err) = device.check() {
            pipeline.cleanup(device.as_mut());
            return Err(err.into());
        }

        Ok(GpuResources { device, pipeline })
    }

    fn gpu(&mut self) -> ViewerResult<&mut GpuResources> {
        self.realize()?;
        match &mut self.gpu {
            GpuState::Ready(resources) => Ok(resources),
            _ => Err(ViewerError::Unusable),
        }
    }

    /// Whether GPU resources exist
    pub fn is_realized(&self) -> bool {
        matches!(self.gpu, GpuState::Ready(_))
    }

    /// Whether realization failed
    pub fn is_failed(&self) -> bool {
        matches!(self.gpu, GpuState::Failed)
    }

    /// Register a log sink receiving every fan-out line
    pub fn add_logger<F>(&mut self, sink: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.logger.add_logger(sink);
    }

    /// The viewer's logger fan-out
    pub fn logger(&mut self) -> &mut LoggerProxy {
        &mut self.logger
    }

    /// Set the window title
    pub fn set_window_title(&mut self, title: &str) -> ViewerResult<()> {
        self.realize()?;
        self.window.set_title(title)?;
        Ok(())
    }

    /// Enable or disable mouse camera controls
    pub fn set_camera_controls_enabled(&mut self, enabled: bool) {
        self.camera.set_enabled(enabled);
    }

    /// Whether mouse camera controls are enabled
    pub fn camera_controls_enabled(&self) -> bool {
        self.camera.enabled()
    }

    /// Window size in screen coordinates
    pub fn window_size(&mut self) -> ViewerResult<(i32, i32)> {
        self.realize()?;
        Ok(self.window.size()?)
    }

    /// Drawable size in pixels
    pub fn framebuffer_size(&mut self) -> ViewerResult<(i32, i32)> {
        self.realize()?;
        Ok(self.window.framebuffer_size()?)
    }

    /// Set the clear color used by [`begin_frame`](Self::begin_frame)
    pub fn set_background(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.background = [r, g, b, a];
    }

    /// Current clear color
    pub fn background(&self) -> [f32; 4] {
        self.background
    }

    /// Set the model matrix
    pub fn set_model_transform(&mut self, model: Mat4) {
        self.model = model;
    }

    /// Current model matrix
    pub fn model_transform(&self) -> Mat4 {
        self.model
    }

    /// Set the view matrix; camera controls continue from it
    pub fn set_view_transform(&mut self, view: Mat4) {
        self.view = view;
        self.camera.sync_from_view(&view);
    }

    /// Current view matrix
    pub fn view_transform(&self) -> Mat4 {
        self.view
    }

    /// Set the view matrix from an eye position, a target and an up vector
    pub fn look_at(&mut self, eye: &Vec3, center: &Vec3, up: &Vec3) {
        self.view = look_at(eye, center, up);
        self.camera.sync_from_look_at(eye, center, up);
    }

    /// Set the projection matrix
    pub fn set_projection_transform(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    /// Current projection matrix
    pub fn projection_transform(&self) -> Mat4 {
        self.projection
    }

    /// Set a perspective projection using the framebuffer's aspect ratio.
    ///
    /// `fovy` is the vertical field of view in radians and must lie in
    /// `(0, π)`; `near` must be positive and `far` distinctly beyond it.
    pub fn set_perspective(&mut self, fovy: f32, near: f32, far: f32) -> ViewerResult<()> {
        // Planes within f32 relative precision of each other are superimposed.
        let depth = far - near;
        let valid = fovy > 0.0
            && fovy < std::f32::consts::PI
            && near > 0.0
            && far.is_finite()
            && depth > f32::EPSILON
            && depth > f32::EPSILON * far;
        if !valid {
            return Err(ViewerError::InvalidPerspective { fovy, near, far });
        }

        let (width, height) = self.framebuffer_size()?;
        self.projection = perspective(aspect_ratio(width, height), fovy, near, far);
        Ok(())
    }

    /// `projection * view * model`
    pub fn mvp(&self) -> Mat4 {
        self.projection * self.view * self.model
    }

    /// Start a frame: clear color and depth, reset the viewport.
    pub fn begin_frame(&mut self) -> ViewerResult<()> {
        if self.phase == FramePhase::InFrame {
            log::warn!("begin_frame called twice without end_frame");
        }

        self.realize()?;
        self.window.make_context_current()?;
        let (width, height) = self.window.framebuffer_size()?;
        let background = self.background;

        let gpu = self.gpu()?;
        gpu.device.set_viewport(0, 0, width, height);
        gpu.device.set_clear_color(background);
        gpu.device.clear();
        gpu.device.check()?;

        self.phase = FramePhase::InFrame;
        Ok(())
    }

    /// Draw `vertices` as points under the current MVP.
    ///
    /// The vertex buffer is replaced on every call. An empty slice is not
    /// an error and issues no draw.
    pub fn render_points(&mut self, vertices: &[Vertex]) -> ViewerResult<()> {
        if self.phase != FramePhase::InFrame {
            return Err(ViewerError::NotInFrame);
        }

        let mvp = self.mvp();
        let gpu = self.gpu()?;
        gpu.pipeline
            .render_points(gpu.device.as_mut(), vertices, &mvp)?;

        log::trace!("rendered {} points", vertices.len());
        Ok(())
    }

    /// Finish the frame and present it
    pub fn end_frame(&mut self) -> ViewerResult<()> {
        if self.phase != FramePhase::InFrame {
            log::warn!("end_frame called without begin_frame");
        }

        self.gpu()?;
        self.window.swap_buffers();
        self.phase = FramePhase::BetweenFrames;
        Ok(())
    }

    /// Process window events and apply camera controls
    pub fn poll_input(&mut self) {
        for event in self.window.poll_events() {
            if let WindowEvent::FramebufferResized { width, height } = event {
                log::debug!("framebuffer resized to {width}x{height}");
            }

            if let Some(view) = self.camera.handle_event(&event) {
                self.view = view;
            }
        }
    }

    /// Whether the window was asked to close, or the viewer is unusable
    pub fn should_close(&mut self) -> bool {
        match self.gpu {
            GpuState::Failed | GpuState::Released => true,
            GpuState::Pending | GpuState::Ready(_) => self.window.should_close(),
        }
    }

    /// Release the pipeline, the device and the window.
    ///
    /// Safe to call repeatedly; GPU objects are deleted exactly once.
    pub fn release(&mut self) {
        let previous = std::mem::replace(&mut self.gpu, GpuState::Released);
        match previous {
            GpuState::Ready(mut resources) => {
                if let Err(err) = self.window.make_context_current() {
                    log::warn!("releasing GPU resources without a current context: {err}");
                }
                resources.pipeline.cleanup(resources.device.as_mut());
                drop(resources);
                log::debug!("released viewer GPU resources");
            }
            GpuState::Failed => self.gpu = GpuState::Failed,
            GpuState::Pending | GpuState::Released => {}
        }

        self.phase = FramePhase::BetweenFrames;
        self.window.close();
    }

    /// Release everything and drop the viewer
    pub fn destroy(self) {
        drop(self);
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Viewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewer")
            .field("window", &self.window)
            .field("gpu", &self.gpu.name())
            .field("phase", &self.phase)
            .field("logger", &self.logger)
            .field("background", &self.background)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::backends::headless::{HeadlessPlatform, HeadlessProbe};
    use crate::render::device::ShaderStage;
    use crate::render::window::MouseButton;
    use approx::assert_relative_eq;

    fn headless_viewer() -> (Viewer, HeadlessProbe) {
        let (platform, probe) = HeadlessPlatform::new();
        (Viewer::with_platform(Box::new(platform), ViewerConfig::default()), probe)
    }

    fn collect_logs(viewer: &mut Viewer) -> Rc<RefCell<Vec<String>>> {
        let lines = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&lines);
        viewer.add_logger(move |line| sink.borrow_mut().push(line.to_owned()));
        lines
    }

    #[test]
    fn test_new_creates_nothing() {
        let (viewer, probe) = headless_viewer();
        assert!(!viewer.is_realized());
        drop(viewer);
        assert_eq!(probe.stats().windows_created, 0);
    }

    #[test]
    fn test_create_and_destroy_releases_everything() {
        let (mut viewer, probe) = headless_viewer();
        viewer.realize().unwrap();
        assert!(viewer.is_realized());
        assert!(probe.stats().depth_test);

        viewer.destroy();

        let stats = probe.stats();
        assert_eq!(stats.live_buffers, 0);
        assert_eq!(stats.live_vertex_arrays, 0);
        assert_eq!(stats.live_shaders, 0);
        assert_eq!(stats.live_programs, 0);
        assert_eq!(stats.windows_created, 1);
        assert_eq!(stats.windows_destroyed, 1);
        assert_eq!(stats.invalid_deletes, 0);
    }

    #[test]
    fn test_release_twice_deletes_once() {
        let (mut viewer, probe) = headless_viewer();
        viewer.realize().unwrap();

        viewer.release();
        viewer.release();
        drop(viewer);

        let stats = probe.stats();
        assert_eq!(stats.deleted_programs, 1);
        assert_eq!(stats.deleted_buffers, 1);
        assert_eq!(stats.deleted_vertex_arrays, 1);
        assert_eq!(stats.invalid_deletes, 0);
    }

    #[test]
    fn test_should_close_is_sticky() {
        let (mut viewer, probe) = headless_viewer();
        viewer.realize().unwrap();
        assert!(!viewer.should_close());

        probe.push_event(WindowEvent::CloseRequested);
        viewer.poll_input();
        assert!(viewer.should_close());

        viewer.poll_input();
        assert!(viewer.should_close());
    }

    #[test]
    fn test_empty_render_issues_no_draw() {
        let (mut viewer, probe) = headless_viewer();
        viewer.begin_frame().unwrap();
        viewer.render_points(&[]).unwrap();
        viewer.end_frame().unwrap();

        let stats = probe.stats();
        assert!(stats.draw_calls.is_empty());
        assert_eq!(stats.swaps, 1);
    }

    #[test]
    fn test_background_clears_framebuffer() {
        let (mut viewer, probe) = headless_viewer();
        viewer.set_background(1.0, 0.0, 0.0, 1.0);
        assert_eq!(viewer.background(), [1.0, 0.0, 0.0, 1.0]);

        viewer.begin_frame().unwrap();

        assert_eq!(probe.read_pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(probe.read_pixel(639, 479), Some([255, 0, 0, 255]));
        assert_eq!(probe.stats().viewport, Some((0, 0, 640, 480)));
        viewer.end_frame().unwrap();
    }

    #[test]
    fn test_points_are_drawn_with_current_mvp() {
        let (mut viewer, probe) = headless_viewer();
        let translation = Mat4::new_translation(&Vec3::new(0.5, 0.0, 0.0));
        viewer.set_model_transform(translation);

        viewer.begin_frame().unwrap();
        viewer
            .render_points(&[Vertex::new([0.0, 0.0, 0.0], [0, 255, 0, 255])])
            .unwrap();
        viewer.end_frame().unwrap();

        let stats = probe.stats();
        assert_eq!(stats.draw_calls.len(), 1);
        assert_eq!(stats.draw_calls[0].count, 1);
        assert_eq!(
            stats.draw_calls[0].mvp,
            Some(crate::foundation::math::mat4_to_column_major(&translation))
        );
        // ndc (0.5, 0) lands three quarters across a 640x480 framebuffer.
        assert_eq!(probe.read_pixel(480, 240), Some([0, 255, 0, 255]));
    }

    #[test]
    fn test_render_outside_frame_is_rejected() {
        let (mut viewer, probe) = headless_viewer();
        let err = viewer.render_points(&[Vertex::default()]).unwrap_err();
        assert!(matches!(err, ViewerError::NotInFrame));

        viewer.begin_frame().unwrap();
        viewer.end_frame().unwrap();
        assert!(matches!(
            viewer.render_points(&[Vertex::default()]),
            Err(ViewerError::NotInFrame)
        ));
        assert!(probe.stats().draw_calls.is_empty());
    }

    #[test]
    fn test_look_at_standard_matrix() {
        let (mut viewer, _probe) = headless_viewer();
        viewer.look_at(&Vec3::new(0.0, 0.0, 5.0), &Vec3::zeros(), &Vec3::y());

        let expected = Mat4::new(
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, -5.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        assert_relative_eq!(viewer.view_transform(), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_transforms_default_to_identity() {
        let (viewer, _probe) = headless_viewer();
        assert_eq!(viewer.model_transform(), Mat4::identity());
        assert_eq!(viewer.view_transform(), Mat4::identity());
        assert_eq!(viewer.projection_transform(), Mat4::identity());
        assert_eq!(viewer.background(), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(viewer.mvp(), Mat4::identity());
    }

    #[test]
    fn test_set_perspective_uses_framebuffer_aspect() {
        let (mut viewer, probe) = headless_viewer();
        probe.set_framebuffer_size(800, 400);

        viewer.set_perspective(1.0, 0.1, 100.0).unwrap();
        assert_relative_eq!(
            viewer.projection_transform(),
            perspective(2.0, 1.0, 0.1, 100.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_set_perspective_rejects_bad_planes() {
        let (mut viewer, _probe) = headless_viewer();
        let next_after_1000 = f32::from_bits(1000.0_f32.to_bits() + 1);
        let cases = [
            (1.0, 0.0, 10.0),
            (1.0, 5.0, 5.0),
            (1.0, 1000.0, next_after_1000),
            (1.0, 0.1, f32::INFINITY),
            (0.0, 0.1, 10.0),
            (4.0, 0.1, 10.0),
        ];
        for (fovy, near, far) in cases {
            assert!(matches!(
                viewer.set_perspective(fovy, near, far),
                Err(ViewerError::InvalidPerspective { .. })
            ));
        }
        assert_eq!(viewer.projection_transform(), Mat4::identity());
    }

    #[test]
    fn test_shader_failure_is_logged_and_fatal() {
        let (mut viewer, probe) = headless_viewer();
        let logs = collect_logs(&mut viewer);
        probe.fail_compile(ShaderStage::Vertex);

        let err = viewer.realize().unwrap_err();
        assert!(matches!(err, ViewerError::Shader(ShaderError::Compile { .. })));

        let logs = logs.borrow();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].starts_with("ERROR: vertex shader failed to compile:\n"));
        assert!(logs[0].contains("   1 | #version 300 es\n"));
        assert!(logs[0].ends_with('\n'));

        assert!(viewer.should_close());
        assert!(matches!(viewer.begin_frame(), Err(ViewerError::Unusable)));

        let stats = probe.stats();
        assert_eq!(stats.live_buffers, 0);
        assert_eq!(stats.live_shaders, 0);
        assert_eq!(stats.windows_destroyed, 1);
    }

    #[test]
    fn test_window_failure_marks_viewer_failed() {
        let (mut viewer, probe) = headless_viewer();
        probe.fail_window_creation();

        assert!(matches!(viewer.realize(), Err(ViewerError::Window(_))));
        assert!(viewer.is_failed());
        assert!(viewer.should_close());
        assert!(matches!(viewer.window_size(), Err(ViewerError::Unusable)));
    }

    #[test]
    fn test_successful_realize_logs_info() {
        let (mut viewer, _probe) = headless_viewer();
        let logs = collect_logs(&mut viewer);
        viewer.realize().unwrap();
        viewer.realize().unwrap();

        let logs = logs.borrow();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].starts_with("INFO: "));
    }

    #[test]
    fn test_gl_error_surfaces_from_frame() {
        let (mut viewer, probe) = headless_viewer();
        viewer.realize().unwrap();
        probe.inject_error(0x0505);

        let err = viewer.begin_frame().unwrap_err();
        assert!(matches!(err, ViewerError::Device(DeviceError::Api(0x0505))));
    }

    #[test]
    fn test_window_queries_and_title() {
        let (mut viewer, probe) = headless_viewer();
        probe.set_window_size(1024, 768);

        assert_eq!(viewer.window_size().unwrap(), (1024, 768));
        assert_eq!(viewer.framebuffer_size().unwrap(), (640, 480));

        viewer.set_window_title("cloud").unwrap();
        assert_eq!(probe.stats().title, "cloud");
    }

    #[test]
    fn test_camera_drag_updates_view() {
        let (mut viewer, probe) = headless_viewer();
        viewer.realize().unwrap();
        viewer.look_at(&Vec3::new(0.0, 0.0, 5.0), &Vec3::zeros(), &Vec3::y());
        let before = viewer.view_transform();

        probe.push_event(WindowEvent::CursorMoved { x: 10.0, y: 10.0 });
        probe.push_event(WindowEvent::MouseButton {
            button: MouseButton::Left,
            pressed: true,
        });
        probe.push_event(WindowEvent::CursorMoved { x: 90.0, y: 30.0 });
        viewer.poll_input();

        assert!((viewer.view_transform() - before).abs().max() > 1e-3);
    }

    #[test]
    fn test_disabled_camera_keeps_view() {
        let (mut viewer, probe) = headless_viewer();
        viewer.realize().unwrap();
        viewer.set_camera_controls_enabled(false);
        assert!(!viewer.camera_controls_enabled());

        probe.push_event(WindowEvent::Scrolled { delta: 2.0 });
        viewer.poll_input();

        assert_eq!(viewer.view_transform(), Mat4::identity());
    }
}
