//! C ABI
//!
//! Mirrors `include/datviz.h`. Handles are boxed [`Viewer`]s. `datviz_destroy`
//! and `datviz_should_close` accept null; every other call requires a
//! handle returned by `datviz_create` and panics on null.
//!
//! Errors after creation cannot be returned through these signatures. They
//! are reported through the viewer's logger callbacks instead.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::ptr;
use std::slice;

use crate::config::{LoggingConfig, ViewerConfig};
use crate::foundation::logging;
use crate::foundation::math::{mat4_from_column_major, Mat4, Vec3};
use crate::global::{global_cleanup, global_init};
use crate::render::vertex::Vertex;
use crate::viewer::{Viewer, ViewerResult};

/// Logger callback: `(user_data, message, length)`; `message` is
/// NUL-terminated and `length` excludes the terminator.
pub type LoggerCallback = Option<unsafe extern "C" fn(*mut c_void, *const c_char, u32)>;

pub(crate) fn into_handle(viewer: Viewer) -> *mut Viewer {
    Box::into_raw(Box::new(viewer))
}

/// # Safety
/// `viz` must be null or a live handle from `datviz_create`.
unsafe fn viewer<'a>(viz: *mut Viewer) -> &'a mut Viewer {
    assert!(!viz.is_null(), "null datviz handle");
    &mut *viz
}

unsafe fn read_matrix(values: *const f32) -> Mat4 {
    assert!(!values.is_null(), "null matrix pointer");
    let mut column_major = [0.0; 16];
    column_major.copy_from_slice(slice::from_raw_parts(values, 16));
    mat4_from_column_major(&column_major)
}

unsafe fn read_vec3(values: *const f32) -> Vec3 {
    assert!(!values.is_null(), "null vector pointer");
    Vec3::from_column_slice(slice::from_raw_parts(values, 3))
}

fn report(viewer: &mut Viewer, operation: &str, result: ViewerResult<()>) {
    if let Err(err) = result {
        viewer.logger().error(format_args!("{operation}: {err}"));
    }
}

unsafe fn write_size(size: (c_int, c_int), w: *mut c_int, h: *mut c_int) {
    if !w.is_null() {
        *w = size.0;
    }
    if !h.is_null() {
        *h = size.1;
    }
}

/// Initialize logging and the windowing library. Returns 0 on success, -1
/// on failure.
///
/// Logging goes to stderr, filtered by `RUST_LOG` (default `info`), so
/// failures before any logger callback is registered are still reported.
#[no_mangle]
pub extern "C" fn datviz_global_init() -> c_int {
    logging::init(&LoggingConfig::default());

    match global_init() {
        Ok(()) => 0,
        Err(err) => {
            log::error!("datviz_global_init: {err}");
            -1
        }
    }
}

/// Release the windowing library
#[no_mangle]
pub extern "C" fn datviz_global_cleanup() {
    global_cleanup();
}

/// Create a viewer with its window and GL resources.
///
/// Returns null when the window, the context or the point program cannot
/// be created.
#[no_mangle]
pub extern "C" fn datviz_create() -> *mut Viewer {
    let mut viewer = Viewer::new(ViewerConfig::default());
    match viewer.realize() {
        Ok(()) => into_handle(viewer),
        Err(err) => {
            log::error!("datviz_create: {err}");
            ptr::null_mut()
        }
    }
}

/// Destroy a viewer. Null is ignored.
///
/// # Safety
/// `viz` must be null or a live handle; it is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn datviz_destroy(viz: *mut Viewer) {
    if !viz.is_null() {
        drop(Box::from_raw(viz));
    }
}

/// Register a logger callback.
///
/// # Safety
/// `viz` must be a live handle. `user_data` is passed back verbatim and must
/// stay valid for the viewer's lifetime.
#[no_mangle]
pub unsafe extern "C" fn datviz_add_logger(
    viz: *mut Viewer,
    user_data: *mut c_void,
    callback: LoggerCallback,
) {
    let viewer = viewer(viz);
    let Some(callback) = callback else {
        log::warn!("datviz_add_logger: ignoring null callback");
        return;
    };

    viewer.add_logger(move |line| {
        let message = CString::new(line.replace('\0', " ")).unwrap_or_default();
        let length = u32::try_from(message.as_bytes().len()).unwrap_or(u32::MAX);
        callback(user_data, message.as_ptr(), length);
    });
}

/// # Safety
/// `viz` must be a live handle and `title` a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn datviz_set_window_title(viz: *mut Viewer, title: *const c_char) {
    let viewer = viewer(viz);
    assert!(!title.is_null(), "null window title");
    let title = CStr::from_ptr(title).to_string_lossy();
    let result = viewer.set_window_title(&title);
    report(viewer, "datviz_set_window_title", result);
}

/// # Safety
/// `viz` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn datviz_set_camera_controls_enabled(viz: *mut Viewer, enabled: c_int) {
    viewer(viz).set_camera_controls_enabled(enabled != 0);
}

/// Window size in screen coordinates; (0, 0) on failure.
///
/// # Safety
/// `viz` must be a live handle; `w` and `h` may be null.
#[no_mangle]
pub unsafe extern "C" fn datviz_get_window_size(viz: *mut Viewer, w: *mut c_int, h: *mut c_int) {
    let viewer = viewer(viz);
    let size = match viewer.window_size() {
        Ok(size) => size,
        Err(err) => {
            report(viewer, "datviz_get_window_size", Err(err));
            (0, 0)
        }
    };
    write_size(size, w, h);
}

/// Framebuffer size in pixels; (0, 0) on failure.
///
/// # Safety
/// `viz` must be a live handle; `w` and `h` may be null.
#[no_mangle]
pub unsafe extern "C" fn datviz_get_framebuffer_size(
    viz: *mut Viewer,
    w: *mut c_int,
    h: *mut c_int,
) {
    let viewer = viewer(viz);
    let size = match viewer.framebuffer_size() {
        Ok(size) => size,
        Err(err) => {
            report(viewer, "datviz_get_framebuffer_size", Err(err));
            (0, 0)
        }
    };
    write_size(size, w, h);
}

/// # Safety
/// `viz` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn datviz_set_background(viz: *mut Viewer, r: f32, g: f32, b: f32, a: f32) {
    viewer(viz).set_background(r, g, b, a);
}

/// # Safety
/// `viz` must be a live handle and `model` point to 16 floats.
#[no_mangle]
pub unsafe extern "C" fn datviz_set_model_transform(viz: *mut Viewer, model: *const f32) {
    viewer(viz).set_model_transform(read_matrix(model));
}

/// # Safety
/// `viz` must be a live handle and `view` point to 16 floats.
#[no_mangle]
pub unsafe extern "C" fn datviz_set_view_transform(viz: *mut Viewer, view: *const f32) {
    viewer(viz).set_view_transform(read_matrix(view));
}

/// # Safety
/// `viz` must be a live handle; `eye`, `center` and `up` point to 3 floats each.
#[no_mangle]
pub unsafe extern "C" fn datviz_look_at(
    viz: *mut Viewer,
    eye: *const f32,
    center: *const f32,
    up: *const f32,
) {
    viewer(viz).look_at(&read_vec3(eye), &read_vec3(center), &read_vec3(up));
}

/// # Safety
/// `viz` must be a live handle and `projection` point to 16 floats.
#[no_mangle]
pub unsafe extern "C" fn datviz_set_projection_transform(viz: *mut Viewer, projection: *const f32) {
    viewer(viz).set_projection_transform(read_matrix(projection));
}

/// # Safety
/// `viz` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn datviz_set_perspective(viz: *mut Viewer, fovy: f32, near: f32, far: f32) {
    let viewer = viewer(viz);
    let result = viewer.set_perspective(fovy, near, far);
    report(viewer, "datviz_set_perspective", result);
}

/// # Safety
/// `viz` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn datviz_begin_frame(viz: *mut Viewer) {
    let viewer = viewer(viz);
    let result = viewer.begin_frame();
    report(viewer, "datviz_begin_frame", result);
}

/// # Safety
/// `viz` must be a live handle and `vertices` point to `count` vertices
/// (or be null with `count == 0`).
#[no_mangle]
pub unsafe extern "C" fn datviz_render_points(
    viz: *mut Viewer,
    vertices: *const Vertex,
    count: u32,
) {
    let viewer = viewer(viz);
    let vertices: &[Vertex] = if vertices.is_null() || count == 0 {
        &[]
    } else {
        slice::from_raw_parts(vertices, count as usize)
    };
    let result = viewer.render_points(vertices);
    report(viewer, "datviz_render_points", result);
}

/// # Safety
/// `viz` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn datviz_end_frame(viz: *mut Viewer) {
    let viewer = viewer(viz);
    let result = viewer.end_frame();
    report(viewer, "datviz_end_frame", result);
}

/// # Safety
/// `viz` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn datviz_poll_input(viz: *mut Viewer) {
    viewer(viz).poll_input();
}

/// Non-zero when the viewer should close. Null reports 1.
///
/// # Safety
/// `viz` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn datviz_should_close(viz: *mut Viewer) -> c_int {
    if viz.is_null() {
        return 1;
    }
    c_int::from((*viz).should_close())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::headless::{HeadlessPlatform, HeadlessProbe};
    use crate::foundation::math::mat4_to_column_major;

    unsafe extern "C" fn collect(user_data: *mut c_void, message: *const c_char, length: u32) {
        let lines = &mut *user_data.cast::<Vec<String>>();
        let text = CStr::from_ptr(message).to_str().unwrap();
        assert_eq!(text.len(), length as usize);
        lines.push(text.to_owned());
    }

    fn headless_handle() -> (*mut Viewer, HeadlessProbe) {
        let (platform, probe) = HeadlessPlatform::new();
        let mut viewer = Viewer::with_platform(Box::new(platform), ViewerConfig::default());
        viewer.realize().unwrap();
        (into_handle(viewer), probe)
    }

    #[test]
    fn test_null_handles_are_tolerated() {
        unsafe {
            datviz_destroy(ptr::null_mut());
            assert_eq!(datviz_should_close(ptr::null_mut()), 1);
        }
    }

    #[test]
    fn test_create_without_global_init_returns_null() {
        // Test threads never initialize GLFW, so window creation fails.
        let viz = datviz_create();
        assert!(viz.is_null());

        unsafe {
            datviz_destroy(viz);
            assert_eq!(datviz_should_close(viz), 1);
        }
    }

    #[test]
    fn test_global_init_installs_stderr_logging() {
        // GLFW may be unavailable here; logging is installed either way.
        let status = datviz_global_init();
        assert!(status == 0 || status == -1);
        assert!(log::log_enabled!(target: "datviz", log::Level::Error));
        datviz_global_cleanup();
    }

    #[test]
    fn test_frame_through_c_abi() {
        let (viz, probe) = headless_handle();
        let points = [
            Vertex::new([0.0, 0.0, 0.0], [255, 255, 0, 255]),
            Vertex::new([0.5, 0.5, 0.0], [255, 255, 0, 255]),
        ];

        unsafe {
            assert_eq!(datviz_should_close(viz), 0);
            datviz_set_background(viz, 0.0, 0.0, 1.0, 1.0);
            datviz_begin_frame(viz);
            datviz_render_points(viz, points.as_ptr(), 2);
            datviz_end_frame(viz);
            datviz_destroy(viz);
        }

        let stats = probe.stats();
        assert_eq!(stats.draw_calls.len(), 1);
        assert_eq!(stats.draw_calls[0].count, 2);
        assert_eq!(stats.swaps, 1);
        assert_eq!(stats.live_programs, 0);
        assert_eq!(stats.live_buffers, 0);
        assert_eq!(probe.read_pixel(10, 10), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_matrices_are_column_major() {
        let (viz, _probe) = headless_handle();
        let translation = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let values = mat4_to_column_major(&translation);
        let eye = [0.0_f32, 0.0, 5.0];
        let center = [0.0_f32; 3];
        let up = [0.0_f32, 1.0, 0.0];

        unsafe {
            datviz_set_model_transform(viz, values.as_ptr());
            datviz_look_at(viz, eye.as_ptr(), center.as_ptr(), up.as_ptr());
            assert_eq!((*viz).model_transform(), translation);
            assert_eq!((*viz).view_transform()[(2, 3)], -5.0);
            datviz_destroy(viz);
        }
    }

    #[test]
    fn test_sizes_and_logger() {
        let (viz, _probe) = headless_handle();
        let mut lines: Vec<String> = Vec::new();
        let (mut w, mut h) = (0, 0);

        unsafe {
            datviz_add_logger(viz, ptr::addr_of_mut!(lines).cast(), Some(collect));
            datviz_get_window_size(viz, &mut w, &mut h);
            assert_eq!((w, h), (640, 480));
            datviz_get_framebuffer_size(viz, &mut w, ptr::null_mut());
            assert_eq!(w, 640);

            datviz_render_points(viz, ptr::null(), 0);
            datviz_set_perspective(viz, 1.0, -1.0, 10.0);
            datviz_destroy(viz);
        }

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ERROR: datviz_render_points:"));
        assert!(lines[1].starts_with("ERROR: datviz_set_perspective:"));
        assert!(lines.iter().all(|line| line.ends_with('\n')));
    }
}
