//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the handful of camera matrix builders the
//! viewer needs. All matrices follow OpenGL conventions: right-handed view
//! space, clip-space depth in `[-1, 1]`, column-major storage.

pub use nalgebra::{Matrix4, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Build a matrix from 16 floats in column-major order.
pub fn mat4_from_column_major(values: &[f32; 16]) -> Mat4 {
    Mat4::from_column_slice(values)
}

/// Flatten a matrix into 16 floats in column-major order.
pub fn mat4_to_column_major(matrix: &Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(matrix.as_slice());
    out
}

/// Right-handed look-at view matrix.
///
/// Moves `eye` to the origin and rotates so that `center` lies on the
/// negative Z axis with `up` projected onto positive Y.
pub fn look_at(eye: &Vec3, center: &Vec3, up: &Vec3) -> Mat4 {
    Mat4::look_at_rh(&Point3::from(*eye), &Point3::from(*center), up)
}

/// OpenGL-style perspective projection.
///
/// # Arguments
/// * `aspect` - Viewport width divided by height (must be non-zero)
/// * `fovy` - Vertical field of view in radians
/// * `near` - Distance to the near clipping plane
/// * `far` - Distance to the far clipping plane (must differ from `near`)
pub fn perspective(aspect: f32, fovy: f32, near: f32, far: f32) -> Mat4 {
    Mat4::new_perspective(aspect, fovy, near, far)
}

/// Aspect ratio of a framebuffer, falling back to 1.0 for degenerate sizes
/// (a minimized window reports a zero height).
pub fn aspect_ratio(width: i32, height: i32) -> f32 {
    if width <= 0 || height <= 0 {
        return 1.0;
    }
    width as f32 / height as f32
}
