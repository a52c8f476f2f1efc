//! Point rendering pipeline
//!
//! Combines the vertex array and the point shader program. One call to
//! [`PointPipeline::render_points`] is one full bind → upload → draw →
//! unbind cycle.

use crate::foundation::math::{mat4_to_column_major, Mat4};
use crate::render::device::{DeviceError, DeviceResult, GraphicsDevice, UniformLocation};
use crate::render::shader::{ShaderProgram, ShaderResult};
use crate::render::vertex::Vertex;
use crate::render::vertex_array::VertexArray;

/// Vertex stage: transform by `mvp`, pass the color through.
pub const POINT_VERTEX_SHADER: &str = r"#version 300 es

uniform highp mat4 mvp;

layout(location = 0) in highp vec3 g_position;

layout(location = 1) in lowp vec4 g_color;

out lowp vec4 g_point_color;

void main()
{
  g_point_color = g_color;

  gl_Position = mvp * vec4(g_position, 1.0);
}
";

/// Fragment stage: write the interpolated color unchanged.
pub const POINT_FRAGMENT_SHADER: &str = r"#version 300 es

in lowp vec4 g_point_color;

out lowp vec4 g_out_color;

void main()
{
  g_out_color = g_point_color;
}
";

/// Name of the combined transform uniform
pub const MVP_UNIFORM: &str = "mvp";

/// GPU state needed to draw point clouds
#[derive(Debug)]
pub struct PointPipeline {
    program: ShaderProgram,
    vertex_array: VertexArray,
    mvp_location: Option<UniformLocation>,
}

impl PointPipeline {
    /// Create the vertex array and compile the point program.
    pub fn new(device: &mut dyn GraphicsDevice) -> ShaderResult<Self> {
        let mut vertex_array = VertexArray::init(device)?;

        let program =
            match ShaderProgram::link(device, POINT_VERTEX_SHADER, POINT_FRAGMENT_SHADER) {
                Ok(program) => program,
                Err(err) => {
                    vertex_array.cleanup(device);
                    return Err(err);
                }
            };

        let mvp_location = program.uniform_location(device, MVP_UNIFORM);
        if mvp_location.is_none() {
            log::warn!("point program has no `{MVP_UNIFORM}` uniform; points will not be transformed");
        }

        Ok(Self {
            program,
            vertex_array,
            mvp_location,
        })
    }

    /// Replace the buffer with `vertices` and draw them as points.
    ///
    /// An empty slice still replaces the buffer but issues no draw call.
    pub fn render_points(
        &mut self,
        device: &mut dyn GraphicsDevice,
        vertices: &[Vertex],
        mvp: &Mat4,
    ) -> DeviceResult<()> {
        let count =
            i32::try_from(vertices.len()).map_err(|_| DeviceError::TooManyVertices(vertices.len()))?;

        self.vertex_array.bind(device);
        self.program.bind(device);

        self.vertex_array.buffer_data(device, vertices);

        if let Some(location) = self.mvp_location {
            device.set_uniform_matrix4(location, &mat4_to_column_major(mvp));
        }

        if count > 0 {
            device.draw_points(0, count);
        }

        self.program.unbind(device);
        self.vertex_array.unbind(device);

        device.check()
    }

    #[cfg(test)]
    pub(crate) fn is_initialized(&self) -> bool {
        self.program.is_initialized() || self.vertex_array.is_initialized()
    }

    /// Release the program and the vertex array. Safe to call repeatedly.
    pub fn cleanup(&mut self, device: &mut dyn GraphicsDevice) {
        self.program.cleanup(device);
        self.vertex_array.cleanup(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::headless::HeadlessDevice;
    use crate::foundation::math::Vec3;
    use crate::render::device::ShaderStage;

    #[test]
    fn test_render_uploads_and_draws() {
        let (mut device, probe) = HeadlessDevice::standalone();
        let mut pipeline = PointPipeline::new(&mut device).unwrap();
        let mvp = Mat4::new_translation(&Vec3::new(0.0, 0.0, -1.0));

        let points = [Vertex::default(); 5];
        pipeline.render_points(&mut device, &points, &mvp).unwrap();

        let stats = probe.stats();
        assert_eq!(stats.uploads, vec![5 * 16]);
        assert_eq!(stats.draw_calls.len(), 1);
        assert_eq!(stats.draw_calls[0].first, 0);
        assert_eq!(stats.draw_calls[0].count, 5);
        assert_eq!(stats.draw_calls[0].mvp, Some(mat4_to_column_major(&mvp)));
        assert!(device.bound_buffer().is_none());
        assert!(device.current_program().is_none());

        pipeline.cleanup(&mut device);
    }

    #[test]
    fn test_empty_render_skips_draw() {
        let (mut device, probe) = HeadlessDevice::standalone();
        let mut pipeline = PointPipeline::new(&mut device).unwrap();

        pipeline
            .render_points(&mut device, &[], &Mat4::identity())
            .unwrap();

        let stats = probe.stats();
        assert!(stats.draw_calls.is_empty());
        assert_eq!(stats.uploads, vec![0]);

        pipeline.cleanup(&mut device);
    }

    #[test]
    fn test_program_failure_releases_vertex_array() {
        let (mut device, probe) = HeadlessDevice::standalone();
        probe.fail_compile(ShaderStage::Vertex);

        assert!(PointPipeline::new(&mut device).is_err());

        let stats = probe.stats();
        assert_eq!(stats.live_buffers, 0);
        assert_eq!(stats.live_vertex_arrays, 0);
        assert_eq!(stats.live_shaders, 0);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let (mut device, probe) = HeadlessDevice::standalone();
        let mut pipeline = PointPipeline::new(&mut device).unwrap();

        pipeline.cleanup(&mut device);
        pipeline.cleanup(&mut device);

        assert!(!pipeline.is_initialized());
        let stats = probe.stats();
        assert_eq!(stats.deleted_programs, 1);
        assert_eq!(stats.deleted_buffers, 1);
        assert_eq!(stats.invalid_deletes, 0);
    }
}
