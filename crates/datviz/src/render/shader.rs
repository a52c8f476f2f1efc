//! Shader compilation and program linking
//!
//! GLSL sources are compiled at runtime from embedded strings. A failed
//! compile produces a [`ShaderError::Compile`] carrying a line-numbered
//! listing of the source followed by the driver's info log, which is what
//! ends up in the viewer's log.

use std::fmt::Write as _;

use thiserror::Error;

use crate::render::device::{
    DeviceError, GraphicsDevice, ProgramId, ShaderId, ShaderStage, UniformLocation,
};

/// Shader compilation and linking errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// A stage failed to compile
    #[error("{stage} shader failed to compile:\n{listing}{info_log}")]
    Compile {
        /// Stage that failed
        stage: ShaderStage,
        /// Source with line numbers
        listing: String,
        /// Driver compiler output
        info_log: String,
    },

    /// The program failed to link
    #[error("shader program failed to link: {info_log}")]
    Link {
        /// Driver linker output
        info_log: String,
    },

    /// Object creation or a GL error
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Result type for shader operations
pub type ShaderResult<T> = Result<T, ShaderError>;

/// Prefix every line of `source` with its right-aligned line number.
pub fn annotate_source(source: &str) -> String {
    let mut listing = String::with_capacity(source.len() + source.lines().count() * 8);
    for (index, line) in source.lines().enumerate() {
        let _ = writeln!(listing, "{:>4} | {line}", index + 1);
    }
    listing
}

/// A compiled shader stage
#[derive(Debug)]
pub struct Shader {
    stage: ShaderStage,
    id: Option<ShaderId>,
}

impl Shader {
    /// Compile `source` for `stage`.
    ///
    /// The shader object is deleted again when compilation fails.
    pub fn compile(
        device: &mut dyn GraphicsDevice,
        stage: ShaderStage,
        source: &str,
    ) -> ShaderResult<Self> {
        let id = device.create_shader(stage)?;
        device.compile_shader(id, source);

        if !device.shader_compile_status(id) {
            let info_log = device.shader_info_log(id);
            device.delete_shader(id);
            return Err(ShaderError::Compile {
                stage,
                listing: annotate_source(source),
                info_log,
            });
        }

        log::trace!("compiled {stage} shader {id:?}");
        Ok(Self { stage, id: Some(id) })
    }

    /// Delete the shader object, if still alive
    pub fn cleanup(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(id) = self.id.take() {
            device.delete_shader(id);
            log::trace!("deleted {} shader {id:?}", self.stage);
        }
    }
}

/// A linked vertex + fragment program
#[derive(Debug)]
pub struct ShaderProgram {
    id: Option<ProgramId>,
    bound: bool,
}

impl ShaderProgram {
    /// Compile both stages and link them into a program.
    ///
    /// Stage objects are always deleted before returning; on failure the
    /// program object is deleted as well.
    pub fn link(
        device: &mut dyn GraphicsDevice,
        vert_source: &str,
        frag_source: &str,
    ) -> ShaderResult<Self> {
        let mut vert = Shader::compile(device, ShaderStage::Vertex, vert_source)?;

        let mut frag = match Shader::compile(device, ShaderStage::Fragment, frag_source) {
            Ok(frag) => frag,
            Err(err) => {
                vert.cleanup(device);
                return Err(err);
            }
        };

        let result = Self::link_stages(device, &vert, &frag);

        vert.cleanup(device);
        frag.cleanup(device);

        result
    }

    fn link_stages(
        device: &mut dyn GraphicsDevice,
        vert: &Shader,
        frag: &Shader,
    ) -> ShaderResult<Self> {
        let id = device.create_program()?;
        let stages = [vert.id, frag.id];

        for shader in stages.iter().flatten() {
            device.attach_shader(id, *shader);
        }

        device.link_program(id);

        for shader in stages.iter().flatten() {
            device.detach_shader(id, *shader);
        }

        if !device.program_link_status(id) {
            let info_log = device.program_info_log(id);
            device.delete_program(id);
            return Err(ShaderError::Link { info_log });
        }

        if let Err(err) = device.check() {
            device.delete_program(id);
            return Err(err.into());
        }

        log::debug!("linked shader program {id:?}");
        Ok(Self {
            id: Some(id),
            bound: false,
        })
    }

    /// Make this program current
    pub fn bind(&mut self, device: &mut dyn GraphicsDevice) {
        debug_assert!(!self.bound, "shader program bound twice");
        device.use_program(self.id);
        self.bound = true;
    }

    /// Clear the current program
    pub fn unbind(&mut self, device: &mut dyn GraphicsDevice) {
        debug_assert!(self.bound, "shader program unbound while not bound");
        device.use_program(None);
        self.bound = false;
    }

    /// Look up a uniform of this program
    pub fn uniform_location(
        &self,
        device: &dyn GraphicsDevice,
        name: &str,
    ) -> Option<UniformLocation> {
        self.id.and_then(|id| device.uniform_location(id, name))
    }

    #[cfg(test)]
    pub(crate) fn is_initialized(&self) -> bool {
        self.id.is_some()
    }

    /// Delete the program object, if still alive
    pub fn cleanup(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(id) = self.id.take() {
            device.delete_program(id);
        }
        self.bound = false;
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        if self.id.is_some() {
            log::warn!("shader program dropped without cleanup; GPU program leaked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::headless::HeadlessDevice;

    const VERT: &str = "#version 300 es\nvoid main() {\n  gl_Position = vec4(0.0);\n}\n";
    const FRAG: &str = "#version 300 es\nout lowp vec4 c;\nvoid main() { c = vec4(1.0); }\n";

    #[test]
    fn test_annotate_source() {
        let listing = annotate_source("first\nsecond\n");
        assert_eq!(listing, "   1 | first\n   2 | second\n");
    }

    #[test]
    fn test_link_releases_stage_objects() {
        let (mut device, probe) = HeadlessDevice::standalone();
        let mut program = ShaderProgram::link(&mut device, VERT, FRAG).unwrap();

        let stats = probe.stats();
        assert_eq!(stats.live_programs, 1);
        assert_eq!(stats.live_shaders, 0);
        assert_eq!(stats.deleted_shaders, 2);

        program.cleanup(&mut device);
        program.cleanup(&mut device);
        assert_eq!(probe.stats().live_programs, 0);
        assert_eq!(probe.stats().invalid_deletes, 0);
    }

    #[test]
    fn test_fragment_compile_failure_cleans_up() {
        let (mut device, probe) = HeadlessDevice::standalone();
        probe.fail_compile(ShaderStage::Fragment);

        let err = ShaderProgram::link(&mut device, VERT, FRAG).unwrap_err();
        match &err {
            ShaderError::Compile { stage, listing, info_log } => {
                assert_eq!(*stage, ShaderStage::Fragment);
                assert!(listing.starts_with("   1 | #version 300 es\n"));
                assert!(!info_log.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("fragment shader failed to compile:"));

        let stats = probe.stats();
        assert_eq!(stats.live_shaders, 0);
        assert_eq!(stats.live_programs, 0);
    }

    #[test]
    fn test_link_failure_deletes_program() {
        let (mut device, probe) = HeadlessDevice::standalone();
        probe.fail_link();

        let err = ShaderProgram::link(&mut device, VERT, FRAG).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));

        let stats = probe.stats();
        assert_eq!(stats.live_shaders, 0);
        assert_eq!(stats.live_programs, 0);
        assert_eq!(stats.deleted_programs, 1);
    }
}
