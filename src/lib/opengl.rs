//! OpenGL backend: compiles generated programs and receives uniform values while binding.
//!
//! Every call requires a current OpenGL context whose functions were loaded with [gl::load_with].

use crate::shader::{
    binding::{CullFace, RenderState, TextureHandle, Uniform, UniformSink},
    program::{CompileFailure, CompileSink, ProgramSource},
    types::{GlslType, Stage},
};

use gl::types::{GLchar, GLenum, GLint, GLuint};
use std::{collections::HashMap, ffi::CString, ptr};

fn info_log(object: GLuint, program: bool) -> String {
    let mut length: GLint = 0;
    unsafe {
        if program {
            gl::GetProgramiv(object, gl::INFO_LOG_LENGTH, &mut length);
        } else {
            gl::GetShaderiv(object, gl::INFO_LOG_LENGTH, &mut length);
        }
    }

    let mut buffer = vec![0u8; usize::try_from(length).unwrap_or_default().max(1)];
    let mut written: GLint = 0;
    unsafe {
        if program {
            gl::GetProgramInfoLog(
                object,
                length,
                &mut written,
                buffer.as_mut_ptr() as *mut GLchar,
            );
        } else {
            gl::GetShaderInfoLog(
                object,
                length,
                &mut written,
                buffer.as_mut_ptr() as *mut GLchar,
            );
        }
    }
    buffer.truncate(usize::try_from(written).unwrap_or_default());

    String::from_utf8_lossy(&buffer).trim_end().to_owned()
}

fn compile_stage(stage: Stage, source: &str) -> Result<GLuint, CompileFailure> {
    let kind = match stage {
        Stage::Vertex => gl::VERTEX_SHADER,
        Stage::Fragment => gl::FRAGMENT_SHADER,
    };
    let source = CString::new(source).map_err(|error| CompileFailure {
        log: format!("{stage:?} source contains a NUL byte: {error}"),
    })?;

    unsafe {
        let shader = gl::CreateShader(kind);
        gl::ShaderSource(shader, 1, &source.as_ptr(), ptr::null());
        gl::CompileShader(shader);

        let mut status = GLint::from(gl::FALSE);
        gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut status);
        if status != GLint::from(gl::TRUE) {
            let log = format!("{stage:?} stage: {}", info_log(shader, false));
            gl::DeleteShader(shader);
            return Err(CompileFailure { log });
        }

        Ok(shader)
    }
}

#[derive(Clone, Copy, Debug, Default)]
/// Compiles and links generated programs in the current context.
pub struct GlCompiler;

impl CompileSink for GlCompiler {
    type Program = GlProgram;

    fn compile(&mut self, source: &ProgramSource) -> Result<GlProgram, CompileFailure> {
        let vertex = compile_stage(Stage::Vertex, &source.vertex)?;
        let fragment = match compile_stage(Stage::Fragment, &source.fragment) {
            Ok(fragment) => fragment,
            Err(failure) => {
                unsafe { gl::DeleteShader(vertex) };
                return Err(failure);
            }
        };

        unsafe {
            let handle = gl::CreateProgram();
            gl::AttachShader(handle, vertex);
            gl::AttachShader(handle, fragment);
            gl::LinkProgram(handle);

            gl::DetachShader(handle, vertex);
            gl::DetachShader(handle, fragment);
            gl::DeleteShader(vertex);
            gl::DeleteShader(fragment);

            let mut status = GLint::from(gl::FALSE);
            gl::GetProgramiv(handle, gl::LINK_STATUS, &mut status);
            if status != GLint::from(gl::TRUE) {
                let log = format!("Link: {}", info_log(handle, true));
                gl::DeleteProgram(handle);
                return Err(CompileFailure { log });
            }

            tracing::debug!(program = handle, "Linked shader program");

            Ok(GlProgram {
                handle,
                locations: HashMap::new(),
            })
        }
    }
}

fn texture_target(sampler: GlslType) -> GLenum {
    match sampler {
        GlslType::Sampler1D => gl::TEXTURE_1D,
        GlslType::Sampler3D => gl::TEXTURE_3D,
        GlslType::SamplerCube => gl::TEXTURE_CUBE_MAP,
        GlslType::Sampler2DArray => gl::TEXTURE_2D_ARRAY,
        _ => gl::TEXTURE_2D,
    }
}

fn cull_mode(face: CullFace) -> GLenum {
    match face {
        CullFace::Back => gl::BACK,
        CullFace::Front => gl::FRONT,
        CullFace::FrontAndBack => gl::FRONT_AND_BACK,
    }
}

#[derive(Debug)]
/// Linked program. Uniforms are only applied while the program is [bound](GlProgram::bind).
pub struct GlProgram {
    handle: GLuint,
    locations: HashMap<String, GLint>,
}

impl GlProgram {
    /// OpenGL program name.
    pub fn handle(&self) -> GLuint {
        self.handle
    }

    /// Make the program current.
    pub fn bind(&self) {
        unsafe { gl::UseProgram(self.handle) };
    }

    fn location(&mut self, name: &str) -> Option<GLint> {
        if let Some(location) = self.locations.get(name) {
            return (*location >= 0).then_some(*location);
        }

        let location = match CString::new(name) {
            Ok(c_name) => unsafe { gl::GetUniformLocation(self.handle, c_name.as_ptr()) },
            Err(error) => {
                tracing::warn!(name, %error, "Invalid uniform name");
                -1
            }
        };
        if location < 0 {
            // Unused uniforms are optimized out by the driver.
            tracing::trace!(name, "Uniform not active in program");
        }
        self.locations.insert(name.to_owned(), location);

        (location >= 0).then_some(location)
    }
}

impl UniformSink for GlProgram {
    fn set_uniform(&mut self, name: &str, value: Uniform) {
        let Some(location) = self.location(name) else {return};

        unsafe {
            match &value {
                Uniform::Bool(b) => gl::Uniform1i(location, GLint::from(*b)),
                Uniform::Int(i) => gl::Uniform1i(location, *i),
                Uniform::Float(x) => gl::Uniform1f(location, *x),
                Uniform::Vec2(v) => gl::Uniform2fv(location, 1, v.as_ptr()),
                Uniform::Vec3(v) => gl::Uniform3fv(location, 1, v.as_ptr()),
                Uniform::Vec4(v) => gl::Uniform4fv(location, 1, v.as_ptr()),
                // Matrices are stored row-major.
                Uniform::Mat3(m) => gl::UniformMatrix3fv(
                    location,
                    1,
                    gl::TRUE,
                    bytemuck::cast_slice::<[f32; 3], f32>(m).as_ptr(),
                ),
                Uniform::Mat4(m) => gl::UniformMatrix4fv(
                    location,
                    1,
                    gl::TRUE,
                    bytemuck::bytes_of(m).as_ptr().cast(),
                ),
                Uniform::Mat4Array(matrices) => gl::UniformMatrix4fv(
                    location,
                    GLint::try_from(matrices.len()).unwrap_or(GLint::MAX),
                    gl::TRUE,
                    bytemuck::cast_slice::<_, f32>(matrices.as_slice()).as_ptr(),
                ),
            }
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        unsafe {
            gl::ActiveTexture(gl::TEXTURE0 + unit);
            gl::BindTexture(texture_target(texture.target), texture.id);
        }
    }

    fn set_render_state(&mut self, state: RenderState, enabled: bool) {
        unsafe {
            match (state, enabled) {
                (RenderState::Blend, true) => {
                    gl::Enable(gl::BLEND);
                    gl::BlendFunc(gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA);
                }
                (RenderState::Blend, false) => gl::Disable(gl::BLEND),
                (RenderState::CullFace(face), true) => {
                    gl::Enable(gl::CULL_FACE);
                    gl::CullFace(cull_mode(face));
                }
                (RenderState::CullFace(_), false) => gl::Disable(gl::CULL_FACE),
                (RenderState::DepthWrite, enabled) => {
                    gl::DepthMask(if enabled { gl::TRUE } else { gl::FALSE })
                }
            }
        }
    }
}

impl Drop for GlProgram {
    fn drop(&mut self) {
        unsafe { gl::DeleteProgram(self.handle) };
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sampler_targets() {
        assert_eq!(texture_target(GlslType::Sampler2D), gl::TEXTURE_2D);
        assert_eq!(texture_target(GlslType::SamplerCube), gl::TEXTURE_CUBE_MAP);
        assert_eq!(cull_mode(CullFace::FrontAndBack), gl::FRONT_AND_BACK);
    }
}
