//! Assembly of stage sources into complete programs and the compile collaborator interface.

use super::types::{GlslType, Stage};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// Target dialect of the generated programs.
pub struct ProgramConfig {
    /// `#version` number.
    pub version: u32,
    /// Profile appended to desktop version lines, e.g. `core`.
    pub profile: Option<String>,
    /// Target OpenGL ES instead of desktop GLSL.
    pub es: bool,
    /// Default float precision of ES fragment stages.
    pub float_precision: String,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            version: 330,
            profile: Some("core".to_owned()),
            es: false,
            float_precision: "highp".to_owned(),
        }
    }
}

impl ProgramConfig {
    /// Legacy dialect: `#version 110`, `attribute`/`varying` and `gl_FragColor`.
    pub fn legacy() -> Self {
        Self {
            version: 110,
            profile: None,
            ..Default::default()
        }
    }

    /// OpenGL ES 3.0 dialect.
    pub fn es3() -> Self {
        Self {
            version: 300,
            profile: None,
            es: true,
            ..Default::default()
        }
    }

    /// Whether the dialect uses `in`/`out` qualifiers and `texture()`.
    pub fn is_modern(&self) -> bool {
        if self.es {
            self.version >= 300
        } else {
            self.version >= 130
        }
    }

    /// `#version` directive.
    pub fn version_line(&self) -> String {
        match (self.es, &self.profile) {
            (true, _) if self.version >= 300 => format!("#version {} es", self.version),
            (true, _) => "#version 100".to_owned(),
            (false, Some(profile)) if self.version >= 150 => {
                format!("#version {} {profile}", self.version)
            }
            (false, _) => format!("#version {}", self.version),
        }
    }

    /// Name of the fragment color output.
    pub fn frag_color(&self) -> &'static str {
        if self.is_modern() {
            "fragColor"
        } else {
            "gl_FragColor"
        }
    }

    /// Sampling function for a sampler type.
    pub fn texture_function(&self, sampler: GlslType) -> &'static str {
        if self.is_modern() {
            return "texture";
        }
        match sampler {
            GlslType::Sampler1D => "texture1D",
            GlslType::Sampler3D => "texture3D",
            GlslType::SamplerCube => "textureCube",
            _ => "texture2D",
        }
    }

    fn prologue(&self, stage: Stage) -> String {
        let mut prologue = self.version_line();
        prologue.push('\n');
        if self.es && stage == Stage::Fragment {
            prologue.push_str(&format!("precision {} float;\n", self.float_precision));
        }
        if self.is_modern() && stage == Stage::Fragment {
            prologue.push_str(&format!("out vec4 {};\n", self.frag_color()));
        }
        prologue
    }

    /// Concatenate a stage's prologue, declarations and executions into a complete source.
    pub fn assemble(&self, stage: Stage, declarations: &str, executions: &str) -> String {
        format!(
            "{}{declarations}\nvoid main() {{\n{executions}}}\n",
            self.prologue(stage)
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Generated sources of both stages.
pub struct ProgramSource {
    /// Vertex stage source.
    pub vertex: String,
    /// Fragment stage source.
    pub fragment: String,
}

impl ProgramSource {
    /// Source of a stage.
    pub fn stage(&self, stage: Stage) -> &str {
        match stage {
            Stage::Vertex => &self.vertex,
            Stage::Fragment => &self.fragment,
        }
    }

    /// Source of a stage with line numbers, matching compiler logs.
    pub fn numbered(&self, stage: Stage) -> String {
        self.stage(stage)
            .lines()
            .enumerate()
            .map(|(index, line)| format!("{:>4}: {line}\n", index + 1))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{log}")]
/// Compiler rejection of a generated program.
pub struct CompileFailure {
    /// Compiler info log.
    pub log: String,
}

/// Collaborator turning generated sources into executable programs.
pub trait CompileSink {
    /// Handle of a successfully compiled program.
    type Program;

    /// Compile and link both stages.
    fn compile(&mut self, source: &ProgramSource) -> Result<Self::Program, CompileFailure>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn version_lines() {
        assert_eq!(ProgramConfig::default().version_line(), "#version 330 core");
        assert_eq!(ProgramConfig::legacy().version_line(), "#version 110");
        assert_eq!(ProgramConfig::es3().version_line(), "#version 300 es");
        assert_eq!(
            ProgramConfig {
                version: 100,
                ..ProgramConfig::es3()
            }
            .version_line(),
            "#version 100"
        );
    }

    #[test]
    fn assembled_layout() {
        let config = ProgramConfig::es3();
        let fragment = config.assemble(Stage::Fragment, "uniform float a1;\n", "    fragColor = vec4(a1);\n");

        assert_eq!(
            fragment,
            "#version 300 es\nprecision highp float;\nout vec4 fragColor;\nuniform float a1;\n\nvoid main() {\n    fragColor = vec4(a1);\n}\n"
        );

        let vertex = ProgramConfig::legacy().assemble(Stage::Vertex, "", "");
        assert_eq!(vertex, "#version 110\n\nvoid main() {\n}\n");
    }

    #[test]
    fn dialect_functions() {
        assert_eq!(ProgramConfig::legacy().frag_color(), "gl_FragColor");
        assert_eq!(
            ProgramConfig::legacy().texture_function(GlslType::SamplerCube),
            "textureCube"
        );
        assert_eq!(
            ProgramConfig::default().texture_function(GlslType::SamplerCube),
            "texture"
        );
    }

    #[test]
    fn numbered_lines() {
        let source = ProgramSource {
            vertex: "a\nb\n".to_owned(),
            fragment: String::new(),
        };
        assert_eq!(source.numbered(Stage::Vertex), "   1: a\n   2: b\n");
    }
}
