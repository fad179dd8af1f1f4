//! Shading language types, declaration scopes, pipeline stages and literal formatting.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

macro_rules! glsl_types {
    (@arity) => { None };
    (@arity $arity:literal) => { Some($arity) };

    { $($(#[$attr:meta])* $variant:ident => $keyword:literal $(($arity:literal))?),+ $(,)? } => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        /// Types a [Value](super::value::Value) can take in generated code.
        pub enum GlslType {
            $(
                $(#[$attr])*
                $variant,
            )+
        }

        impl GlslType {
            /// Keyword used for this type in generated source.
            pub fn keyword(&self) -> &'static str {
                match self {
                    $(Self::$variant => $keyword,)+
                }
            }

            /// Number of float components, only defined for the float scalar and vectors.
            pub fn arity(&self) -> Option<usize> {
                match self {
                    $(Self::$variant => glsl_types!(@arity $($arity)?),)+
                }
            }
        }

        impl FromStr for GlslType {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(match s {
                    $($keyword => Self::$variant,)+
                    other => Err(format!("Unrecognized type `{other}`."))?,
                })
            }
        }
    };
}

glsl_types! {
    /// Boolean
    Bool => "bool",
    /// Signed integer
    Int => "int",
    /// Single float
    Float => "float" (1),
    /// 2D float vector
    Vec2 => "vec2" (2),
    /// 3D float vector
    Vec3 => "vec3" (3),
    /// 4D float vector
    Vec4 => "vec4" (4),
    /// 2x2 matrix
    Mat2 => "mat2",
    /// 3x3 matrix
    Mat3 => "mat3",
    /// 4x4 matrix
    Mat4 => "mat4",
    /// 1D texture sampler
    Sampler1D => "sampler1D",
    /// 2D texture sampler
    Sampler2D => "sampler2D",
    /// 3D texture sampler
    Sampler3D => "sampler3D",
    /// Cube map sampler
    SamplerCube => "samplerCube",
    /// 2D texture array sampler
    Sampler2DArray => "sampler2DArray",
}

impl GlslType {
    /// Float type with the given number of components.
    pub fn with_arity(arity: usize) -> Option<Self> {
        Some(match arity {
            1 => Self::Float,
            2 => Self::Vec2,
            3 => Self::Vec3,
            4 => Self::Vec4,
            _ => None?,
        })
    }

    /// Whether a value of this type may feed a slot expecting `target`, either as-is or
    /// through widening.
    pub fn widens_to(&self, target: GlslType) -> bool {
        match (self.arity(), target.arity()) {
            (Some(from), Some(to)) => from <= to,
            _ => *self == target,
        }
    }

    /// Whether this is one of the sampler types.
    pub fn is_sampler(&self) -> bool {
        matches!(
            self,
            Self::Sampler1D
                | Self::Sampler2D
                | Self::Sampler3D
                | Self::SamplerCube
                | Self::Sampler2DArray
        )
    }
}

impl fmt::Display for GlslType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl From<GlslType> for String {
    fn from(ty: GlslType) -> Self {
        ty.keyword().to_owned()
    }
}

impl TryFrom<String> for GlslType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Where and how a value is declared.
pub enum Scope {
    #[default]
    /// Expression substituted at every use site, never declared.
    Inline,
    /// Stage-private global variable declared without qualifier.
    Local,
    /// Uniform shared by the whole program.
    GlobalUniform,
    /// Per-vertex attribute, vertex stage only.
    Attribute,
    /// Interpolated input of the fragment stage.
    VaryingIn,
    /// Vertex output interpolated towards the fragment stage.
    VaryingOut,
}

impl Scope {
    /// Declaration qualifier of this scope in `stage`. [None] when the scope has no declaration
    /// there, an empty string when it is declared without a qualifier.
    pub fn qualifier(&self, stage: Stage, modern: bool) -> Option<&'static str> {
        Some(match (self, stage) {
            (Self::Inline, _) => None?,
            (Self::Local, _) => "",
            (Self::GlobalUniform, _) => "uniform",
            (Self::Attribute, Stage::Vertex) => {
                if modern {
                    "in"
                } else {
                    "attribute"
                }
            }
            (Self::Attribute, Stage::Fragment) => None?,
            (Self::VaryingIn, Stage::Vertex) => None?,
            (Self::VaryingOut, Stage::Vertex) => {
                if modern {
                    "out"
                } else {
                    "varying"
                }
            }
            (Self::VaryingIn | Self::VaryingOut, Stage::Fragment) => {
                if modern {
                    "in"
                } else {
                    "varying"
                }
            }
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Programmable pipeline stage.
pub enum Stage {
    /// Per-vertex stage.
    Vertex,
    /// Per-fragment stage.
    Fragment,
}

impl Stage {
    /// Both stages in emission order.
    pub const ALL: [Stage; 2] = [Stage::Vertex, Stage::Fragment];
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Set of [Stages](Stage).
pub struct Stages {
    /// Vertex stage is part of the set.
    pub vertex: bool,
    /// Fragment stage is part of the set.
    pub fragment: bool,
}

impl Stages {
    /// Empty set.
    pub const NONE: Self = Self { vertex: false, fragment: false };
    /// Vertex stage only.
    pub const VERTEX: Self = Self { vertex: true, fragment: false };
    /// Fragment stage only.
    pub const FRAGMENT: Self = Self { vertex: false, fragment: true };
    /// Both stages.
    pub const BOTH: Self = Self { vertex: true, fragment: true };

    /// Whether `stage` is part of the set.
    pub fn contains(&self, stage: Stage) -> bool {
        match stage {
            Stage::Vertex => self.vertex,
            Stage::Fragment => self.fragment,
        }
    }

    /// Stages of the set, in emission order.
    pub fn iter(&self) -> impl Iterator<Item = Stage> + '_ {
        Stage::ALL.into_iter().filter(|stage| self.contains(*stage))
    }
}

impl From<Stage> for Stages {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Vertex => Self::VERTEX,
            Stage::Fragment => Self::FRAGMENT,
        }
    }
}

/// Format a float so the generated source always reads it as a float: `1` becomes `1.0`.
pub fn fmt_float(value: f32) -> String {
    if value.is_finite() && value.fract() == 0. {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
/// Constant known at graph construction.
pub enum Literal {
    /// Boolean constant
    Bool(bool),
    /// Integer constant
    Int(i32),
    /// Float constant
    Float(f32),
    /// 2D vector constant
    Vec2([f32; 2]),
    /// 3D vector constant
    Vec3([f32; 3]),
    /// 4D vector constant
    Vec4([f32; 4]),
}

impl Default for Literal {
    fn default() -> Self {
        Self::Float(0.)
    }
}

impl Literal {
    /// Type of the constant.
    pub fn glsl_type(&self) -> GlslType {
        match self {
            Self::Bool(_) => GlslType::Bool,
            Self::Int(_) => GlslType::Int,
            Self::Float(_) => GlslType::Float,
            Self::Vec2(_) => GlslType::Vec2,
            Self::Vec3(_) => GlslType::Vec3,
            Self::Vec4(_) => GlslType::Vec4,
        }
    }

    /// Float components, [None] for booleans and integers.
    pub fn components(&self) -> Option<Vec<f32>> {
        Some(match self {
            Self::Bool(_) | Self::Int(_) => None?,
            Self::Float(x) => vec![*x],
            Self::Vec2(v) => v.to_vec(),
            Self::Vec3(v) => v.to_vec(),
            Self::Vec4(v) => v.to_vec(),
        })
    }

    /// Build a float constant out of one to four components.
    pub fn from_components(components: &[f32]) -> Option<Self> {
        Some(match *components {
            [x] => Self::Float(x),
            [x, y] => Self::Vec2([x, y]),
            [x, y, z] => Self::Vec3([x, y, z]),
            [x, y, z, w] => Self::Vec4([x, y, z, w]),
            _ => None?,
        })
    }

    /// Source code of the constant.
    pub fn code(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(x) => fmt_float(*x),
            other => {
                let components = other.components().unwrap_or_default();
                format!(
                    "{}({})",
                    other.glsl_type(),
                    components
                        .into_iter()
                        .map(fmt_float)
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

/// Default value of the component at `index` when widening: `0.0` for x, y and z, `1.0` for w.
pub(crate) fn widening_fill(index: usize) -> f32 {
    if index == 3 {
        1.
    } else {
        0.
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn float_formatting() {
        assert_eq!(fmt_float(1.), "1.0");
        assert_eq!(fmt_float(0.5), "0.5");
        assert_eq!(fmt_float(-2.), "-2.0");
        assert_eq!(fmt_float(0.), "0.0");
    }

    #[test]
    fn vector_literal() {
        assert_eq!(
            Literal::Vec4([1., 0.5, 0., 1.]).code(),
            "vec4(1.0, 0.5, 0.0, 1.0)"
        );
        assert_eq!(Literal::Int(3).code(), "3");
        assert_eq!(Literal::Bool(true).code(), "true");
    }

    #[test]
    fn widening_compatibility() {
        assert!(GlslType::Float.widens_to(GlslType::Vec4));
        assert!(GlslType::Vec2.widens_to(GlslType::Vec3));
        assert!(GlslType::Vec3.widens_to(GlslType::Vec3));
        assert!(!GlslType::Vec4.widens_to(GlslType::Vec3));
        assert!(!GlslType::Mat4.widens_to(GlslType::Vec4));
        assert!(GlslType::Sampler2D.widens_to(GlslType::Sampler2D));
    }

    #[test]
    fn type_keywords() {
        for ty in [GlslType::Float, GlslType::SamplerCube, GlslType::Mat3] {
            assert_eq!(ty.keyword().parse::<GlslType>(), Ok(ty));
        }
        assert!("vec5".parse::<GlslType>().is_err());
    }

    #[test]
    fn varying_qualifiers() {
        assert_eq!(Scope::VaryingOut.qualifier(Stage::Vertex, true), Some("out"));
        assert_eq!(Scope::VaryingOut.qualifier(Stage::Fragment, true), Some("in"));
        assert_eq!(
            Scope::VaryingOut.qualifier(Stage::Fragment, false),
            Some("varying")
        );
        assert_eq!(Scope::Attribute.qualifier(Stage::Fragment, true), None);
        assert_eq!(Scope::Inline.qualifier(Stage::Vertex, true), None);
    }
}
