//! Light definition.

use crate::color::Color;

#[derive(Clone, Debug, PartialEq)]
/// Light object that adds... light.
pub struct Light {
    /// Type of light.
    pub variant: LightVariant,
    /// Light color.
    pub color: Color,
    /// Light brightness level.
    pub intensity: f32,
    /// World position, ignored by directional lights.
    pub position: [f32; 3],
    /// Direction the light shines towards, ignored by point lights.
    pub direction: [f32; 3],
    /// Distance past which the light has no effect, `0` for unlimited.
    pub range: f32,
    /// Disabled lights are skipped when binding.
    pub enabled: bool,
}

impl Light {
    /// Directional light shining towards `direction`.
    pub fn directional(direction: [f32; 3], color: Color, intensity: f32) -> Self {
        Self {
            variant: LightVariant::Directional,
            color,
            intensity,
            position: [0.; 3],
            direction,
            range: 0.,
            enabled: true,
        }
    }

    /// Point light at `position`.
    pub fn point(position: [f32; 3], color: Color, intensity: f32, range: f32) -> Self {
        Self {
            variant: LightVariant::Point,
            color,
            intensity,
            position,
            direction: [0., -1., 0.],
            range,
            enabled: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Different types of lights that behave differently.
pub enum LightVariant {
    /// Light coming from infinitely far away in a single direction.
    Directional,
    /// Point light that shines in all directions.
    Point,
    /// Point light restricted to a cone.
    Spot,
}

impl LightVariant {
    /// Code of the variant in generated shaders.
    pub fn code(&self) -> i32 {
        match self {
            Self::Directional => 0,
            Self::Point => 1,
            Self::Spot => 2,
        }
    }
}
