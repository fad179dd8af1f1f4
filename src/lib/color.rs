//! RGB color pushed to lighting uniforms.

#[derive(Clone, Copy, Default, Debug, PartialEq)]
/// Linear RGB color.
pub struct Color {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
}

impl Color {
    /// White.
    pub const WHITE: Color = Color {
        r: 1.,
        g: 1.,
        b: 1.,
    };

    /// Color from its channels.
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Color { r, g, b }
    }

    /// Channels as a `vec3` uniform.
    pub fn as_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}
