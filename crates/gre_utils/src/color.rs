use serde::Deserialize;

/// Floating point RGBA color, with every component usually within `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "opaque")]
    pub a: f32,
}

fn opaque() -> f32 {
    1.0
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Converts the color into 8-bit components, clamping out of range values.
    pub fn to_rgba8(self) -> RGBA8 {
        let convert = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        RGBA8 {
            r: convert(self.r),
            g: convert(self.g),
            b: convert(self.b),
            a: convert(self.a),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RGBA8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl From<RGBA8> for Color {
    #[inline]
    fn from(c: RGBA8) -> Self {
        Color::rgba(
            c.r as f32 / 255.0,
            c.g as f32 / 255.0,
            c.b as f32 / 255.0,
            c.a as f32 / 255.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba8_conversion_clamps() {
        let color = Color::rgba(2.0, -1.0, 0.5, 1.0);
        assert_eq!(
            color.to_rgba8(),
            RGBA8 {
                r: 255,
                g: 0,
                b: 128,
                a: 255
            }
        );
    }
}
