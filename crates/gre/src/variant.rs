//! Dynamically typed values, used for loader options, custom event properties and per-resource
//! custom data.

use ahash::AHashMap;
use glam::Vec3;
use gre_utils::{Color, RGBA8};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Color(Color),
    Vec3(Vec3),
    /// Width and height of something, like a window or a viewport
    Size(u32, u32),
}

impl Variant {
    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Variant::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers are widened into floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Variant::Float(f) => Some(*f),
            Variant::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Variant::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Variant::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    /// Sizes can also be given as `"WxH"` strings.
    pub fn as_size(&self) -> Option<(u32, u32)> {
        match self {
            Variant::Size(w, h) => Some((*w, *h)),
            Variant::String(s) => parse_size(s),
            _ => None,
        }
    }
}

/// Parses `"1280x720"` style sizes.
pub fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.trim().split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Null => write!(f, "null"),
            Variant::Bool(b) => write!(f, "{b}"),
            Variant::Int(i) => write!(f, "{i}"),
            Variant::Float(x) => write!(f, "{x}"),
            Variant::String(s) => write!(f, "{s}"),
            Variant::Color(c) => {
                let RGBA8 { r, g, b, a } = c.to_rgba8();
                write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
            }
            Variant::Vec3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Variant::Size(w, h) => write!(f, "{w}x{h}"),
        }
    }
}

macro_rules! variant_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(value: $ty) -> Self {
                    Variant::$variant(value.into())
                }
            }
        )*
    };
}

variant_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    String => String,
    &str => String,
    Color => Color,
    Vec3 => Vec3,
}

impl From<(u32, u32)> for Variant {
    fn from((w, h): (u32, u32)) -> Self {
        Variant::Size(w, h)
    }
}

/// String keyed map of [`Variant`]s.
pub type VariantMap = AHashMap<String, Variant>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_parse_from_strings() {
        assert_eq!(Variant::from("800x600").as_size(), Some((800, 600)));
        assert_eq!(Variant::from(" 32 X 16 ").as_size(), Some((32, 16)));
        assert_eq!(Variant::from("800").as_size(), None);
        assert_eq!(Variant::from((4, 3)).as_size(), Some((4, 3)));
    }

    #[test]
    fn accessors_check_types() {
        assert_eq!(Variant::from(3).as_float(), Some(3.0));
        assert_eq!(Variant::from(3).as_str(), None);
        assert_eq!(Variant::from("GLSL").as_str(), Some("GLSL"));
        assert!(Variant::default().is_null());
    }

    #[test]
    fn colors_display_as_hex() {
        let color = Variant::from(Color::rgba(1.0, 0.0, 0.5, 1.0));
        assert_eq!(color.to_string(), "#ff0080ff");
    }
}
