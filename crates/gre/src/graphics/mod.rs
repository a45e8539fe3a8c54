//! Gre graphics
//!
//! Nothing in this module talks to a GPU directly. Every hardware operation goes through a
//! [`RenderBackend`], owned by a [`Renderer`] resource. The renderer is the only thing that ever
//! touches the backend, and every other graphics resource (shaders, programs, textures, meshes)
//! goes through it.
//!
//! ## Programs and shaders
//! Shader sources are looked up through [`ShaderPathTable`]s, which map shader compiler names
//! (like `GLSL`) to file paths, since one shader may have a source per shading language. The
//! [`ProgramManager`] picks the path matching a compiler supported by the renderer, loads and
//! compiles the shader, and links programs out of them.
//!
//! ## Headless rendering
//! [`HeadlessBackend`] implements the backend without any GPU, by recording every call it gets.
//! It's what the engine runs with by default, and what the tests inspect.

use serde::Deserialize;

#[doc(inline)]
pub use backend::*;
mod backend;

#[doc(inline)]
pub use headless::*;
mod headless;

#[doc(inline)]
pub use renderer::*;
mod renderer;

#[doc(inline)]
pub use shader::*;
mod shader;

#[doc(inline)]
pub use program::*;
mod program;

#[doc(inline)]
pub use texture::*;
mod texture;

#[doc(inline)]
pub use mesh::*;
mod mesh;

#[doc(inline)]
pub use query::*;
mod query;

/// Opaque identifier of an object living in a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendHandle(pub u32);

/// A rectangle of the render target, in normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Viewport {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub const FULL: Viewport = Viewport {
        left: 0.0,
        top: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// Converts the viewport into pixels of a target of given size.
    pub fn to_pixels(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let scale = |value: f32, size: u32| (value.clamp(0.0, 1.0) * size as f32).round() as u32;
        (
            scale(self.left, width),
            scale(self.top, height),
            scale(self.width, width),
            scale(self.height, height),
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::FULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_pixels() {
        let viewport = Viewport {
            left: 0.5,
            top: 0.0,
            width: 0.5,
            height: 1.0,
        };
        assert_eq!(viewport.to_pixels(800, 600), (400, 0, 400, 600));
        assert_eq!(Viewport::default().to_pixels(10, 10), (0, 0, 10, 10));
    }
}
