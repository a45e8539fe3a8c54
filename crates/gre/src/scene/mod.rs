//! Scene graphs
//!
//! A [`RenderScene`] owns a tree of [`RenderNode`]s, and draws it with a [`Technique`] every
//! frame. Drawing a scene goes like this:
//!  1. a [`crate::event::EventType::RenderScenePreRender`] event is emitted, and the renderer
//!     clears the target,
//!  2. every pass of the technique is turned into a [`crate::graphics::RenderingQuery`] and
//!     drawn, followed by the passes of its subtechniques,
//!  3. a [`crate::event::EventType::RenderScenePostRender`] event is emitted, and the target is
//!     presented.
//!
//! ## Removing nodes
//! [`RenderScene::remove_node`] takes away the node *and its whole subtree*, while
//! [`RenderScene::remove_node_no_children`] only takes away the node, and hands its children
//! over to the node's parent.

use glam::Vec3;

#[doc(inline)]
pub use node::*;
mod node;

#[doc(inline)]
pub use render_scene::*;
mod render_scene;

#[doc(inline)]
pub use technique::*;
mod technique;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub direction: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        }
    }
}
