use super::{HardwareProgram, Viewport};
use crate::{
    handle::{Holder, User},
    resource::ResourceUser,
    scene::{Camera, RenderNode},
};
use std::time::Duration;

/// Everything the renderer needs to draw one pass of a technique.
#[derive(Debug, Clone)]
pub struct RenderingQuery {
    /// The scene being drawn
    pub scene: ResourceUser,
    pub pass: String,
    pub camera: Camera,
    pub program: User<HardwareProgram>,
    pub viewport: Viewport,
    /// Time elapsed since the previous frame
    pub elapsed: Duration,
    /// Root nodes to draw, along with their subtrees
    pub nodes: Vec<Holder<RenderNode>>,
}
