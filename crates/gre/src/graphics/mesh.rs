use super::{BackendHandle, Renderer};
use crate::{
    handle::{Holder, User},
    manager::{Loader, LoaderOptions},
    resource::EventProceeder,
    HasProceeder, Resource,
};
use anyhow::bail;
use glam::{vec3, Vec3};
use gre_utils::{AnyResult, RequireExt};

/// Geometry uploaded to the renderer's backend.
#[derive(HasProceeder)]
pub struct Mesh {
    proceeder: EventProceeder,
    vertex_count: usize,
    index_count: usize,
    vertices: BackendHandle,
    indices: BackendHandle,
}

impl Mesh {
    /// Uploads given geometry.
    pub fn new(
        name: impl Into<String>,
        renderer: &Renderer,
        vertices: &[Vec3],
        indices: &[u32],
    ) -> Self {
        Self {
            proceeder: EventProceeder::new(name),
            vertex_count: vertices.len(),
            index_count: indices.len(),
            vertices: renderer.create_vertex_buffer(vertices),
            indices: renderer.create_index_buffer(indices),
        }
    }

    /// Vertex and index buffer handles.
    pub fn buffers(&self) -> (BackendHandle, BackendHandle) {
        (self.vertices, self.indices)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn index_count(&self) -> usize {
        self.index_count
    }

    pub fn draw(&self, renderer: &Renderer) {
        renderer.draw_mesh(self.vertices, self.indices);
    }
}

impl Resource for Mesh {}

/// Creates builtin shapes, chosen with the `"Mesh.Shape"` option: `Triangle` or `Quad`
/// (the default).
#[derive(Clone)]
pub struct ShapeMeshLoader {
    renderer: User<Renderer>,
}

impl ShapeMeshLoader {
    pub fn new(renderer: User<Renderer>) -> Self {
        Self { renderer }
    }
}

impl Loader<Mesh> for ShapeMeshLoader {
    fn name(&self) -> &str {
        "ShapeMeshLoader"
    }

    fn clone_loader(&self) -> Box<dyn Loader<Mesh>> {
        Box::new(self.clone())
    }

    fn is_loadable(&self, _name: &str, _options: &LoaderOptions) -> bool {
        !self.renderer.is_invalid()
    }

    fn load(&self, name: &str, options: &LoaderOptions) -> AnyResult<Holder<Mesh>> {
        let renderer = self.renderer.lock();
        let renderer = renderer.try_get().require("the renderer")?;

        let shape = options.get_str("Mesh.Shape").unwrap_or("Quad");
        let (vertices, indices): (Vec<Vec3>, Vec<u32>) = if shape.eq_ignore_ascii_case("Quad") {
            (
                vec![
                    vec3(-1.0, -1.0, 0.0),
                    vec3(1.0, -1.0, 0.0),
                    vec3(1.0, 1.0, 0.0),
                    vec3(-1.0, 1.0, 0.0),
                ],
                vec![0, 1, 2, 2, 3, 0],
            )
        } else if shape.eq_ignore_ascii_case("Triangle") {
            (
                vec![
                    vec3(-1.0, -1.0, 0.0),
                    vec3(1.0, -1.0, 0.0),
                    vec3(0.0, 1.0, 0.0),
                ],
                vec![0, 1, 2],
            )
        } else {
            bail!("unknown shape `{shape}`");
        };

        Ok(Holder::new_resource(Mesh::new(
            name, renderer, &vertices, &indices,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::HeadlessBackend;

    #[test]
    fn shapes() {
        let renderer = Holder::new_resource(Renderer::new(
            "renderer",
            Box::new(HeadlessBackend::new()),
        ));
        let loader = ShapeMeshLoader::new(renderer.user());

        let quad = loader.load("quad", &LoaderOptions::new()).unwrap();
        assert_eq!((quad.vertex_count(), quad.index_count()), (4, 6));

        let options = LoaderOptions::new().with("Mesh.Shape", "triangle");
        let triangle = loader.load("triangle", &options).unwrap();
        assert_eq!(triangle.index_count(), 3);
        assert_ne!(triangle.buffers(), quad.buffers());

        let options = LoaderOptions::new().with("Mesh.Shape", "Torus");
        assert!(loader.load("torus", &options).is_err());
    }
}
