use super::{
    BackendHandle, HeadlessBackend, RenderBackend, RenderingQuery, ShaderType, Viewport,
};
use crate::{
    event::{EventPayload, TargetEvent},
    handle::Holder,
    manager::{Loader, LoaderOptions},
    resource::{EventProceeder, ResourceUser},
    HasProceeder, Resource,
};
use glam::Vec3;
use gre_utils::{AnyResult, Color, PoolCategory, PoolToken};
use log::*;
use parking_lot::{Mutex, RwLock};

/// The resource owning a [`RenderBackend`]. All hardware calls go through it.
#[derive(HasProceeder)]
pub struct Renderer {
    proceeder: EventProceeder,
    backend: Mutex<Box<dyn RenderBackend>>,
    compilers: Vec<String>,
    clear_color: RwLock<Color>,
    targets: Mutex<Vec<ResourceUser>>,
    _token: PoolToken,
}

impl Renderer {
    pub fn new(name: impl Into<String>, backend: Box<dyn RenderBackend>) -> Self {
        let name = name.into();
        let compilers = backend
            .shader_compilers()
            .iter()
            .map(|s| s.to_string())
            .collect();
        info!("Renderer `{name}` uses the `{}` backend", backend.name());
        Self {
            proceeder: EventProceeder::new(name),
            backend: Mutex::new(backend),
            compilers,
            clear_color: RwLock::new(Color::BLACK),
            targets: Mutex::new(vec![]),
            _token: PoolToken::new(PoolCategory::Render),
        }
    }

    pub fn backend_name(&self) -> String {
        self.backend.lock().name().to_owned()
    }

    /// Shading languages supported by the backend.
    pub fn shader_compilers(&self) -> &[String] {
        &self.compilers
    }

    pub fn supports_compiler(&self, compiler: &str) -> bool {
        self.compilers
            .iter()
            .any(|c| c.eq_ignore_ascii_case(compiler))
    }

    /// Direct access to the backend. Don't call back into the renderer from `f`.
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut dyn RenderBackend) -> R) -> R {
        f(&mut **self.backend.lock())
    }

    pub fn compile_shader(&self, kind: ShaderType, source: &str) -> Result<BackendHandle, String> {
        self.backend.lock().compile_shader(kind, source)
    }

    pub fn link_program(
        &self,
        name: &str,
        shaders: &[BackendHandle],
    ) -> Result<BackendHandle, String> {
        self.backend.lock().link_program(name, shaders)
    }

    pub fn create_hardware_program(
        &self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<BackendHandle, String> {
        self.backend
            .lock()
            .create_hardware_program(name, vertex_source, fragment_source)
    }

    pub fn create_texture(&self, name: &str, file: Option<&str>) -> Result<BackendHandle, String> {
        self.backend.lock().create_texture(name, file)
    }

    pub fn create_vertex_buffer(&self, vertices: &[Vec3]) -> BackendHandle {
        self.backend.lock().create_vertex_buffer(vertices)
    }

    pub fn create_index_buffer(&self, indices: &[u32]) -> BackendHandle {
        self.backend.lock().create_index_buffer(indices)
    }

    pub fn draw_mesh(&self, vertices: BackendHandle, indices: BackendHandle) {
        self.backend.lock().draw_mesh(vertices, indices);
    }

    pub fn clear_color(&self) -> Color {
        *self.clear_color.read()
    }

    pub fn set_clear_color(&self, color: Color) {
        *self.clear_color.write() = color;
        self.backend.lock().set_clear_color(color);
    }

    pub fn set_clear_depth(&self, depth: f32) {
        self.backend.lock().set_clear_depth(depth);
    }

    pub fn set_viewport(&self, viewport: &Viewport) {
        self.backend.lock().set_viewport(viewport);
    }

    pub fn pre_render(&self, clear_color: Color) {
        self.backend.lock().pre_render(clear_color);
    }

    pub fn post_render(&self) {
        self.backend.lock().post_render();
    }

    /// Renders the nodes of a query: the backend gets the query first, then the meshes of every
    /// renderable node, depth first.
    pub fn draw(&self, query: &RenderingQuery) {
        let meshes = query
            .nodes
            .iter()
            .flat_map(|node| node.renderable_meshes())
            .collect::<Vec<_>>();

        let mut backend = self.backend.lock();
        backend.set_viewport(&query.viewport);
        backend.draw(query);
        for mesh in meshes {
            let (vertices, indices) = mesh.buffers();
            backend.draw_mesh(vertices, indices);
        }
    }

    /// Remembers given render target, and notifies listeners about it.
    pub fn register_target(&self, target: &ResourceUser) {
        {
            let mut targets = self.targets.lock();
            targets.retain(|t| !t.is_expired());
            if targets.iter().any(|t| t.ptr_eq(target)) {
                return;
            }
            targets.push(target.clone());
        }
        self.proceeder
            .emit(EventPayload::RendererRegisteredTarget(TargetEvent {
                target: target.clone(),
            }));
    }

    pub fn unregister_target(&self, target: &ResourceUser) {
        let removed = {
            let mut targets = self.targets.lock();
            let before = targets.len();
            targets.retain(|t| !t.ptr_eq(target));
            before != targets.len()
        };
        if removed {
            self.proceeder
                .emit(EventPayload::RendererUnregisteredTarget(TargetEvent {
                    target: target.clone(),
                }));
        }
    }

    pub fn target_count(&self) -> usize {
        self.targets
            .lock()
            .iter()
            .filter(|t| !t.is_expired())
            .count()
    }
}

impl Resource for Renderer {}

/// Creates renderers backed by a [`HeadlessBackend`]. Accepts an optional `"Renderer.Backend"`
/// option, which has to be `Headless` if given.
#[derive(Clone, Default)]
pub struct HeadlessRendererLoader;

impl Loader<Renderer> for HeadlessRendererLoader {
    fn name(&self) -> &str {
        "HeadlessRendererLoader"
    }

    fn clone_loader(&self) -> Box<dyn Loader<Renderer>> {
        Box::new(self.clone())
    }

    fn is_loadable(&self, _name: &str, options: &LoaderOptions) -> bool {
        options
            .get_str("Renderer.Backend")
            .map_or(true, |backend| backend.eq_ignore_ascii_case("Headless"))
    }

    fn load(&self, name: &str, _options: &LoaderOptions) -> AnyResult<Holder<Renderer>> {
        Ok(Holder::new_resource(Renderer::new(
            name,
            Box::new(HeadlessBackend::new()),
        )))
    }
}
