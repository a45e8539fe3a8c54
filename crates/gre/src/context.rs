//! The resource context
//!
//! [`ResourceContext`] owns every manager of the engine, and is handed to whatever needs them.
//! Managers are created in dependency order (windows and renderers first, scenes last), and torn
//! down in the reverse order.

use crate::{
    bus::EventBus,
    graphics::{
        HeadlessRendererLoader, Mesh, ProgramManager, Renderer, ShapeMeshLoader, Texture,
        TextureLoader,
    },
    handle::Holder,
    manager::Manager,
    resource::{Keyboard, KeyboardLoader, ResourceUser},
    scene::{RenderScene, Technique},
    technique_parser::TechniqueFileParser,
    window::{HeadlessWindowLoader, Window},
};
use gre_utils::{pools, AnyResult, PoolCategory};
use log::*;
use std::path::Path;

pub struct ResourceContext {
    pub windows: Holder<Manager<Window>>,
    pub renderers: Holder<Manager<Renderer>>,
    pub programs: ProgramManager,
    pub techniques: Holder<Manager<Technique>>,
    pub textures: Holder<Manager<Texture>>,
    pub meshes: Holder<Manager<Mesh>>,
    pub scenes: Holder<Manager<RenderScene>>,
    pub keyboards: Holder<Manager<Keyboard>>,
    pub bus: EventBus,
}

impl ResourceContext {
    /// Creates the managers, with the headless window and renderer loaders, and a blank
    /// `Default` technique.
    pub fn new() -> Self {
        let windows = Holder::new_resource(Manager::new("WindowManager"));
        windows.register_loader("Headless", HeadlessWindowLoader);

        let renderers = Holder::new_resource(Manager::new("RendererManager"));
        renderers.register_loader("Headless", HeadlessRendererLoader);

        let programs = ProgramManager::new();

        let techniques = Holder::new_resource(Manager::techniques("TechniqueManager"));
        techniques.load_blank("Default");

        let keyboards = Holder::new_resource(Manager::new("KeyboardManager"));
        keyboards.register_loader("Default", KeyboardLoader);

        trace!("Resource context created");
        Self {
            windows,
            renderers,
            programs,
            techniques,
            textures: Holder::new_resource(Manager::new("TextureManager")),
            meshes: Holder::new_resource(Manager::new("MeshManager")),
            scenes: Holder::new_resource(Manager::scenes("RenderSceneManager")),
            keyboards,
            bus: EventBus::new(),
        }
    }

    /// Makes given renderer the one used to compile programs, and to create textures and
    /// meshes.
    pub fn use_renderer(&self, renderer: &Holder<Renderer>) {
        self.programs.set_renderer(renderer.user());
        self.textures
            .register_loader("Default", TextureLoader::new(renderer.user()));
        self.meshes
            .register_loader("Default", ShapeMeshLoader::new(renderer.user()));
    }

    /// Reads a technique file, and creates its programs and techniques.
    pub fn load_technique_file(
        &self,
        path: impl AsRef<Path>,
    ) -> AnyResult<Vec<Holder<Technique>>> {
        TechniqueFileParser::process_file(path, &self.programs, &self.techniques)
    }

    /// Every manager, in creation order.
    pub fn managers(&self) -> Vec<ResourceUser> {
        vec![
            self.windows.user().as_resource(),
            self.renderers.user().as_resource(),
            self.programs.shaders().user().as_resource(),
            self.programs.programs().user().as_resource(),
            self.techniques.user().as_resource(),
            self.textures.user().as_resource(),
            self.meshes.user().as_resource(),
            self.scenes.user().as_resource(),
            self.keyboards.user().as_resource(),
        ]
    }

    /// Unloads everything, in the reverse order of the managers' creation. Resources still held
    /// elsewhere stay alive.
    pub fn clear(&self) {
        self.keyboards.clear();
        self.scenes.clear();
        self.meshes.clear();
        self.textures.clear();
        self.techniques.clear();
        self.programs.clear();
        self.renderers.clear();
        self.windows.clear();
        trace!("Resource context cleared");
    }

    /// Amount of live resources in the whole process.
    pub fn resource_usage(&self) -> usize {
        pools().current(PoolCategory::Resource)
    }
}

impl Default for ResourceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ResourceContext {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{manager::LoaderOptions, Resource};

    #[test]
    fn managers_are_ready() {
        let context = ResourceContext::new();
        assert!(context.techniques.contains("Default"));
        assert_eq!(context.managers().len(), 9);

        let window = context.windows.load("main", &LoaderOptions::new());
        assert!(!window.is_invalid());
        let renderer = context.renderers.load("renderer", &LoaderOptions::new()).lock();
        context.use_renderer(&renderer);

        let mesh = context.meshes.load("quad", &LoaderOptions::new());
        assert_eq!(mesh.lock().index_count(), 6);
        let texture = context.textures.load("grass", &LoaderOptions::new());
        assert!(!texture.is_invalid());
    }

    #[test]
    fn clear_unloads_everything() {
        let context = ResourceContext::new();
        let window = context.windows.load("main", &LoaderOptions::new());
        let scene = context.scenes.load("scene", &LoaderOptions::new());
        let technique = context.techniques.get("Default");

        context.clear();
        assert!(window.is_expired());
        assert!(scene.is_expired());
        assert!(technique.is_expired());
        assert!(context.windows.is_empty());
        assert_eq!(context.techniques.name(), "TechniqueManager");
    }
}
