use super::{RenderNode, Technique};
use crate::{
    event::{Event, EventPayload, TargetEvent, UpdateEvent},
    graphics::{Renderer, RenderingQuery},
    handle::{Holder, User},
    manager::{Loader, LoaderOptions, Manager},
    resource::{EventProceeder, ResourceIdentifier},
    window::Window,
    HasProceeder, Resource,
};
use gre_utils::{AnyResult, Color};
use log::*;
use parking_lot::RwLock;
use std::time::Duration;

/// A scene graph, drawn with a technique into a window.
#[derive(HasProceeder)]
pub struct RenderScene {
    proceeder: EventProceeder,
    root: RwLock<Holder<RenderNode>>,
    technique: RwLock<Holder<Technique>>,
    renderer: RwLock<User<Renderer>>,
    target: RwLock<User<Window>>,
    clear_color: RwLock<Color>,
}

impl RenderScene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            proceeder: EventProceeder::new(name),
            root: RwLock::new(Holder::null()),
            technique: RwLock::new(Holder::null()),
            renderer: RwLock::new(User::null()),
            target: RwLock::new(User::null()),
            clear_color: RwLock::new(Color::BLACK),
        }
    }

    pub fn root_node(&self) -> Holder<RenderNode> {
        self.root.read().clone()
    }

    /// Replaces the root node. The root listens to the scene, so scene events reach every node.
    pub fn set_root_node(&self, node: Holder<RenderNode>) -> Holder<RenderNode> {
        let previous = std::mem::replace(&mut *self.root.write(), node.clone());
        if !previous.is_invalid() {
            self.proceeder.remove_listener_by_id(previous.identifier());
        }
        drop(previous);

        if !node.is_invalid() {
            if let Err(error) = self.proceeder.add_listener(&node.user().as_resource()) {
                warn!("Scene `{}`: root won't receive events: {error}", self.name());
            }
        }
        node
    }

    /// Creates a node, not attached to anything yet.
    pub fn create_node(&self, name: impl Into<String>) -> Holder<RenderNode> {
        Holder::new_resource(RenderNode::new(name))
    }

    /// Adds a node under the root, or makes it the root if there's none.
    pub fn add_node(&self, node: Holder<RenderNode>) -> bool {
        let root = self.root_node();
        match root.try_get() {
            Some(root) => root.add_node(node),
            None => !self.set_root_node(node).is_invalid(),
        }
    }

    /// Removes a node along with its whole subtree. Removing the root empties the scene.
    pub fn remove_node(&self, node: &Holder<RenderNode>) -> bool {
        if node.is_invalid() {
            return false;
        }
        if node.ptr_eq(&self.root_node()) {
            self.set_root_node(Holder::null());
            return true;
        }
        match node.parent().try_get() {
            Some(parent) => parent.remove(node.identifier()),
            None => false,
        }
    }

    /// Removes a single node. Its children are attached to the node's parent.
    ///
    /// The root can't be removed this way, since its children would have nowhere to go.
    pub fn remove_node_no_children(&self, node: &Holder<RenderNode>) -> bool {
        if node.is_invalid() {
            return false;
        }
        if node.ptr_eq(&self.root_node()) {
            warn!(
                "Scene `{}`: the root node can't be removed without its children",
                self.name()
            );
            return false;
        }
        match node.parent().try_get() {
            Some(parent) => parent.remove_not_recursive(node.identifier()),
            None => false,
        }
    }

    pub fn remove_node_from_identifier(&self, identifier: ResourceIdentifier) -> bool {
        let node = self.find_holder(identifier);
        if node.is_invalid() {
            debug!(
                "Scene `{}`: no node with identifier {identifier}",
                self.name()
            );
            return false;
        }
        self.remove_node(&node)
    }

    pub fn find_holder(&self, identifier: ResourceIdentifier) -> Holder<RenderNode> {
        let root = self.root_node();
        match root.try_get() {
            Some(node) if node.identifier() == identifier => root.clone(),
            Some(node) => node.find(identifier),
            None => Holder::null(),
        }
    }

    pub fn find_node(&self, identifier: ResourceIdentifier) -> User<RenderNode> {
        self.find_holder(identifier).user()
    }

    /// Amount of nodes in the scene.
    pub fn node_count(&self) -> usize {
        self.root_node()
            .try_get()
            .map_or(0, |root| 1 + root.count_descendants())
    }

    pub fn technique(&self) -> Holder<Technique> {
        self.technique.read().clone()
    }

    pub fn set_technique(&self, technique: Holder<Technique>) {
        if technique.is_invalid() {
            warn!("Scene `{}`: setting a null technique", self.name());
        }
        *self.technique.write() = technique;
    }

    pub fn renderer(&self) -> Holder<Renderer> {
        self.renderer.read().lock()
    }

    pub fn set_renderer(&self, renderer: User<Renderer>) {
        if renderer.is_invalid() {
            warn!("Scene `{}`: setting a null renderer", self.name());
        }
        *self.renderer.write() = renderer;
        self.announce_target();
    }

    pub fn render_target(&self) -> Holder<Window> {
        self.target.read().lock()
    }

    pub fn set_render_target(&self, target: User<Window>) {
        if target.is_invalid() {
            warn!("Scene `{}`: setting a null render target", self.name());
        }
        *self.target.write() = target;
        self.announce_target();
    }

    fn announce_target(&self) {
        let target = self.target.read().clone();
        if let (Some(renderer), false) = (self.renderer().try_get(), target.is_invalid()) {
            renderer.register_target(&target.as_resource());
        }
    }

    pub fn clear_color(&self) -> Color {
        *self.clear_color.read()
    }

    pub fn set_clear_color(&self, color: Color) {
        *self.clear_color.write() = color;
    }

    /// Draws the scene into its render target, and presents it. Does nothing without a render
    /// target or a technique. Returns whether something was drawn.
    pub fn draw(&self, update: &Event) -> bool {
        let Ok(UpdateEvent { elapsed }) = update.try_to::<UpdateEvent>() else {
            warn!(
                "Scene `{}` can't be drawn with a `{}` event",
                self.name(),
                update.kind()
            );
            return false;
        };

        let target = self.render_target();
        let Some(target) = target.try_get() else {
            return false;
        };
        let technique = self.technique();
        let Some(technique) = technique.try_get() else {
            return false;
        };
        let renderer = self.renderer();
        let me = self.proceeder.self_user();

        self.proceeder
            .emit(EventPayload::RenderScenePreRender(TargetEvent {
                target: me.clone(),
            }));
        if let Some(renderer) = renderer.try_get() {
            renderer.pre_render(self.clear_color());
        }

        self.draw_technique(technique, *elapsed);

        self.proceeder
            .emit(EventPayload::RenderScenePostRender(TargetEvent { target: me }));
        if let Some(renderer) = renderer.try_get() {
            renderer.post_render();
        }

        target.swap_buffers();
        true
    }

    /// Draws every pass of a technique, then its subtechniques.
    pub fn draw_technique(&self, technique: &Technique, elapsed: Duration) {
        if !technique.is_activated() {
            return;
        }

        let renderer = self.renderer();
        let Some(renderer) = renderer.try_get() else {
            debug!("Scene `{}` has no renderer", self.name());
            return;
        };

        let nodes = if technique.is_exclusive() {
            technique.exclusive_nodes()
        } else {
            let root = self.root_node();
            if root.is_invalid() {
                vec![]
            } else {
                vec![root]
            }
        };

        for pass in technique.passes() {
            let query = RenderingQuery {
                scene: self.proceeder.self_user(),
                camera: technique.camera(),
                program: pass
                    .program
                    .clone()
                    .unwrap_or_else(|| technique.program().user()),
                viewport: pass.viewport.unwrap_or_else(|| technique.viewport()),
                pass: pass.name,
                elapsed,
                nodes: nodes.clone(),
            };
            renderer.draw(&query);
        }

        for sub in technique.subtechniques() {
            self.draw_technique(&sub, elapsed);
        }
    }
}

impl Resource for RenderScene {}

/// Creates empty scenes.
#[derive(Clone, Default)]
pub struct RenderSceneLoader;

impl Loader<RenderScene> for RenderSceneLoader {
    fn name(&self) -> &str {
        "RenderSceneLoader"
    }

    fn clone_loader(&self) -> Box<dyn Loader<RenderScene>> {
        Box::new(self.clone())
    }

    fn load(&self, name: &str, _options: &LoaderOptions) -> AnyResult<Holder<RenderScene>> {
        Ok(Holder::new_resource(RenderScene::new(name)))
    }
}

impl Manager<RenderScene> {
    /// A scene manager, with [`RenderSceneLoader`] registered as `Default`.
    pub fn scenes(name: impl Into<String>) -> Self {
        let manager = Self::new(name);
        manager.register_loader("Default", RenderSceneLoader);
        manager
    }

    /// Loads a scene, and gives it the technique named by the `"Technique"` option (`Default`
    /// if missing).
    pub fn load_with_technique(
        &self,
        name: &str,
        options: &LoaderOptions,
        techniques: &Manager<Technique>,
    ) -> User<RenderScene> {
        let scene = self.load(name, options);
        if let Some(loaded) = scene.lock().try_get() {
            let technique = options.get_str("Technique").unwrap_or("Default");
            loaded.set_technique(techniques.find_holder(technique));
        }
        scene
    }

    /// Draws every scene. Returns how many of them were drawn.
    pub fn draw_scenes(&self, update: &Event) -> usize {
        self.holders()
            .iter()
            .filter(|scene| scene.draw(update))
            .count()
    }
}
