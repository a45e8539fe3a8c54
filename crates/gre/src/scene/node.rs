use crate::{
    event::{EventPayload, PositionChangedEvent},
    graphics::Mesh,
    handle::{Holder, User},
    resource::{EventProceeder, ResourceIdentifier},
    HasProceeder, Resource,
};
use glam::Vec3;
use log::*;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use std::{
    mem,
    sync::atomic::{AtomicBool, Ordering},
};

type Children = SmallVec<[Holder<RenderNode>; 4]>;

/// A node of a scene graph.
///
/// Nodes own their children, and know their parent only weakly. Children are also listeners of
/// their parent, so events sent to a node spread over its whole subtree.
#[derive(HasProceeder)]
pub struct RenderNode {
    proceeder: EventProceeder,
    parent: RwLock<User<RenderNode>>,
    children: Mutex<Children>,
    position: RwLock<Vec3>,
    renderable: AtomicBool,
    mesh: RwLock<Holder<Mesh>>,
}

impl RenderNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            proceeder: EventProceeder::new(name),
            parent: RwLock::new(User::null()),
            children: Mutex::new(Children::new()),
            position: RwLock::new(Vec3::ZERO),
            renderable: AtomicBool::new(false),
            mesh: RwLock::new(Holder::null()),
        }
    }

    fn self_user(&self) -> User<RenderNode> {
        self.proceeder.self_user().downcast()
    }

    /// Attaches a node as a child of this one, detaching it from its former parent first.
    ///
    /// Fails when the node is null, is this node, or is one of its ancestors.
    pub fn add_node(&self, node: Holder<RenderNode>) -> bool {
        let Some(child) = node.try_get() else {
            warn!("Node `{}`: can't add a null node", self.name());
            return false;
        };
        if child.identifier() == self.identifier() || !child.find(self.identifier()).is_invalid() {
            warn!(
                "Node `{}`: adding `{}` would create a cycle",
                self.name(),
                child.name()
            );
            return false;
        }

        let former_parent = child.parent();
        if let Some(former_parent) = former_parent.try_get() {
            if former_parent.identifier() == self.identifier() {
                return true;
            }
            former_parent.detach_child(child.identifier());
        }

        self.adopt(node);
        true
    }

    fn adopt(&self, node: Holder<RenderNode>) {
        *node.parent.write() = self.self_user();
        if let Err(error) = self.proceeder.add_listener(&node.user().as_resource()) {
            debug!(
                "Node `{}`: child `{}` won't receive events: {error}",
                self.name(),
                node.name()
            );
        }
        self.children.lock().push(node);
    }

    /// Takes a direct child out of this node, without touching its own children.
    fn detach_child(&self, identifier: ResourceIdentifier) -> Holder<RenderNode> {
        let detached = {
            let mut children = self.children.lock();
            match children.iter().position(|c| c.identifier() == identifier) {
                Some(index) => children.remove(index),
                None => return Holder::null(),
            }
        };
        self.proceeder.remove_listener_by_id(identifier);
        detached.parent.write().reset();
        detached
    }

    /// Removes the node with given identifier from this subtree, along with its own subtree.
    /// The removed nodes are destroyed once nothing else holds them.
    pub fn remove(&self, identifier: ResourceIdentifier) -> bool {
        let removed = self.detach_child(identifier);
        if !removed.is_invalid() {
            trace!(
                "Node `{}`: removed `{}` with {} descendants",
                self.name(),
                removed.name(),
                removed.count_descendants()
            );
            return true;
        }
        self.children().iter().any(|child| child.remove(identifier))
    }

    /// Removes the node with given identifier from this subtree. Its children are kept, and
    /// attached to the removed node's parent instead.
    pub fn remove_not_recursive(&self, identifier: ResourceIdentifier) -> bool {
        let removed = self.detach_child(identifier);
        let Some(node) = removed.try_get() else {
            return self
                .children()
                .iter()
                .any(|child| child.remove_not_recursive(identifier));
        };

        let orphans = mem::take(&mut *node.children.lock());
        trace!(
            "Node `{}`: removed `{}`, adopting its {} children",
            self.name(),
            node.name(),
            orphans.len()
        );
        for orphan in orphans {
            node.proceeder.remove_listener_by_id(orphan.identifier());
            self.adopt(orphan);
        }
        true
    }

    /// Finds a node of this subtree, not including this node.
    pub fn find(&self, identifier: ResourceIdentifier) -> Holder<RenderNode> {
        for child in self.children() {
            if child.identifier() == identifier {
                return child;
            }
            let found = child.find(identifier);
            if !found.is_invalid() {
                return found;
            }
        }
        Holder::null()
    }

    pub fn children(&self) -> Vec<Holder<RenderNode>> {
        self.children.lock().to_vec()
    }

    /// Null for root nodes.
    pub fn parent(&self) -> Holder<RenderNode> {
        self.parent.read().lock()
    }

    /// Amount of nodes in this subtree, not including this node.
    pub fn count_descendants(&self) -> usize {
        self.children()
            .iter()
            .map(|child| 1 + child.count_descendants())
            .sum()
    }

    pub fn position(&self) -> Vec3 {
        *self.position.read()
    }

    pub fn set_position(&self, position: Vec3) {
        *self.position.write() = position;
        self.proceeder
            .emit(EventPayload::PositionChanged(PositionChangedEvent { position }));
    }

    pub fn translate(&self, offset: Vec3) {
        self.set_position(self.position() + offset);
    }

    pub fn is_renderable(&self) -> bool {
        self.renderable.load(Ordering::Acquire)
    }

    pub fn set_renderable(&self, renderable: bool) {
        self.renderable.store(renderable, Ordering::Release);
    }

    pub fn mesh(&self) -> Holder<Mesh> {
        self.mesh.read().clone()
    }

    /// Sets the mesh drawn for this node. The node becomes renderable if the mesh is valid.
    pub fn set_mesh(&self, mesh: Holder<Mesh>) {
        self.set_renderable(!mesh.is_invalid());
        let previous = mem::replace(&mut *self.mesh.write(), mesh);
        drop(previous);
    }

    /// Meshes of the renderable nodes of this subtree, this node included, depth first.
    pub fn renderable_meshes(&self) -> Vec<Holder<Mesh>> {
        let mut meshes = vec![];
        self.collect_meshes(&mut meshes);
        meshes
    }

    fn collect_meshes(&self, meshes: &mut Vec<Holder<Mesh>>) {
        if self.is_renderable() {
            let mesh = self.mesh();
            if !mesh.is_invalid() {
                meshes.push(mesh);
            }
        }
        for child in self.children() {
            child.collect_meshes(meshes);
        }
    }
}

impl Resource for RenderNode {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn node(name: &str) -> Holder<RenderNode> {
        Holder::new_resource(RenderNode::new(name))
    }

    #[test]
    fn children_know_their_parent() {
        let root = node("root");
        let child = node("child");
        assert!(root.add_node(child.clone()));
        assert!(child.parent().ptr_eq(&root));
        assert!(root.find(child.identifier()).ptr_eq(&child));
        assert_eq!(root.proceeder().listeners(), vec!["child"]);

        // Moving the child under another node detaches it from the first one
        let other = node("other");
        assert!(other.add_node(child.clone()));
        assert!(child.parent().ptr_eq(&other));
        assert_eq!(root.count_descendants(), 0);
        assert_eq!(root.proceeder().listener_count(), 0);
    }

    #[test]
    fn cycles_are_rejected() {
        let root = node("root");
        let child = node("child");
        root.add_node(child.clone());
        assert!(!child.add_node(root.clone()));
        assert!(!root.add_node(root.clone()));
        assert!(!root.add_node(Holder::null()));
    }

    #[test]
    fn events_spread_over_the_subtree() {
        let root = node("root");
        let child = node("child");
        let grandchild = node("grandchild");
        root.add_node(child.clone());
        child.add_node(grandchild.clone());

        let moved = Arc::new(AtomicUsize::new(0));
        let counter = moved.clone();
        grandchild
            .proceeder()
            .add_action(EventType::PositionChanged, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        root.set_position(Vec3::X);
        assert_eq!(moved.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removal_drops_the_subtree() {
        let root = node("root");
        let child = node("child");
        let grandchild = node("grandchild");
        root.add_node(child.clone());
        child.add_node(grandchild.clone());

        let watcher = grandchild.user();
        drop(grandchild);
        let child_id = child.identifier();
        drop(child);

        assert!(root.remove(child_id));
        assert!(watcher.is_expired());
        assert_eq!(root.count_descendants(), 0);
        assert!(!root.remove(child_id));
    }

    #[test]
    fn non_recursive_removal_keeps_children() {
        let root = node("root");
        let child = node("child");
        let a = node("a");
        let b = node("b");
        root.add_node(child.clone());
        child.add_node(a.clone());
        child.add_node(b.clone());

        assert!(root.remove_not_recursive(child.identifier()));
        assert!(child.parent().is_invalid());
        assert!(a.parent().ptr_eq(&root));
        assert!(b.parent().ptr_eq(&root));
        assert_eq!(root.proceeder().listeners(), vec!["a", "b"]);
        assert_eq!(child.proceeder().listener_count(), 0);
    }
}
