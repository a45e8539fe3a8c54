use super::{Camera, RenderNode};
use crate::{
    graphics::{HardwareProgram, ProgramManager, Viewport},
    handle::{Holder, User},
    manager::{Loader, LoaderOptions, Manager},
    resource::{EventProceeder, ResourceIdentifier},
    technique_parser::TechniqueFileParser,
    HasProceeder, Resource,
};
use ahash::AHashMap;
use gre_proc::ext_repr;
use gre_utils::AnyResult;
use log::*;
use parking_lot::RwLock;

#[ext_repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightingMode {
    #[default]
    None,
    PerVertex,
    PerFragment,
}

/// Shader parameters a technique may give a custom name to.
#[ext_repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TechniqueParam {
    ModelMatrix,
    ViewMatrix,
    ProjectionMatrix,
    CameraPosition,
    LightPosition,
    LightColor,
    MaterialColor,
    Texture0,
}

/// Vertex attributes a technique may give a custom name to.
#[ext_repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttrib {
    Position,
    Normal,
    Color,
    TexCoord,
    Tangent,
}

/// One rendering pass of a technique.
#[derive(Debug, Clone)]
pub struct Pass {
    pub name: String,
    /// Overrides the technique's program
    pub program: Option<User<HardwareProgram>>,
    /// Overrides the technique's viewport
    pub viewport: Option<Viewport>,
}

impl Pass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: None,
            viewport: None,
        }
    }

    pub fn with_program(mut self, program: User<HardwareProgram>) -> Self {
        self.program = Some(program);
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }
}

struct TechniqueState {
    program: Holder<HardwareProgram>,
    lighting_mode: LightingMode,
    aliases: AHashMap<TechniqueParam, String>,
    attributes: AHashMap<VertexAttrib, String>,
    passes: Vec<Pass>,
    subtechniques: Vec<Holder<Technique>>,
    activated: bool,
    exclusive: bool,
    nodes: Vec<User<RenderNode>>,
    viewport: Viewport,
    camera: Camera,
}

/// Describes how a scene is drawn: with which program, in which passes, from which camera.
///
/// New techniques are activated, draw the whole scene, and have a single pass named `Main`.
#[derive(HasProceeder)]
pub struct Technique {
    proceeder: EventProceeder,
    state: RwLock<TechniqueState>,
}

impl Technique {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            proceeder: EventProceeder::new(name),
            state: RwLock::new(TechniqueState {
                program: Holder::null(),
                lighting_mode: LightingMode::None,
                aliases: AHashMap::new(),
                attributes: AHashMap::new(),
                passes: vec![Pass::new("Main")],
                subtechniques: vec![],
                activated: true,
                exclusive: false,
                nodes: vec![],
                viewport: Viewport::FULL,
                camera: Camera::default(),
            }),
        }
    }

    pub fn program(&self) -> Holder<HardwareProgram> {
        self.state.read().program.clone()
    }

    pub fn set_program(&self, program: Holder<HardwareProgram>) {
        if program.is_invalid() {
            warn!("Technique `{}`: setting a null program", self.name());
        }
        self.state.write().program = program;
    }

    pub fn lighting_mode(&self) -> LightingMode {
        self.state.read().lighting_mode
    }

    pub fn set_lighting_mode(&self, mode: LightingMode) {
        self.state.write().lighting_mode = mode;
    }

    /// Name given to a shader parameter.
    pub fn alias(&self, param: TechniqueParam) -> Option<String> {
        self.state.read().aliases.get(&param).cloned()
    }

    pub fn set_alias(&self, param: TechniqueParam, name: impl Into<String>) {
        self.state.write().aliases.insert(param, name.into());
    }

    /// Name given to a vertex attribute.
    pub fn attrib_name(&self, attrib: VertexAttrib) -> Option<String> {
        self.state.read().attributes.get(&attrib).cloned()
    }

    pub fn set_attrib_name(&self, attrib: VertexAttrib, name: impl Into<String>) {
        self.state.write().attributes.insert(attrib, name.into());
    }

    pub fn passes(&self) -> Vec<Pass> {
        self.state.read().passes.clone()
    }

    pub fn add_pass(&self, pass: Pass) {
        self.state.write().passes.push(pass);
    }

    pub fn clear_passes(&self) {
        self.state.write().passes.clear();
    }

    pub fn subtechniques(&self) -> Vec<Holder<Technique>> {
        self.state.read().subtechniques.clone()
    }

    /// Adds a technique drawn right after this one's passes.
    pub fn add_subtechnique(&self, technique: Holder<Technique>) -> bool {
        let Some(sub) = technique.try_get() else {
            return false;
        };
        if sub.identifier() == self.identifier() || sub.contains_subtechnique(self.identifier()) {
            warn!(
                "Technique `{}`: `{}` can't be its subtechnique",
                self.name(),
                sub.name()
            );
            return false;
        }
        self.state.write().subtechniques.push(technique);
        true
    }

    fn contains_subtechnique(&self, identifier: ResourceIdentifier) -> bool {
        self.subtechniques().iter().any(|sub| {
            sub.identifier() == identifier || sub.contains_subtechnique(identifier)
        })
    }

    pub fn is_activated(&self) -> bool {
        self.state.read().activated
    }

    pub fn set_activated(&self, activated: bool) {
        self.state.write().activated = activated;
    }

    /// Exclusive techniques only draw their own set of nodes, instead of the whole scene.
    pub fn is_exclusive(&self) -> bool {
        self.state.read().exclusive
    }

    pub fn set_exclusive(&self, exclusive: bool) {
        self.state.write().exclusive = exclusive;
    }

    pub fn add_exclusive_node(&self, node: &Holder<RenderNode>) {
        self.state.write().nodes.push(node.user());
    }

    /// The live exclusive nodes.
    pub fn exclusive_nodes(&self) -> Vec<Holder<RenderNode>> {
        let mut state = self.state.write();
        state.nodes.retain(|node| !node.is_expired());
        state
            .nodes
            .iter()
            .map(User::lock)
            .filter(|node| !node.is_invalid())
            .collect()
    }

    pub fn viewport(&self) -> Viewport {
        self.state.read().viewport
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.state.write().viewport = viewport;
    }

    pub fn camera(&self) -> Camera {
        self.state.read().camera
    }

    pub fn set_camera(&self, camera: Camera) {
        self.state.write().camera = camera;
    }
}

impl Resource for Technique {}

/// Creates default techniques. See [`Technique::new`].
#[derive(Clone, Default)]
pub struct BlankTechniqueLoader;

impl Loader<Technique> for BlankTechniqueLoader {
    fn name(&self) -> &str {
        "BlankTechniqueLoader"
    }

    fn clone_loader(&self) -> Box<dyn Loader<Technique>> {
        Box::new(self.clone())
    }

    fn load(&self, name: &str, _options: &LoaderOptions) -> AnyResult<Holder<Technique>> {
        Ok(Holder::new_resource(Technique::new(name)))
    }
}

impl Manager<Technique> {
    /// A technique manager, able to create blank techniques.
    pub fn techniques(name: impl Into<String>) -> Self {
        let manager = Self::new(name);
        manager.register_loader("Blank", BlankTechniqueLoader);
        manager
    }

    /// Creates and registers a blank technique. Null if the name is taken.
    pub fn load_blank(&self, name: &str) -> Holder<Technique> {
        let options = LoaderOptions::new().with("Loader", "Blank");
        self.load(name, &options).lock()
    }

    /// Creates the programs and techniques described by a technique file.
    pub fn load_from_source(
        &self,
        path: &str,
        source: &str,
        programs: &ProgramManager,
    ) -> Vec<Holder<Technique>> {
        TechniqueFileParser::process(path, source, programs, self)
    }
}
