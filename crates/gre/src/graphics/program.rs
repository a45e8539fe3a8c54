use super::{BackendHandle, HardwareShader, Renderer, ShaderPathTableList, ShaderType};
use crate::{
    handle::{Holder, User},
    manager::{Loader, LoaderOptions, Manager},
    resource::EventProceeder,
    HasProceeder, Resource,
};
use gre_utils::{AnyResult, ReadFileExt};
use itertools::Itertools;
use log::*;
use parking_lot::{Mutex, RwLock};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Default)]
struct ProgramState {
    shaders: Vec<Holder<HardwareShader>>,
    handle: Option<BackendHandle>,
    error_log: String,
}

/// A set of shaders linked together.
#[derive(HasProceeder)]
pub struct HardwareProgram {
    proceeder: EventProceeder,
    state: Mutex<ProgramState>,
}

impl HardwareProgram {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            proceeder: EventProceeder::new(name),
            state: Mutex::new(ProgramState::default()),
        }
    }

    /// Attaches a shader. An already finalized program has to be finalized again.
    pub fn attach_shader(&self, shader: Holder<HardwareShader>) {
        if shader.is_invalid() {
            warn!("Program `{}`: can't attach a null shader", self.name());
            return;
        }
        let mut state = self.state.lock();
        state.handle = None;
        state.shaders.push(shader);
    }

    pub fn attach_shaders(&self, shaders: impl IntoIterator<Item = Holder<HardwareShader>>) {
        for shader in shaders {
            self.attach_shader(shader);
        }
    }

    pub fn shaders(&self) -> Vec<Holder<HardwareShader>> {
        self.state.lock().shaders.clone()
    }

    /// Compiles every attached shader and links the program. Returns whether the program is now
    /// usable; if it isn't, [`HardwareProgram::error_log`] tells why.
    pub fn finalize(&self, renderer: &Renderer) -> bool {
        let shaders = self.shaders();
        if shaders.is_empty() {
            return self.fail(format!("program `{}` has no shaders", self.name()));
        }

        let failed = shaders
            .iter()
            .filter(|shader| !shader.compile(renderer))
            .map(|shader| format!("{}: {}", shader.name(), shader.error_log()))
            .join("\n");
        if !failed.is_empty() {
            return self.fail(failed);
        }

        let handles = shaders.iter().filter_map(|s| s.handle()).collect_vec();
        match renderer.link_program(self.name(), &handles) {
            Ok(handle) => {
                debug!("Program `{}` finalized", self.name());
                let mut state = self.state.lock();
                state.handle = Some(handle);
                state.error_log.clear();
                true
            }
            Err(log) => self.fail(log),
        }
    }

    fn fail(&self, log: String) -> bool {
        warn!("Couldn't finalize program `{}`: {log}", self.name());
        let mut state = self.state.lock();
        state.handle = None;
        state.error_log = log;
        false
    }

    pub fn is_finalized(&self) -> bool {
        self.state.lock().handle.is_some()
    }

    pub fn handle(&self) -> Option<BackendHandle> {
        self.state.lock().handle
    }

    pub fn error_log(&self) -> String {
        self.state.lock().error_log.clone()
    }
}

impl Resource for HardwareProgram {}

/// Creates empty programs, to which shaders are attached later.
#[derive(Clone, Default)]
pub struct BlankProgramLoader;

impl Loader<HardwareProgram> for BlankProgramLoader {
    fn name(&self) -> &str {
        "BlankProgramLoader"
    }

    fn clone_loader(&self) -> Box<dyn Loader<HardwareProgram>> {
        Box::new(self.clone())
    }

    fn load(&self, name: &str, _options: &LoaderOptions) -> AnyResult<Holder<HardwareProgram>> {
        Ok(Holder::new_resource(HardwareProgram::new(name)))
    }
}

/// Reads shader sources. Given the path as written in a technique file.
pub type SourceReader = Arc<dyn Fn(&Path) -> AnyResult<String> + Send + Sync>;

/// Loads shaders and programs, and keeps them in dedicated managers.
///
/// Shader sources are read through the source reader if one is set, and otherwise from the
/// file system, trying the search directories in order and then the path itself.
pub struct ProgramManager {
    shaders: Holder<Manager<HardwareShader>>,
    programs: Holder<Manager<HardwareProgram>>,
    renderer: RwLock<User<Renderer>>,
    search_dirs: RwLock<Vec<PathBuf>>,
    reader: RwLock<Option<SourceReader>>,
}

impl ProgramManager {
    pub fn new() -> Self {
        let programs = Holder::new_resource(Manager::new("ProgramManager"));
        programs.register_loader("Blank", BlankProgramLoader);
        Self {
            shaders: Holder::new_resource(Manager::new("ShaderManager")),
            programs,
            renderer: RwLock::new(User::null()),
            search_dirs: RwLock::new(vec![]),
            reader: RwLock::new(None),
        }
    }

    pub fn shaders(&self) -> &Holder<Manager<HardwareShader>> {
        &self.shaders
    }

    pub fn programs(&self) -> &Holder<Manager<HardwareProgram>> {
        &self.programs
    }

    /// Sets the renderer used to pick shader compilers and to finalize programs.
    pub fn set_renderer(&self, renderer: User<Renderer>) {
        *self.renderer.write() = renderer;
    }

    pub fn renderer(&self) -> Holder<Renderer> {
        self.renderer.read().lock()
    }

    pub fn add_search_dir(&self, dir: impl Into<PathBuf>) {
        self.search_dirs.write().push(dir.into());
    }

    pub fn set_source_reader(
        &self,
        reader: impl Fn(&Path) -> AnyResult<String> + Send + Sync + 'static,
    ) {
        *self.reader.write() = Some(Arc::new(reader));
    }

    fn read_source(&self, path: &Path) -> AnyResult<String> {
        if let Some(reader) = self.reader.read().clone() {
            return reader(path);
        }

        let candidate = self
            .search_dirs
            .read()
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.is_file())
            .unwrap_or_else(|| path.to_path_buf());
        fs::read_to_string(&candidate).reading("shader", &candidate)
    }

    /// Loads a shader from given path, or returns the already loaded one. Shaders are registered
    /// under their path.
    pub fn load_shader(&self, kind: ShaderType, path: &str) -> Holder<HardwareShader> {
        let existing = self.shaders.find_holder(path);
        if !existing.is_invalid() {
            if existing.kind() != kind {
                warn!(
                    "Shader `{path}` is loaded as {:?}, not as {kind:?}",
                    existing.kind()
                );
                return Holder::null();
            }
            return existing;
        }

        let source = match self.read_source(Path::new(path)) {
            Ok(source) => source,
            Err(error) => {
                warn!("{error:#}");
                return Holder::null();
            }
        };

        let shader = Holder::new_resource(HardwareShader::new(
            path,
            kind,
            source,
            Some(PathBuf::from(path)),
        ));
        self.shaders.load_holder(shader).lock()
    }

    /// Loads one shader per stage, each from the path matching a compiler of the renderer.
    /// Either every stage loads, or the result is empty.
    pub fn load_shader_tables(&self, tables: &ShaderPathTableList) -> Vec<Holder<HardwareShader>> {
        let renderer = self.renderer();
        let Some(renderer) = renderer.try_get() else {
            warn!("Can't pick shader compilers without a renderer");
            return vec![];
        };

        let mut loaded = Vec::with_capacity(2);
        for (kind, table) in tables.iter() {
            let compilers = renderer.shader_compilers().iter().map(String::as_str);
            let Some(path) = table.find_for(compilers) else {
                warn!(
                    "No {kind:?} shader for compilers {:?}",
                    renderer.shader_compilers()
                );
                return vec![];
            };

            let shader = self.load_shader(kind, path);
            if shader.is_invalid() {
                return vec![];
            }
            loaded.push(shader);
        }
        loaded
    }

    /// Creates an empty program. Null if the name is taken.
    pub fn load_program(&self, name: &str) -> Holder<HardwareProgram> {
        let options = LoaderOptions::new().with("Loader", "Blank");
        self.programs.load(name, &options).lock()
    }

    pub fn get_program(&self, name: &str) -> Holder<HardwareProgram> {
        self.programs.find_holder(name)
    }

    /// Loads the shaders of given tables, and links them into a new program.
    pub fn create_program(
        &self,
        name: &str,
        tables: &ShaderPathTableList,
    ) -> Holder<HardwareProgram> {
        let shaders = self.load_shader_tables(tables);
        if shaders.is_empty() {
            warn!("Program `{name}` has no loadable shaders");
            return Holder::null();
        }

        let program = self.load_program(name);
        let Some(p) = program.try_get() else {
            return Holder::null();
        };
        p.attach_shaders(shaders);
        if let Some(renderer) = self.renderer().try_get() {
            p.finalize(renderer);
        }
        program
    }

    /// Drops the programs first, then the shaders.
    pub fn clear(&self) {
        self.programs.clear();
        self.shaders.clear();
    }
}

impl Default for ProgramManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::{HeadlessBackend, ShaderPathTable};

    fn manager_with_sources() -> (ProgramManager, Holder<Renderer>) {
        let renderer = Holder::new_resource(Renderer::new(
            "renderer",
            Box::new(HeadlessBackend::new()),
        ));
        let manager = ProgramManager::new();
        manager.set_renderer(renderer.user());
        manager.set_source_reader(|path| match path.to_str() {
            Some("v.glsl") | Some("f.glsl") => Ok("void main() {}".into()),
            Some("broken.glsl") => Ok("#error broken on purpose".into()),
            _ => anyhow::bail!("no such file: {}", path.display()),
        });
        (manager, renderer)
    }

    fn tables(vertex: &str, fragment: &str) -> ShaderPathTableList {
        let mut list = ShaderPathTableList::new();
        list.add(ShaderType::Vertex, [("GLSL", vertex)].into_iter().collect());
        list.add(ShaderType::Fragment, [("GLSL", fragment)].into_iter().collect());
        list
    }

    #[test]
    fn programs_are_finalized_from_tables() {
        let (manager, _renderer) = manager_with_sources();
        let program = manager.create_program("basic", &tables("v.glsl", "f.glsl"));
        assert!(program.is_finalized());
        assert_eq!(program.shaders().len(), 2);
        assert!(manager.get_program("basic").ptr_eq(&program));

        // Shaders are shared by path
        let again = manager.create_program("other", &tables("v.glsl", "f.glsl"));
        assert!(again.shaders()[0].ptr_eq(&program.shaders()[0]));
        assert_eq!(manager.shaders().len(), 2);
    }

    #[test]
    fn failures_are_reported() {
        let (manager, _renderer) = manager_with_sources();
        let program = manager.create_program("broken", &tables("broken.glsl", "f.glsl"));
        assert!(!program.is_finalized());
        assert!(program.error_log().contains("broken on purpose"));

        assert!(manager
            .create_program("missing", &tables("nope.glsl", "f.glsl"))
            .is_invalid());

        let mut hlsl_only = ShaderPathTableList::new();
        hlsl_only.add(
            ShaderType::Vertex,
            ShaderPathTable::from_iter([("HLSL", "v.hlsl")]),
        );
        assert!(manager.load_shader_tables(&hlsl_only).is_empty());
    }

    #[test]
    fn program_names_are_unique() {
        let (manager, _renderer) = manager_with_sources();
        assert!(!manager.load_program("p").is_invalid());
        assert!(manager.load_program("p").is_invalid());
    }
}
