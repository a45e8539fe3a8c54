use super::{BackendHandle, Renderer};
use crate::{resource::EventProceeder, HasProceeder, Resource};
use ahash::AHashMap;
use gre_proc::ext_repr;
use log::*;
use parking_lot::Mutex;
use std::path::PathBuf;

#[ext_repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShaderType {
    #[default]
    Null,
    Vertex,
    Fragment,
}

#[derive(Default)]
struct ShaderState {
    handle: Option<BackendHandle>,
    error_log: String,
}

/// A shader stage's source, compiled on demand by a [`Renderer`].
#[derive(HasProceeder)]
pub struct HardwareShader {
    proceeder: EventProceeder,
    kind: ShaderType,
    source: String,
    filepath: Option<PathBuf>,
    state: Mutex<ShaderState>,
}

impl HardwareShader {
    pub fn new(
        name: impl Into<String>,
        kind: ShaderType,
        source: impl Into<String>,
        filepath: Option<PathBuf>,
    ) -> Self {
        Self {
            proceeder: EventProceeder::new(name),
            kind,
            source: source.into(),
            filepath,
            state: Mutex::new(ShaderState::default()),
        }
    }

    pub fn kind(&self) -> ShaderType {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn filepath(&self) -> Option<&PathBuf> {
        self.filepath.as_ref()
    }

    /// Compiles the shader, if it isn't compiled already. On failure, the backend's message is
    /// kept in [`HardwareShader::error_log`].
    pub fn compile(&self, renderer: &Renderer) -> bool {
        let mut state = self.state.lock();
        if state.handle.is_some() {
            return true;
        }

        match renderer.compile_shader(self.kind, &self.source) {
            Ok(handle) => {
                trace!("Compiled {:?} shader `{}`", self.kind, self.name());
                state.handle = Some(handle);
                state.error_log.clear();
                true
            }
            Err(log) => {
                warn!("Couldn't compile shader `{}`: {log}", self.name());
                state.error_log = log;
                false
            }
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.state.lock().handle.is_some()
    }

    pub fn handle(&self) -> Option<BackendHandle> {
        self.state.lock().handle
    }

    /// Empty unless the last compilation failed.
    pub fn error_log(&self) -> String {
        self.state.lock().error_log.clone()
    }
}

impl Resource for HardwareShader {}

/// Paths of one shader stage, indexed by shader compiler name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderPathTable {
    paths: AHashMap<String, String>,
}

impl ShaderPathTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, compiler: impl Into<String>, path: impl Into<String>) {
        self.paths.insert(compiler.into(), path.into());
    }

    pub fn get(&self, compiler: &str) -> Option<&str> {
        self.paths.get(compiler).map(String::as_str)
    }

    /// The path for the first of given compilers that has one.
    pub fn find_for<'a>(&self, compilers: impl IntoIterator<Item = &'a str>) -> Option<&str> {
        compilers.into_iter().find_map(|compiler| {
            self.paths
                .iter()
                .find(|(c, _)| c.eq_ignore_ascii_case(compiler))
                .map(|(_, path)| path.as_str())
        })
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ShaderPathTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (compiler, path) in iter {
            table.insert(compiler, path);
        }
        table
    }
}

/// Path tables of all stages of a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderPathTableList {
    tables: Vec<(ShaderType, ShaderPathTable)>,
}

impl ShaderPathTableList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the table of given stage, replacing any previous one.
    pub fn add(&mut self, kind: ShaderType, table: ShaderPathTable) {
        match self.tables.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, existing)) => *existing = table,
            None => self.tables.push((kind, table)),
        }
    }

    pub fn get(&self, kind: ShaderType) -> Option<&ShaderPathTable> {
        self.tables
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, table)| table)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShaderType, &ShaderPathTable)> {
        self.tables.iter().map(|(kind, table)| (*kind, table))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::HeadlessBackend;

    #[test]
    fn failed_compilation_keeps_the_log() {
        let renderer = Renderer::new("renderer", Box::new(HeadlessBackend::new()));
        let broken = HardwareShader::new("broken", ShaderType::Vertex, "#error no main", None);
        assert!(!broken.compile(&renderer));
        assert!(!broken.is_compiled());
        assert_eq!(broken.error_log(), "no main");

        let fine = HardwareShader::new("fine", ShaderType::Fragment, "void main() {}", None);
        assert!(fine.compile(&renderer));
        assert!(fine.compile(&renderer));
        assert!(fine.error_log().is_empty());
    }

    #[test]
    fn path_tables_match_compilers() {
        let table: ShaderPathTable = [("HLSL", "v.hlsl"), ("GLSL", "v.glsl")].into_iter().collect();
        assert_eq!(table.find_for(["glsl"]), Some("v.glsl"));
        assert_eq!(table.find_for(["MSL", "HLSL"]), Some("v.hlsl"));
        assert_eq!(table.find_for(["MSL"]), None);

        let mut list = ShaderPathTableList::new();
        list.add(ShaderType::Vertex, table);
        list.add(ShaderType::Vertex, ShaderPathTable::new());
        assert!(list.get(ShaderType::Vertex).map_or(false, |t| t.is_empty()));
        assert!(list.get(ShaderType::Fragment).is_none());
    }
}
