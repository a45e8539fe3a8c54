use super::{BackendHandle, RenderBackend, RenderingQuery, ShaderType, Viewport};
use crate::Resource;
use glam::Vec3;
use gre_utils::Color;
use log::*;
use parking_lot::Mutex;
use std::sync::Arc;

/// A call received by a [`HeadlessBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateVertexBuffer { count: usize },
    CreateIndexBuffer { count: usize },
    CreateTexture { name: String, file: Option<String> },
    CompileShader { kind: ShaderType },
    LinkProgram { name: String, shaders: usize },
    DrawMesh { vertices: BackendHandle },
    Draw { pass: String, program: Option<String>, nodes: usize },
    SetClearColor(Color),
    SetClearDepth(f32),
    SetViewport(Viewport),
    PreRender,
    PostRender,
}

/// Shared log of the calls made to a [`HeadlessBackend`], readable after the backend has been
/// handed over to a renderer.
///
/// Holds at most [`MAX_RECORDED_CALLS`] entries, the oldest half is dropped when it's full.
pub type CallLog = Arc<Mutex<Vec<BackendCall>>>;

pub const MAX_RECORDED_CALLS: usize = 1024;

/// A backend that renders nothing, and records what it's asked to do.
///
/// Shader sources containing `#error` fail to compile, with the rest of that line as the
/// error log.
pub struct HeadlessBackend {
    calls: CallLog,
    next_handle: u32,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            calls: CallLog::default(),
            next_handle: 1,
        }
    }

    pub fn call_log(&self) -> CallLog {
        self.calls.clone()
    }

    fn record(&self, call: BackendCall) {
        let mut calls = self.calls.lock();
        if calls.len() >= MAX_RECORDED_CALLS {
            calls.drain(..MAX_RECORDED_CALLS / 2);
        }
        calls.push(call);
    }

    fn allocate(&mut self) -> BackendHandle {
        let handle = BackendHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "Headless"
    }

    fn shader_compilers(&self) -> &[&'static str] {
        &["GLSL"]
    }

    fn create_vertex_buffer(&mut self, vertices: &[Vec3]) -> BackendHandle {
        self.record(BackendCall::CreateVertexBuffer {
            count: vertices.len(),
        });
        self.allocate()
    }

    fn create_index_buffer(&mut self, indices: &[u32]) -> BackendHandle {
        self.record(BackendCall::CreateIndexBuffer {
            count: indices.len(),
        });
        self.allocate()
    }

    fn create_texture(&mut self, name: &str, file: Option<&str>) -> Result<BackendHandle, String> {
        self.record(BackendCall::CreateTexture {
            name: name.to_owned(),
            file: file.map(str::to_owned),
        });
        Ok(self.allocate())
    }

    fn compile_shader(&mut self, kind: ShaderType, source: &str) -> Result<BackendHandle, String> {
        self.record(BackendCall::CompileShader { kind });
        if let Some(line) = source.lines().find(|l| l.trim_start().starts_with("#error")) {
            let message = line.trim_start().trim_start_matches("#error").trim();
            debug!("Headless {kind:?} shader compilation failed: {message}");
            return Err(message.to_owned());
        }
        Ok(self.allocate())
    }

    fn link_program(
        &mut self,
        name: &str,
        shaders: &[BackendHandle],
    ) -> Result<BackendHandle, String> {
        self.record(BackendCall::LinkProgram {
            name: name.to_owned(),
            shaders: shaders.len(),
        });
        if shaders.is_empty() {
            return Err(format!("program `{name}` has no shaders"));
        }
        Ok(self.allocate())
    }

    fn draw_mesh(&mut self, vertices: BackendHandle, _indices: BackendHandle) {
        self.record(BackendCall::DrawMesh { vertices });
    }

    fn draw(&mut self, query: &RenderingQuery) {
        self.record(BackendCall::Draw {
            pass: query.pass.clone(),
            program: query.program.lock().try_get().map(|p| p.name().to_owned()),
            nodes: query.nodes.len(),
        });
    }

    fn set_clear_color(&mut self, color: Color) {
        self.record(BackendCall::SetClearColor(color));
    }

    fn set_clear_depth(&mut self, depth: f32) {
        self.record(BackendCall::SetClearDepth(depth));
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.record(BackendCall::SetViewport(*viewport));
    }

    fn pre_render(&mut self, clear_color: Color) {
        self.record(BackendCall::SetClearColor(clear_color));
        self.record(BackendCall::PreRender);
    }

    fn post_render(&mut self) {
        self.record(BackendCall::PostRender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_directive_fails_compilation() {
        let mut backend = HeadlessBackend::new();
        let log = backend.call_log();

        assert!(backend
            .compile_shader(ShaderType::Vertex, "void main() {}")
            .is_ok());
        let error = backend
            .compile_shader(ShaderType::Fragment, "#version 330\n  #error missing output\n")
            .unwrap_err();
        assert_eq!(error, "missing output");

        assert_eq!(
            *log.lock(),
            vec![
                BackendCall::CompileShader {
                    kind: ShaderType::Vertex
                },
                BackendCall::CompileShader {
                    kind: ShaderType::Fragment
                },
            ]
        );
    }

    #[test]
    fn hardware_programs_compile_and_link() {
        let mut backend = HeadlessBackend::new();
        assert!(backend
            .create_hardware_program("basic", "void main() {}", "void main() {}")
            .is_ok());
        assert!(backend
            .create_hardware_program("broken", "#error nope", "void main() {}")
            .is_err());
        assert!(backend.link_program("empty", &[]).is_err());
    }

    #[test]
    fn call_log_stays_bounded() {
        let mut backend = HeadlessBackend::new();
        let log = backend.call_log();

        for _ in 0..10_000 {
            backend.pre_render(Color::BLACK);
            backend.draw_mesh(BackendHandle(1), BackendHandle(2));
            backend.post_render();
        }

        let log = log.lock();
        assert!(log.len() <= MAX_RECORDED_CALLS);
        assert!(log.len() >= MAX_RECORDED_CALLS / 2);
        assert_eq!(log.last(), Some(&BackendCall::PostRender));
    }
}
