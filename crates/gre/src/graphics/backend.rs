use super::{BackendHandle, RenderingQuery, ShaderType, Viewport};
use glam::Vec3;
use gre_utils::Color;

/// The hardware side of rendering.
///
/// Implementations wrap a graphics API (or nothing, see [`super::HeadlessBackend`]). Failures
/// are reported as human readable logs, which end up stored in the resources that caused them.
pub trait RenderBackend: Send {
    fn name(&self) -> &str;

    /// Shading languages this backend is able to compile, like `GLSL`.
    fn shader_compilers(&self) -> &[&'static str];

    fn create_vertex_buffer(&mut self, vertices: &[Vec3]) -> BackendHandle;
    fn create_index_buffer(&mut self, indices: &[u32]) -> BackendHandle;

    /// Creates a texture, optionally loaded from given file.
    fn create_texture(&mut self, name: &str, file: Option<&str>) -> Result<BackendHandle, String>;

    fn compile_shader(&mut self, kind: ShaderType, source: &str) -> Result<BackendHandle, String>;
    fn link_program(&mut self, name: &str, shaders: &[BackendHandle])
        -> Result<BackendHandle, String>;

    /// Compiles a vertex and a fragment shader, and links them into a program.
    fn create_hardware_program(
        &mut self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<BackendHandle, String> {
        let vs = self.compile_shader(ShaderType::Vertex, vertex_source)?;
        let fs = self.compile_shader(ShaderType::Fragment, fragment_source)?;
        self.link_program(name, &[vs, fs])
    }

    fn draw_mesh(&mut self, vertices: BackendHandle, indices: BackendHandle);
    fn draw(&mut self, query: &RenderingQuery);

    fn set_clear_color(&mut self, color: Color);
    fn set_clear_depth(&mut self, depth: f32);
    fn set_viewport(&mut self, viewport: &Viewport);

    fn pre_render(&mut self, clear_color: Color);
    fn post_render(&mut self);
}
