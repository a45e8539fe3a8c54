use clap::Parser;
use glam::vec3;
use gre::{
    application::Application,
    config::EngineConfig,
    context::ResourceContext,
    handle::Holder,
    manager::LoaderOptions,
    scene::RenderScene,
    HasProceeder, Resource, VERSION,
};
use gre_utils::AnyResult;
use log::*;

mod cli;

pub fn main() -> AnyResult {
    let args = cli::Args::parse();
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    args.apply(&mut config);

    pretty_env_logger::formatted_builder()
        .format_indent(None)
        .format_timestamp(None)
        .filter_level(if config.verbose {
            LevelFilter::Trace
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    info!("Welcome to Gre {VERSION}");

    let context = ResourceContext::new();

    let renderer = context
        .renderers
        .try_load("MainRenderer", &LoaderOptions::new())?
        .lock();
    context.use_renderer(&renderer);

    let window = context
        .windows
        .try_load(
            "MainWindow",
            &LoaderOptions::new()
                .with("Window.Title", config.window.title.as_str())
                .with("Window.Size", config.window_size()),
        )?
        .lock();
    let keyboard = context
        .keyboards
        .try_load("MainKeyboard", &LoaderOptions::new())?;
    keyboard
        .lock()
        .proceeder()
        .listen(&window.user().as_resource(), None)?;

    for dir in &config.shader_dirs {
        context.programs.add_search_dir(dir);
    }
    for path in &config.techniques {
        match context.load_technique_file(path) {
            Ok(techniques) => info!(
                "Loaded {} techniques from `{}`",
                techniques.len(),
                path.display()
            ),
            Err(error) => warn!("Couldn't load technique file `{}`: {error:#}", path.display()),
        }
    }

    let scene = create_demo_scene(&context, &config)?;
    scene.set_renderer(renderer.user());
    scene.set_render_target(window.user());

    let app = Application::create("Gre", context);
    app.set_close_behaviour(config.close_behaviour());
    app.set_frame_time(config.frame_time());

    let frames = match config.max_frames {
        0 => app.run(),
        limit => app.run_frames(limit),
    };

    info!(
        "Window `{}` presented {} of {frames} frames",
        window.name(),
        window.frames_swapped()
    );
    info!("Goodbye");
    Ok(())
}

/// A scene with a few quads, drawn with the `Default` technique.
fn create_demo_scene(
    context: &ResourceContext,
    config: &EngineConfig,
) -> AnyResult<Holder<RenderScene>> {
    let scene = context
        .scenes
        .load_with_technique("MainScene", &LoaderOptions::new(), &context.techniques)
        .lock();
    if scene.is_invalid() {
        anyhow::bail!("couldn't create the demo scene");
    }
    scene.set_clear_color(config.clear_color);

    let root = scene.create_node("Root");
    scene.add_node(root.clone());

    let quad = context.meshes.try_load("Quad", &LoaderOptions::new())?.lock();
    for (i, x) in [-2.0, 0.0, 2.0].into_iter().enumerate() {
        let node = scene.create_node(format!("Quad{i}"));
        node.set_position(vec3(x, 0.0, -5.0));
        node.set_mesh(quad.clone());
        root.add_node(node);
    }

    debug!("Demo scene has {} nodes", scene.node_count());
    Ok(scene)
}
