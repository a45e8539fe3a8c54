use super::{BackendHandle, Renderer};
use crate::{
    handle::{Holder, User},
    manager::{Loader, LoaderOptions},
    resource::EventProceeder,
    HasProceeder, Resource,
};
use anyhow::anyhow;
use gre_utils::{AnyResult, RequireExt};

/// A texture living in the renderer's backend.
#[derive(HasProceeder)]
pub struct Texture {
    proceeder: EventProceeder,
    file: Option<String>,
    handle: BackendHandle,
}

impl Texture {
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn handle(&self) -> BackendHandle {
        self.handle
    }
}

impl Resource for Texture {}

/// Creates textures through a renderer. The optional `"Texture.File"` option names the image
/// to load; without it, an empty texture is created.
#[derive(Clone)]
pub struct TextureLoader {
    renderer: User<Renderer>,
}

impl TextureLoader {
    pub fn new(renderer: User<Renderer>) -> Self {
        Self { renderer }
    }
}

impl Loader<Texture> for TextureLoader {
    fn name(&self) -> &str {
        "TextureLoader"
    }

    fn clone_loader(&self) -> Box<dyn Loader<Texture>> {
        Box::new(self.clone())
    }

    fn is_loadable(&self, _name: &str, _options: &LoaderOptions) -> bool {
        !self.renderer.is_invalid()
    }

    fn load(&self, name: &str, options: &LoaderOptions) -> AnyResult<Holder<Texture>> {
        let renderer = self.renderer.lock();
        let renderer = renderer.try_get().require("the renderer")?;

        let file = options.get_str("Texture.File").map(str::to_owned);
        let handle = renderer
            .create_texture(name, file.as_deref())
            .map_err(|log| anyhow!("backend couldn't create texture `{name}`: {log}"))?;

        Ok(Holder::new_resource(Texture {
            proceeder: EventProceeder::new(name),
            file,
            handle,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        graphics::{BackendCall, HeadlessBackend},
        manager::Manager,
    };

    #[test]
    fn textures_are_created_by_the_backend() {
        let backend = HeadlessBackend::new();
        let log = backend.call_log();
        let renderer = Holder::new_resource(Renderer::new("renderer", Box::new(backend)));

        let textures = Holder::new_resource(Manager::<Texture>::new("textures"));
        textures.register_loader("default", TextureLoader::new(renderer.user()));

        let options = LoaderOptions::new().with("Texture.File", "grass.png");
        let grass = textures.load("grass", &options).lock();
        assert_eq!(grass.file(), Some("grass.png"));
        assert_eq!(
            log.lock().last(),
            Some(&BackendCall::CreateTexture {
                name: "grass".into(),
                file: Some("grass.png".into())
            })
        );

        drop(renderer);
        assert!(textures.load("dirt", &LoaderOptions::new()).is_invalid());
    }
}
