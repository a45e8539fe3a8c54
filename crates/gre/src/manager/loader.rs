use crate::{handle::Holder, variant::Variant};
use ahash::AHashMap;
use gre_utils::{AnyResult, PoolCategory, PoolToken};
use log::*;

/// Options given to loaders. Keys are case-sensitive.
///
/// The `"Loader"` key is reserved: when present, it names the loader that has to be used.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    values: AHashMap<String, Variant>,
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder style [`LoaderOptions::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Variant>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Variant> {
        self.values.get(key)
    }

    /// Shorthand for string options. Empty strings count as missing.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Variant::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

/// Something that can construct resources of type `T`.
///
/// Loaders are registered as prototypes in a [`LoaderFactory`], and cloned when needed.
pub trait Loader<T: ?Sized>: Send + Sync {
    fn name(&self) -> &str;

    fn clone_loader(&self) -> Box<dyn Loader<T>>;

    /// Whether this loader is able to load given resource. Used when the loader isn't chosen
    /// explicitly.
    fn is_loadable(&self, _name: &str, _options: &LoaderOptions) -> bool {
        true
    }

    fn load(&self, name: &str, options: &LoaderOptions) -> AnyResult<Holder<T>>;
}

struct FactoryEntry<T: ?Sized> {
    key: String,
    loader: Box<dyn Loader<T>>,
    _token: PoolToken,
}

/// Ordered registry of loaders, keyed by name.
pub struct LoaderFactory<T: ?Sized> {
    entries: Vec<FactoryEntry<T>>,
}

impl<T: ?Sized> LoaderFactory<T> {
    pub fn new() -> Self {
        Self { entries: vec![] }
    }

    /// Registers a loader under given key. If the key is taken, the previous loader is replaced,
    /// but the registration keeps its original position.
    pub fn registers(&mut self, key: impl Into<String>, loader: Box<dyn Loader<T>>) {
        let key = key.into();
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => {
                warn!("Loader `{key}` registered twice, replacing the previous one");
                entry.loader = loader;
            }
            None => self.entries.push(FactoryEntry {
                key,
                loader,
                _token: PoolToken::new(PoolCategory::Loader),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&dyn Loader<T>> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.loader.as_ref())
    }

    /// A fresh copy of the loader registered under `key`.
    pub fn make(&self, key: &str) -> Option<Box<dyn Loader<T>>> {
        self.get(key).map(|loader| loader.clone_loader())
    }

    /// The first registered loader able to load given resource.
    pub fn find_best(&self, name: &str, options: &LoaderOptions) -> Option<&dyn Loader<T>> {
        self.entries
            .iter()
            .map(|entry| entry.loader.as_ref())
            .find(|loader| loader.is_loadable(name, options))
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.key != key);
        before != self.entries.len()
    }

    /// Registered keys, in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: ?Sized> Default for LoaderFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}
