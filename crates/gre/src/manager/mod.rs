//! Named registries of resources
//!
//! A [`Manager`] owns a [`Holder`] of every resource it loaded, indexed by a unique name, and
//! hands out [`User`]s. Resources are built by [`Loader`]s registered in the manager's
//! [`LoaderFactory`].
//!
//! Managers are resources themselves: every resource they load becomes one of their listeners,
//! so events sent to a manager (like the per-frame update) reach everything it manages.

use crate::{
    handle::{Holder, User},
    resource::{EventProceeder, Resource, ResourceIdentifier},
    HasProceeder,
};
use gre_utils::{pools, PoolCategory, PoolToken};
use log::*;
use parking_lot::RwLock;
use std::{
    mem,
    sync::atomic::{AtomicUsize, Ordering},
};
use thiserror::Error;

mod loader;
pub use loader::*;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no loader is able to load `{0}`")]
    NoLoader(String),
    #[error("loader `{0}` isn't registered")]
    MissingLoader(String),
    #[error("a resource named `{0}` is already loaded")]
    DuplicateName(String),
    #[error("couldn't load `{name}`")]
    LoaderFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("the loaded resource handle is invalid")]
    InvalidHandle,
}

/// Registry of resources of type `T`, indexed by name.
#[derive(HasProceeder)]
pub struct Manager<T: Resource> {
    proceeder: EventProceeder,
    loaders: RwLock<LoaderFactory<T>>,
    resources: RwLock<Vec<(String, Holder<T>)>>,
    unnamed_count: AtomicUsize,
    _token: PoolToken,
}

impl<T: Resource> Manager<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            proceeder: EventProceeder::new(name),
            loaders: RwLock::new(LoaderFactory::new()),
            resources: RwLock::new(vec![]),
            unnamed_count: AtomicUsize::new(0),
            _token: PoolToken::new(PoolCategory::Manager),
        }
    }

    pub fn register_loader(&self, key: impl Into<String>, loader: impl Loader<T> + 'static) {
        self.loaders.write().registers(key, Box::new(loader));
    }

    /// Gives access to the loader factory.
    pub fn with_loaders<R>(&self, f: impl FnOnce(&mut LoaderFactory<T>) -> R) -> R {
        f(&mut self.loaders.write())
    }

    /// Loads a resource, and registers it under given name.
    ///
    /// The loader named by the `"Loader"` option is used if present, otherwise the first
    /// registered loader that is able to load it. Failures are logged, and yield a null user.
    pub fn load(&self, name: &str, options: &LoaderOptions) -> User<T> {
        self.try_load(name, options).unwrap_or_else(|error| {
            warn!("Manager `{}`: {error:#}", self.name());
            User::null()
        })
    }

    /// Like [`Manager::load`], but reports what went wrong.
    pub fn try_load(&self, name: &str, options: &LoaderOptions) -> Result<User<T>, LoadError> {
        let name = self.resolve_name(name);
        if self.contains(&name) {
            return Err(LoadError::DuplicateName(name));
        }

        let holder = {
            let loaders = self.loaders.read();
            let loader = match options.get_str("Loader") {
                Some(key) => loaders
                    .get(key)
                    .ok_or_else(|| LoadError::MissingLoader(key.to_owned()))?,
                None => loaders
                    .find_best(&name, options)
                    .ok_or_else(|| LoadError::NoLoader(name.clone()))?,
            };
            debug!(
                "Manager `{}` loading `{name}` with `{}`",
                self.name(),
                loader.name()
            );
            loader
                .load(&name, options)
                .map_err(|source| LoadError::LoaderFailed {
                    name: name.clone(),
                    source,
                })?
        };

        self.register(name, holder)
    }

    /// Registers a resource built elsewhere, under its own name.
    pub fn load_holder(&self, holder: Holder<T>) -> User<T> {
        let Some(resource) = holder.try_get() else {
            warn!("Manager `{}`: tried to register a null holder", self.name());
            return User::null();
        };
        let name = self.resolve_name(resource.name());
        self.register(name, holder).unwrap_or_else(|error| {
            warn!("Manager `{}`: {error}", self.name());
            User::null()
        })
    }

    fn resolve_name(&self, name: &str) -> String {
        if name.is_empty() {
            let fallback = format!(
                "{}.{}",
                self.name(),
                self.unnamed_count.fetch_add(1, Ordering::Relaxed)
            );
            warn!("Manager `{}`: empty resource name, using `{fallback}`", self.name());
            fallback
        } else {
            name.to_owned()
        }
    }

    fn register(&self, name: String, holder: Holder<T>) -> Result<User<T>, LoadError> {
        if holder.is_invalid() {
            return Err(LoadError::InvalidHandle);
        }

        {
            let mut resources = self.resources.write();
            if resources.iter().any(|(n, _)| *n == name) {
                // `holder` is dropped after the lock is released
                drop(resources);
                return Err(LoadError::DuplicateName(name));
            }
            resources.push((name.clone(), holder.clone()));
        }

        if let Err(error) = self
            .proceeder
            .add_listener_as(name.as_str(), &holder.user().as_resource())
        {
            warn!(
                "Manager `{}`: `{name}` won't receive manager events: {error}",
                self.name()
            );
        }

        trace!("Manager `{}` registered `{name}`", self.name());
        Ok(holder.user())
    }

    pub fn get(&self, name: &str) -> User<T> {
        self.find_holder(name).user()
    }

    /// Null holder if nothing is registered under `name`.
    pub fn find_holder(&self, name: &str) -> Holder<T> {
        self.resources
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, holder)| holder.clone())
            .unwrap_or_default()
    }

    pub fn find_by_id(&self, identifier: ResourceIdentifier) -> Holder<T> {
        self.resources
            .read()
            .iter()
            .find(|(_, holder)| holder.identifier() == identifier)
            .map(|(_, holder)| holder.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.read().iter().any(|(n, _)| n == name)
    }

    /// Drops the registry's holder of given resource. The resource itself lives on as long as
    /// other holders of it exist.
    pub fn unload(&self, name: &str) -> bool {
        let removed = {
            let mut resources = self.resources.write();
            resources
                .iter()
                .position(|(n, _)| n == name)
                .map(|index| resources.remove(index))
        };
        match removed {
            Some((_, holder)) => {
                self.proceeder.remove_listener_by_id(holder.identifier());
                trace!("Manager `{}` unloaded `{name}`", self.name());
                drop(holder);
                true
            }
            None => false,
        }
    }

    /// Drops every holder of the registry, newest first.
    pub fn clear(&self) {
        let resources = mem::take(&mut *self.resources.write());
        for (_, holder) in resources.into_iter().rev() {
            self.proceeder.remove_listener_by_id(holder.identifier());
            drop(holder);
        }
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.resources
            .read()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn holders(&self) -> Vec<Holder<T>> {
        self.resources
            .read()
            .iter()
            .map(|(_, holder)| holder.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    /// Amount of live resources in the whole process.
    pub fn resource_usage(&self) -> usize {
        pools().current(PoolCategory::Resource)
    }
}

impl<T: Resource> Resource for Manager<T> {}

impl<T: Resource> Drop for Manager<T> {
    fn drop(&mut self) {
        let resources = mem::take(self.resources.get_mut());
        for (_, holder) in resources.into_iter().rev() {
            drop(holder);
        }
    }
}
