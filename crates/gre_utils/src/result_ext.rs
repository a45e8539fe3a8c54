//! Error helpers for loaders and file readers

use crate::AnyResult;
use anyhow::{anyhow, Context};
use std::{io, path::Path};

/// Turns a vanished dependency of a loader into an error naming it.
pub trait RequireExt<T> {
    /// `Err("<what> is gone")` when `None`.
    fn require(self, what: &str) -> AnyResult<T>;
}

impl<T> RequireExt<T> for Option<T> {
    fn require(self, what: &str) -> AnyResult<T> {
        self.ok_or_else(|| anyhow!("{what} is gone"))
    }
}

/// Attaches the kind and path of a file to read failures.
pub trait ReadFileExt<T> {
    fn reading(self, kind: &str, path: &Path) -> AnyResult<T>;
}

impl<T> ReadFileExt<T> for io::Result<T> {
    fn reading(self, kind: &str, path: &Path) -> AnyResult<T> {
        self.with_context(|| format!("couldn't read {kind} `{}`", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dependencies_are_named() {
        let renderer: Option<&str> = None;
        let error = renderer.require("the renderer").unwrap_err();
        assert_eq!(error.to_string(), "the renderer is gone");
        assert_eq!(Some(3).require("three").unwrap(), 3);
    }

    #[test]
    fn read_failures_name_the_file() {
        let path = Path::new("shaders/missing.glsl");
        let error = std::fs::read_to_string(path)
            .reading("shader", path)
            .unwrap_err();
        assert_eq!(error.to_string(), "couldn't read shader `shaders/missing.glsl`");
        assert!(error.root_cause().downcast_ref::<io::Error>().is_some());
    }
}
