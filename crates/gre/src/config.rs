//! Engine configuration, read from a TOML file
//!
//! Every field is optional, missing ones take their default values:
//! ```toml
//! max_frames = 120
//! frame_time_ms = 16
//! techniques = ["assets/default.technique"]
//! shader_dirs = ["assets/shaders"]
//! close_on = ["AllWindowsClosed", "EscapeKey"]
//! clear_color = { r = 0.1, g = 0.1, b = 0.2 }
//!
//! [window]
//! title = "Demo"
//! width = 1280
//! height = 720
//! ```

use crate::application::CloseBehaviour;
use gre_utils::Color;
use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't read config file `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("couldn't parse config file `{path}`")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: String::from("Gre"),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CloseTrigger {
    AllWindowsClosed,
    EscapeKey,
    TerminateCalled,
}

impl From<CloseTrigger> for CloseBehaviour {
    fn from(value: CloseTrigger) -> Self {
        match value {
            CloseTrigger::AllWindowsClosed => CloseBehaviour::ALL_WINDOWS_CLOSED,
            CloseTrigger::EscapeKey => CloseBehaviour::ESCAPE_KEY,
            CloseTrigger::TerminateCalled => CloseBehaviour::TERMINATE_CALLED,
        }
    }
}

pub const DEFAULT_MAX_FRAMES: usize = 300;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub clear_color: Color,
    /// Amount of frames to run, 0 for no limit. Headless windows never close on their own,
    /// so the default is finite.
    pub max_frames: usize,
    /// Fixed time step reported by updates. Measured when missing.
    pub frame_time_ms: Option<u64>,
    /// Technique files loaded at startup
    pub techniques: Vec<PathBuf>,
    /// Directories searched for shader sources
    pub shader_dirs: Vec<PathBuf>,
    pub close_on: Vec<CloseTrigger>,
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            clear_color: Color::BLACK,
            max_frames: DEFAULT_MAX_FRAMES,
            frame_time_ms: None,
            techniques: vec![],
            shader_dirs: vec![],
            close_on: vec![
                CloseTrigger::AllWindowsClosed,
                CloseTrigger::EscapeKey,
                CloseTrigger::TerminateCalled,
            ],
            verbose: false,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&source).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    pub fn close_behaviour(&self) -> CloseBehaviour {
        self.close_on
            .iter()
            .fold(CloseBehaviour::empty(), |flags, trigger| flags | (*trigger).into())
    }

    pub fn frame_time(&self) -> Option<Duration> {
        self.frame_time_ms.map(Duration::from_millis)
    }

    /// `"WxH"`, the way window loaders expect it.
    pub fn window_size(&self) -> String {
        format!("{}x{}", self.window.width, self.window.height)
    }
}
