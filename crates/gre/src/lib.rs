//! Gre is a small resource and event framework for rendering engines.
//!
//! Everything the engine touches is a [`resource::Resource`]: windows, renderers, shaders,
//! techniques, scenes and the managers owning them. Resources are shared through strong
//! [`handle::Holder`]s and observed through weak [`handle::User`]s, and they talk to each other
//! by dispatching [`event::Event`]s along a listener graph.
//!
//! Rendering and windowing live behind the [`graphics::RenderBackend`] and
//! [`window::WindowBackend`] traits. This crate ships headless implementations of both, which
//! record what they are asked to do.

// Lets `#[derive(HasProceeder)]` refer to `::gre` from within this crate too
extern crate self as gre;

pub mod application;
pub mod bus;
pub mod config;
pub mod context;
pub mod event;
pub mod graphics;
pub mod handle;
pub mod manager;
pub mod resource;
pub mod scene;
pub mod technique_parser;
pub mod variant;
pub mod window;

pub use gre_proc::HasProceeder;
pub use resource::{HasProceeder, Resource};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
