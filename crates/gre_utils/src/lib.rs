//! Various utilities shared by the Gre crates

mod color;
pub use color::*;

mod pools;
pub use pools::*;

mod result_ext;
pub use result_ext::{ReadFileExt, RequireExt};

pub type AnyResult<T = (), E = anyhow::Error> = anyhow::Result<T, E>;

/// Used by the `gre_proc::ext_repr` proc macro
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid enum input")]
pub struct EnumParseError;
