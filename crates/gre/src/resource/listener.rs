use super::{EventProceeder, Resource};
use crate::HasProceeder;

/// A resource with no behavior of its own. Useful as a relay node in the listener graph, or as
/// an anchor for actions and one-shot callbacks.
#[derive(HasProceeder)]
pub struct GenericListener {
    proceeder: EventProceeder,
}

impl GenericListener {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            proceeder: EventProceeder::new(name),
        }
    }
}

impl Resource for GenericListener {}
