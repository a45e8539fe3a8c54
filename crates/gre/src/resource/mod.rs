//! Resources and the listener graph
//!
//! A resource is any object implementing [`Resource`]. Each one embeds an [`EventProceeder`],
//! which holds its name and identifier, and the list of listeners it forwards events to.
//! Listeners are held weakly, so the graph never keeps anything alive by itself.
//!
//! ## Dispatching
//! [`EventProceeder::send_event`] walks the listeners in registration order and calls their
//! [`Resource::on_event`]. The default implementation of it:
//!  1. forwards the event to the resource's own listeners (unless the event asks not to, or the
//!     resource doesn't transmit events),
//!  2. calls the typed handler [`Resource::handle_event`], if [`Resource::handles`] the event
//!     type,
//!  3. runs actions registered for the event type,
//!  4. runs, and forgets, callbacks registered with [`EventProceeder::on_next_event`].
//!
//! ## Lifecycle
//! When a resource is destroyed, it unregisters itself from every resource it listens to, and
//! then emits a last [`EventType::ResourceUnloaded`] event to its own listeners.

use crate::{
    event::{Event, EventType},
    handle::{Holder, User},
};
use std::{
    any::Any,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use thiserror::Error;

mod keyboard;
mod listener;
mod proceeder;

pub use keyboard::{Keyboard, KeyboardLoader};
pub use listener::GenericListener;
pub use proceeder::{EventFilter, EventProceeder};

/// Process-unique identifier of a resource.
pub type ResourceIdentifier = u64;

pub type ResourceHolder = Holder<dyn Resource>;
pub type ResourceUser = User<dyn Resource>;

static NEXT_IDENTIFIER: AtomicU64 = AtomicU64::new(1);

/// Generates a new, never used before resource identifier. Zero is never generated.
pub fn next_identifier() -> ResourceIdentifier {
    NEXT_IDENTIFIER.fetch_add(1, Ordering::Relaxed)
}

/// Type erasure helpers, implemented for everything.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Access to the [`EventProceeder`] of a resource. Usually derived with
/// `#[derive(HasProceeder)]`.
pub trait HasProceeder {
    fn proceeder(&self) -> &EventProceeder;
}

/// A named object that takes part in the listener graph.
pub trait Resource: HasProceeder + AsAny {
    /// Whether the typed handler wants events of given type.
    fn handles(&self, _kind: EventType) -> bool {
        false
    }

    /// Typed handler, called only for events that [`Resource::handles`].
    fn handle_event(&self, _event: &Event) {}

    /// Entry point of events sent to this resource.
    fn on_event(&self, event: &Event) {
        self.proceeder().process(self, event);
    }

    fn name(&self) -> &str {
        self.proceeder().name()
    }

    fn identifier(&self) -> ResourceIdentifier {
        self.proceeder().identifier()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    #[error("a listener named `{0}` is already registered")]
    DuplicateName(String),
    #[error("the listener handle is invalid")]
    InvalidListener,
    #[error("resource `{0}` isn't bound to a handle (create it with `Holder::new_resource`)")]
    Unbound(String),
}
