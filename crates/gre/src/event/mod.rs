//! Typed events
//!
//! An [`Event`] is an immutable description of something that happened to a resource (its
//! emitter), plus two atomic flags that listeners may flip while the event is being dispatched.
//! The payload is an [`EventPayload`] variant, whose tag is the [`EventType`]. Handlers that know
//! which kind of event they got can access its data with [`Event::to`].

use crate::{
    resource::{ResourceIdentifier, ResourceUser},
    variant::VariantMap,
};
use glam::Vec3;
use gre_proc::ext_repr;
use gre_utils::{PoolCategory, PoolToken};
use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use thiserror::Error;

mod key;
pub use key::*;

#[ext_repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    KeyDown,
    KeyUp,
    LeftMousePress,
    LeftMouseRelease,
    RightMousePress,
    RightMouseRelease,
    MouseExitedWindow,
    MouseEnteredWindow,
    CursorMoved,

    Update,

    WindowSized,
    WindowMoved,
    WindowExposed,
    WindowWillClose,
    WindowTitleChanged,
    WindowAttachContext,
    WindowDetachContext,
    WindowFocused,
    WindowUnfocused,
    WindowClosed,
    LastWindowClosed,

    RenderTargetWillClose,
    RenderTargetClosed,
    RenderTargetChangedRenderContext,
    RenderTargetChangedFramebuffer,

    RendererRegisteredTarget,
    RendererUnregisteredTarget,
    RenderScenePreRender,
    RenderScenePostRender,

    ResourceUnloaded,
    PositionChanged,
    DirectionChanged,
    Custom,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str((*self).into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateEvent {
    /// Time elapsed since the previous update
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: KeyModifiers,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorMovedEvent {
    pub delta_x: f32,
    pub delta_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMovedEvent {
    pub left: i32,
    pub top: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSizedEvent {
    pub width: u32,
    pub height: u32,
}

/// An area of a window, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Surface {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowExposedEvent {
    pub surface: Surface,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowTitleChangedEvent {
    pub title: String,
}

/// Payload of render target, renderer and scene rendering events.
#[derive(Debug, Clone)]
pub struct TargetEvent {
    /// The render target (or scene) concerned by the event
    pub target: ResourceUser,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionChangedEvent {
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionChangedEvent {
    pub direction: Vec3,
}

#[derive(Debug, Clone, Default)]
pub struct CustomEvent {
    pub properties: VariantMap,
}

#[derive(Debug, Clone)]
pub enum EventPayload {
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    LeftMousePress,
    LeftMouseRelease,
    RightMousePress,
    RightMouseRelease,
    MouseExitedWindow,
    MouseEnteredWindow,
    CursorMoved(CursorMovedEvent),

    Update(UpdateEvent),

    WindowSized(WindowSizedEvent),
    WindowMoved(WindowMovedEvent),
    WindowExposed(WindowExposedEvent),
    WindowWillClose,
    WindowTitleChanged(WindowTitleChangedEvent),
    WindowAttachContext,
    WindowDetachContext,
    WindowFocused,
    WindowUnfocused,
    WindowClosed,
    LastWindowClosed,

    RenderTargetWillClose(TargetEvent),
    RenderTargetClosed(TargetEvent),
    RenderTargetChangedRenderContext(TargetEvent),
    RenderTargetChangedFramebuffer(TargetEvent),

    RendererRegisteredTarget(TargetEvent),
    RendererUnregisteredTarget(TargetEvent),
    RenderScenePreRender(TargetEvent),
    RenderScenePostRender(TargetEvent),

    ResourceUnloaded,
    PositionChanged(PositionChangedEvent),
    DirectionChanged(DirectionChangedEvent),
    Custom(CustomEvent),
}

macro_rules! payload_kinds {
    ($payload:expr, [$($unit:ident),*], [$($data:ident),*]) => {
        match $payload {
            $(EventPayload::$unit => EventType::$unit,)*
            $(EventPayload::$data(_) => EventType::$data,)*
        }
    };
}

impl EventPayload {
    pub fn kind(&self) -> EventType {
        payload_kinds!(
            self,
            [
                LeftMousePress,
                LeftMouseRelease,
                RightMousePress,
                RightMouseRelease,
                MouseExitedWindow,
                MouseEnteredWindow,
                WindowWillClose,
                WindowAttachContext,
                WindowDetachContext,
                WindowFocused,
                WindowUnfocused,
                WindowClosed,
                LastWindowClosed,
                ResourceUnloaded
            ],
            [
                KeyDown,
                KeyUp,
                CursorMoved,
                Update,
                WindowSized,
                WindowMoved,
                WindowExposed,
                WindowTitleChanged,
                RenderTargetWillClose,
                RenderTargetClosed,
                RenderTargetChangedRenderContext,
                RenderTargetChangedFramebuffer,
                RendererRegisteredTarget,
                RendererUnregisteredTarget,
                RenderScenePreRender,
                RenderScenePostRender,
                PositionChanged,
                DirectionChanged,
                Custom
            ]
        )
    }
}

/// Implemented by payload structs that can be extracted out of an [`Event`].
pub trait EventData: Sized {
    fn from_payload(payload: &EventPayload) -> Option<&Self>;
}

macro_rules! impl_event_data {
    ($ty:ty => $($variant:ident)|+) => {
        impl EventData for $ty {
            fn from_payload(payload: &EventPayload) -> Option<&Self> {
                match payload {
                    $(EventPayload::$variant(data))|+ => Some(data),
                    _ => None,
                }
            }
        }
    };
}

impl_event_data!(UpdateEvent => Update);
impl_event_data!(KeyEvent => KeyDown | KeyUp);
impl_event_data!(CursorMovedEvent => CursorMoved);
impl_event_data!(WindowMovedEvent => WindowMoved);
impl_event_data!(WindowSizedEvent => WindowSized);
impl_event_data!(WindowExposedEvent => WindowExposed);
impl_event_data!(WindowTitleChangedEvent => WindowTitleChanged);
impl_event_data!(PositionChangedEvent => PositionChanged);
impl_event_data!(DirectionChangedEvent => DirectionChanged);
impl_event_data!(CustomEvent => Custom);
impl_event_data!(TargetEvent =>
    RenderTargetWillClose
    | RenderTargetClosed
    | RenderTargetChangedRenderContext
    | RenderTargetChangedFramebuffer
    | RendererRegisteredTarget
    | RendererUnregisteredTarget
    | RenderScenePreRender
    | RenderScenePostRender
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event of type `{actual}` doesn't carry `{expected}`")]
pub struct EventCastError {
    pub actual: EventType,
    pub expected: &'static str,
}

/// Something that happened to a resource, on its way to the resource's listeners.
pub struct Event {
    emitter: ResourceUser,
    emitter_name: String,
    emitter_identifier: ResourceIdentifier,
    payload: EventPayload,
    should_stop_propagating: AtomicBool,
    no_sublisteners: AtomicBool,
    _token: PoolToken,
}

impl Event {
    /// Creates an event. The emitter's name and identifier are captured, since the emitter itself
    /// is only weakly referenced.
    pub fn new(
        emitter: ResourceUser,
        emitter_name: impl Into<String>,
        emitter_identifier: ResourceIdentifier,
        payload: EventPayload,
    ) -> Self {
        Self {
            emitter,
            emitter_name: emitter_name.into(),
            emitter_identifier,
            payload,
            should_stop_propagating: AtomicBool::new(false),
            no_sublisteners: AtomicBool::new(false),
            _token: PoolToken::new(PoolCategory::Event),
        }
    }

    /// An event with no emitter, for events that don't originate from a resource.
    pub fn orphan(payload: EventPayload) -> Self {
        Self::new(ResourceUser::null(), "", 0, payload)
    }

    #[inline]
    pub fn kind(&self) -> EventType {
        self.payload.kind()
    }

    pub fn emitter(&self) -> &ResourceUser {
        &self.emitter
    }

    pub fn emitter_name(&self) -> &str {
        &self.emitter_name
    }

    pub fn emitter_identifier(&self) -> ResourceIdentifier {
        self.emitter_identifier
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Extracts the payload data of this event.
    ///
    /// ## Panics
    /// Panics if the event doesn't carry a `T`. Use [`Event::try_to`] if that's not certain.
    pub fn to<T: EventData>(&self) -> &T {
        match self.try_to::<T>() {
            Ok(data) => data,
            Err(error) => panic!("{error}"),
        }
    }

    pub fn try_to<T: EventData>(&self) -> Result<&T, EventCastError> {
        T::from_payload(&self.payload).ok_or(EventCastError {
            actual: self.kind(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// When set, listeners that haven't received this event yet won't receive it anymore.
    pub fn should_stop_propagating(&self) -> bool {
        self.should_stop_propagating.load(Ordering::Acquire)
    }

    pub fn set_should_stop_propagating(&self, value: bool) {
        self.should_stop_propagating.store(value, Ordering::Release);
    }

    /// When set, listeners receive this event but don't forward it to their own listeners.
    pub fn no_sublisteners(&self) -> bool {
        self.no_sublisteners.load(Ordering::Acquire)
    }

    pub fn set_no_sublisteners(&self, value: bool) {
        self.no_sublisteners.store(value, Ordering::Release);
    }
}

impl Clone for Event {
    fn clone(&self) -> Self {
        Self {
            emitter: self.emitter.clone(),
            emitter_name: self.emitter_name.clone(),
            emitter_identifier: self.emitter_identifier,
            payload: self.payload.clone(),
            should_stop_propagating: AtomicBool::new(self.should_stop_propagating()),
            no_sublisteners: AtomicBool::new(self.no_sublisteners()),
            _token: self._token.clone(),
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind())
            .field("emitter", &self.emitter_name)
            .field("payload", &self.payload)
            .field("should_stop_propagating", &self.should_stop_propagating())
            .field("no_sublisteners", &self.no_sublisteners())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_access() {
        let event = Event::orphan(EventPayload::KeyDown(KeyEvent {
            key: Key::Escape,
            modifiers: KeyModifiers::SHIFT,
        }));
        assert_eq!(event.kind(), EventType::KeyDown);
        assert_eq!(event.to::<KeyEvent>().key, Key::Escape);

        let error = event.try_to::<UpdateEvent>().unwrap_err();
        assert_eq!(error.actual, EventType::KeyDown);
    }

    #[test]
    #[should_panic]
    fn wrong_payload_panics() {
        let event = Event::orphan(EventPayload::ResourceUnloaded);
        event.to::<KeyEvent>();
    }

    #[test]
    fn event_types_parse_from_names() {
        assert_eq!(EventType::try_from("update"), Ok(EventType::Update));
        assert_eq!(
            EventType::try_from("RenderScenePreRender"),
            Ok(EventType::RenderScenePreRender)
        );
        assert!(EventType::try_from("Nope").is_err());
        assert_eq!(EventType::WindowClosed.to_string(), "WindowClosed");
    }

    #[test]
    fn clones_keep_flags() {
        let event = Event::orphan(EventPayload::Update(UpdateEvent {
            elapsed: Duration::from_millis(16),
        }));
        event.set_should_stop_propagating(true);
        let clone = event.clone();
        assert!(clone.should_stop_propagating());
        assert!(!clone.no_sublisteners());
        clone.set_should_stop_propagating(false);
        assert!(event.should_stop_propagating());
    }
}
