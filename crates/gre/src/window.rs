//! Windows
//!
//! A [`Window`] is a resource wrapping a platform [`WindowBackend`]. Polling the window pumps the
//! backend's events and emits them to the window's listeners, which is how keyboards, scenes
//! and the application learn about input and window state changes.

use crate::{
    event::{EventPayload, EventType, WindowSizedEvent, WindowTitleChangedEvent},
    handle::Holder,
    manager::{Loader, LoaderOptions},
    resource::EventProceeder,
    HasProceeder, Resource,
};
use anyhow::anyhow;
use gre_utils::AnyResult;
use log::*;
use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// The platform side of a window.
pub trait WindowBackend: Send {
    /// Takes the next pending platform event, if any.
    fn poll_event(&mut self) -> Option<EventPayload>;
    fn is_closed(&self) -> bool;
    fn swap_buffers(&mut self);
    fn window_size(&self) -> (u32, u32);
    fn set_title(&mut self, title: &str);
}

/// A window with no platform behind it. It produces the events it was scripted with.
pub struct HeadlessWindow {
    title: String,
    size: (u32, u32),
    script: VecDeque<EventPayload>,
    closed: bool,
}

impl HeadlessWindow {
    pub fn new(title: impl Into<String>, size: (u32, u32)) -> Self {
        Self {
            title: title.into(),
            size,
            script: VecDeque::new(),
            closed: false,
        }
    }

    /// Adds an event to produce, after the already scripted ones.
    pub fn script(mut self, event: EventPayload) -> Self {
        self.script.push_back(event);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl WindowBackend for HeadlessWindow {
    fn poll_event(&mut self) -> Option<EventPayload> {
        let event = self.script.pop_front()?;
        match &event {
            EventPayload::WindowClosed => self.closed = true,
            EventPayload::WindowSized(WindowSizedEvent { width, height }) => {
                self.size = (*width, *height)
            }
            _ => {}
        }
        Some(event)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn swap_buffers(&mut self) {}

    fn window_size(&self) -> (u32, u32) {
        self.size
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_owned();
    }
}

/// A window resource. Listeners receive its input and state events.
#[derive(HasProceeder)]
pub struct Window {
    proceeder: EventProceeder,
    backend: Mutex<Box<dyn WindowBackend>>,
    /// Events queued by the engine itself, delivered before the platform's ones
    posted: Mutex<VecDeque<EventPayload>>,
    title: Mutex<String>,
    closed: AtomicBool,
    swaps: AtomicUsize,
}

impl Window {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        backend: Box<dyn WindowBackend>,
    ) -> Self {
        Self {
            proceeder: EventProceeder::new(name),
            backend: Mutex::new(backend),
            posted: Mutex::new(VecDeque::new()),
            title: Mutex::new(title.into()),
            closed: AtomicBool::new(false),
            swaps: AtomicUsize::new(0),
        }
    }

    /// Pumps one event and emits it. Returns `false` once there's nothing left to pump.
    pub fn poll_event(&self) -> bool {
        let posted = self.posted.lock().pop_front();
        let Some(payload) = posted.or_else(|| self.backend.lock().poll_event()) else {
            return false;
        };

        if payload.kind() == EventType::WindowClosed {
            debug!("Window `{}` closed", self.name());
            self.closed.store(true, Ordering::Release);
        }
        self.proceeder.emit(payload);
        true
    }

    /// Pumps events until the queues are drained. Returns how many were emitted.
    pub fn poll_events(&self) -> usize {
        let mut count = 0;
        while self.poll_event() {
            count += 1;
        }
        count
    }

    /// Queues an event to be emitted on the next poll, before any platform event.
    pub fn post_event(&self, payload: EventPayload) {
        self.posted.lock().push_back(payload);
    }

    /// Asks the window to close. The [`EventType::WindowClosed`] event is emitted on the next
    /// poll.
    pub fn close(&self) {
        self.post_event(EventPayload::WindowWillClose);
        self.post_event(EventPayload::WindowClosed);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.backend.lock().is_closed()
    }

    pub fn swap_buffers(&self) {
        self.backend.lock().swap_buffers();
        self.swaps.fetch_add(1, Ordering::Relaxed);
    }

    /// How many frames were presented so far.
    pub fn frames_swapped(&self) -> usize {
        self.swaps.load(Ordering::Relaxed)
    }

    pub fn window_size(&self) -> (u32, u32) {
        self.backend.lock().window_size()
    }

    pub fn title(&self) -> String {
        self.title.lock().clone()
    }

    pub fn set_title(&self, title: &str) {
        *self.title.lock() = title.to_owned();
        self.backend.lock().set_title(title);
        self.proceeder
            .emit(EventPayload::WindowTitleChanged(WindowTitleChangedEvent {
                title: title.to_owned(),
            }));
    }
}

impl Resource for Window {}

/// Creates headless windows. Understood options:
///  * `"Window.Title"`, defaults to the resource name
///  * `"Window.Size"`, as `"WxH"`, defaults to `800x600`
#[derive(Clone, Default)]
pub struct HeadlessWindowLoader;

impl Loader<Window> for HeadlessWindowLoader {
    fn name(&self) -> &str {
        "HeadlessWindowLoader"
    }

    fn clone_loader(&self) -> Box<dyn Loader<Window>> {
        Box::new(self.clone())
    }

    fn load(&self, name: &str, options: &LoaderOptions) -> AnyResult<Holder<Window>> {
        let title = options.get_str("Window.Title").unwrap_or(name).to_owned();
        let size = match options.get("Window.Size") {
            Some(size) => size
                .as_size()
                .ok_or_else(|| anyhow!("invalid window size `{size}`"))?,
            None => (800, 600),
        };

        trace!("Creating headless window `{name}` ({}x{})", size.0, size.1);
        let backend = HeadlessWindow::new(title.clone(), size);
        Ok(Holder::new_resource(Window::new(name, title, Box::new(backend))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::{Key, KeyEvent, KeyModifiers},
        resource::Keyboard,
    };

    #[test]
    fn polled_events_reach_listeners() {
        let backend = HeadlessWindow::new("test", (64, 64))
            .script(EventPayload::KeyDown(KeyEvent {
                key: Key::A,
                modifiers: KeyModifiers::empty(),
            }))
            .script(EventPayload::WindowSized(WindowSizedEvent {
                width: 128,
                height: 32,
            }));
        let window = Holder::new_resource(Window::new("window", "test", Box::new(backend)));
        let keyboard = Holder::new_resource(Keyboard::new("keyboard"));
        keyboard
            .proceeder()
            .listen(&window.user().as_resource(), None)
            .unwrap();

        assert_eq!(window.poll_events(), 2);
        assert!(keyboard.is_key_down(Key::A));
        assert_eq!(window.window_size(), (128, 32));
        assert!(!window.is_closed());

        window.close();
        assert_eq!(window.poll_events(), 2);
        assert!(window.is_closed());
    }

    #[test]
    fn loader_reads_options() {
        let options = LoaderOptions::new()
            .with("Window.Title", "Hello")
            .with("Window.Size", "320x240");
        let window = HeadlessWindowLoader.load("main", &options).unwrap();
        assert_eq!(window.title(), "Hello");
        assert_eq!(window.window_size(), (320, 240));

        let options = LoaderOptions::new().with("Window.Size", "huge");
        assert!(HeadlessWindowLoader.load("main", &options).is_err());
    }
}
