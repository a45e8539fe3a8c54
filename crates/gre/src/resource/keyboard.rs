use super::{EventProceeder, Resource};
use crate::{
    event::{Event, EventType, Key, KeyEvent},
    handle::Holder,
    manager::{Loader, LoaderOptions},
    HasProceeder,
};
use ahash::AHashSet;
use gre_utils::AnyResult;
use log::*;
use parking_lot::Mutex;

/// Tracks which keys are held down, from the key events it receives.
///
/// Make it listen to a window to have it follow that window's keyboard.
#[derive(HasProceeder)]
pub struct Keyboard {
    proceeder: EventProceeder,
    pressed: Mutex<AHashSet<Key>>,
}

impl Keyboard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            proceeder: EventProceeder::new(name),
            pressed: Mutex::new(AHashSet::new()),
        }
    }

    pub fn is_key_down(&self, key: Key) -> bool {
        self.pressed.lock().contains(&key)
    }

    pub fn pressed_keys(&self) -> Vec<Key> {
        self.pressed.lock().iter().copied().collect()
    }
}

impl Resource for Keyboard {
    fn handles(&self, kind: EventType) -> bool {
        matches!(kind, EventType::KeyDown | EventType::KeyUp)
    }

    fn handle_event(&self, event: &Event) {
        let KeyEvent { key, .. } = *event.to::<KeyEvent>();
        let mut pressed = self.pressed.lock();
        match event.kind() {
            EventType::KeyDown => {
                pressed.insert(key);
            }
            _ => {
                pressed.remove(&key);
            }
        }
        trace!("Keyboard `{}`: {key:?} {}", self.name(), event.kind());
    }
}

/// Default loader of [`Keyboard`]s.
#[derive(Clone, Default)]
pub struct KeyboardLoader;

impl Loader<Keyboard> for KeyboardLoader {
    fn name(&self) -> &str {
        "KeyboardLoader"
    }

    fn clone_loader(&self) -> Box<dyn Loader<Keyboard>> {
        Box::new(self.clone())
    }

    fn load(&self, name: &str, _options: &LoaderOptions) -> AnyResult<Holder<Keyboard>> {
        Ok(Holder::new_resource(Keyboard::new(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventPayload, KeyModifiers};

    #[test]
    fn follows_key_events() {
        let keyboard = Holder::new_resource(Keyboard::new("keyboard"));
        let press = |kind: fn(KeyEvent) -> EventPayload, key| {
            keyboard.on_event(&Event::orphan(kind(KeyEvent {
                key,
                modifiers: KeyModifiers::empty(),
            })));
        };

        press(EventPayload::KeyDown, Key::W);
        press(EventPayload::KeyDown, Key::Space);
        assert!(keyboard.is_key_down(Key::W));
        assert!(keyboard.is_key_down(Key::Space));

        press(EventPayload::KeyUp, Key::W);
        assert!(!keyboard.is_key_down(Key::W));
        assert_eq!(keyboard.pressed_keys(), vec![Key::Space]);
    }
}
