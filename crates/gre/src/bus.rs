use crate::{event::Event, resource::ResourceUser, HasProceeder};
use log::*;
use parking_lot::FairMutex;
use std::{collections::VecDeque, mem};

/// The [`EventBus`] defers event dispatching. Any thread can post events to it, and they're sent
/// on the thread calling [`EventBus::flush`], usually once per frame.
///
/// Events posted while flushing are kept for the next flush.
pub struct EventBus {
    queued: FairMutex<VecDeque<(ResourceUser, Event)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            queued: FairMutex::new(VecDeque::with_capacity(64)),
        }
    }

    /// Queues an event, to be sent by `emitter` on the next flush.
    pub fn post(&self, emitter: &ResourceUser, event: Event) {
        self.queued.lock().push_back((emitter.clone(), event));
    }

    /// Sends the queued events in the order they were posted. Events of emitters that are gone
    /// by now are dropped. Returns how many events were sent.
    pub fn flush(&self) -> usize {
        let queued = mem::take(&mut *self.queued.lock());
        let mut sent = 0;
        for (emitter, event) in queued {
            match emitter.lock().try_get() {
                Some(emitter) => {
                    emitter.proceeder().send_event(&event);
                    sent += 1;
                }
                None => trace!("Dropping `{}` event of a gone emitter", event.kind()),
            }
        }
        sent
    }

    pub fn len(&self) -> usize {
        self.queued.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.lock().is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::{CustomEvent, EventPayload, EventType},
        handle::Holder,
        resource::GenericListener,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn flush_keeps_the_posting_order() {
        let bus = EventBus::new();
        let emitter = Holder::new_resource(GenericListener::new("emitter"));
        let listener = Holder::new_resource(GenericListener::new("listener"));
        emitter
            .proceeder()
            .add_listener(&listener.user().as_resource())
            .unwrap();

        let received = Arc::new(Mutex::new(vec![]));
        for kind in [EventType::WindowFocused, EventType::Custom] {
            let received = received.clone();
            listener
                .proceeder()
                .add_action(kind, move |e| received.lock().push(e.kind()));
        }

        let user = emitter.user().as_resource();
        bus.post(&user, emitter.proceeder().make_event(EventPayload::WindowFocused));
        bus.post(
            &user,
            emitter
                .proceeder()
                .make_event(EventPayload::Custom(CustomEvent::default())),
        );
        assert!(received.lock().is_empty());
        assert_eq!(bus.len(), 2);

        assert_eq!(bus.flush(), 2);
        assert_eq!(
            *received.lock(),
            vec![EventType::WindowFocused, EventType::Custom]
        );
        assert!(bus.is_empty());
    }

    #[test]
    fn events_of_gone_emitters_are_dropped() {
        let bus = EventBus::new();
        let emitter = Holder::new_resource(GenericListener::new("emitter"));
        let event = emitter.proceeder().make_event(EventPayload::WindowFocused);
        bus.post(&emitter.user().as_resource(), event);
        drop(emitter);
        assert_eq!(bus.flush(), 0);
    }
}
