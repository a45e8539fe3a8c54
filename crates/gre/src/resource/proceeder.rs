use super::{
    GenericListener, HasProceeder, ListenerError, Resource, ResourceHolder, ResourceIdentifier,
    ResourceUser,
};
use crate::{
    event::{Event, EventPayload, EventType},
    handle::Holder,
    variant::{Variant, VariantMap},
};
use ahash::AHashMap;
use log::*;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use std::{
    fmt, mem,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Restricts a listener to given event types.
pub type EventFilter = SmallVec<[EventType; 4]>;

type Action = Arc<dyn Fn(&Event) + Send + Sync>;
type NextEventCallback = Box<dyn FnOnce(&Event) + Send>;

struct ListenerEntry {
    name: String,
    identifier: ResourceIdentifier,
    user: ResourceUser,
    filter: Option<EventFilter>,
}

impl ListenerEntry {
    fn accepts(&self, kind: EventType) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |filter| filter.contains(&kind))
    }
}

#[derive(Default)]
struct ProceederState {
    listeners: Vec<ListenerEntry>,
    /// Listeners created by [`EventProceeder::add_named_listener`], which are owned by us
    owned_listeners: Vec<ResourceHolder>,
    /// Resources we're listening to
    emitters: Vec<(ResourceIdentifier, ResourceUser)>,
    actions: AHashMap<EventType, Vec<Action>>,
    next_event_callbacks: Vec<NextEventCallback>,
}

/// Event machinery embedded in every resource.
///
/// The proceeder stores the resource's name and identifier, its listeners, the back-edges to
/// resources it listens to, per-type actions, one-shot callbacks and custom data. Everything is
/// guarded by internal locks, which are never held while calling into other resources.
pub struct EventProceeder {
    name: String,
    identifier: ResourceIdentifier,
    self_user: OnceCell<ResourceUser>,
    state: Mutex<ProceederState>,
    transmits: AtomicBool,
    custom_data: RwLock<VariantMap>,
    _token: gre_utils::PoolToken,
}

impl EventProceeder {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let identifier = super::next_identifier();
        trace!("Resource `{name}` ({identifier}) constructed");
        Self {
            name,
            identifier,
            self_user: OnceCell::new(),
            state: Mutex::new(ProceederState::default()),
            transmits: AtomicBool::new(true),
            custom_data: RwLock::new(VariantMap::default()),
            _token: gre_utils::PoolToken::new(gre_utils::PoolCategory::Resource),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn identifier(&self) -> ResourceIdentifier {
        self.identifier
    }

    /// Binds this proceeder to the weak handle of the resource that owns it. Done by
    /// [`Holder::new_resource`], and only once.
    pub(crate) fn bind(&self, user: ResourceUser) {
        if self.self_user.set(user).is_err() {
            warn!("Resource `{}` was bound to a handle twice", self.name);
        }
    }

    /// Weak handle to the resource owning this proceeder. Null if the resource is unbound.
    pub fn self_user(&self) -> ResourceUser {
        self.self_user.get().cloned().unwrap_or_default()
    }

    /// Whether the owning resource is bound and alive.
    pub fn is_bound(&self) -> bool {
        self.self_user.get().map_or(false, |user| !user.is_invalid())
    }

    fn bound_user(&self) -> Result<ResourceUser, ListenerError> {
        match self.self_user.get() {
            Some(user) if !user.is_invalid() => Ok(user.clone()),
            _ => Err(ListenerError::Unbound(self.name.clone())),
        }
    }

    // ---------------------------------------------------------------------------------------
    // Listener graph

    /// Registers a listener. Its name has to be unique among our listeners.
    ///
    /// The listener also remembers us, so it can unregister itself when it's destroyed.
    pub fn add_listener(&self, listener: &ResourceUser) -> Result<ResourceUser, ListenerError> {
        self.add_listener_entry(listener, None, None)
    }

    /// Registers a listener under `name` instead of its resource name.
    pub fn add_listener_as(
        &self,
        name: impl Into<String>,
        listener: &ResourceUser,
    ) -> Result<ResourceUser, ListenerError> {
        self.add_listener_entry(listener, Some(name.into()), None)
    }

    /// Registers a listener that only receives events of given types.
    pub fn add_filtered_listener(
        &self,
        listener: &ResourceUser,
        filter: impl IntoIterator<Item = EventType>,
    ) -> Result<ResourceUser, ListenerError> {
        self.add_listener_entry(listener, None, Some(filter.into_iter().collect()))
    }

    /// Creates a [`GenericListener`] owned by this resource, and registers it.
    pub fn add_named_listener(&self, name: &str) -> Result<ResourceUser, ListenerError> {
        let holder = Holder::new_resource(GenericListener::new(name)).as_resource();
        let user = self.add_listener(&holder.user())?;
        self.state.lock().owned_listeners.push(holder);
        Ok(user)
    }

    fn add_listener_entry(
        &self,
        listener: &ResourceUser,
        name: Option<String>,
        filter: Option<EventFilter>,
    ) -> Result<ResourceUser, ListenerError> {
        let emitter = self.bound_user()?;
        let holder = listener.lock();
        let resource = holder.try_get().ok_or(ListenerError::InvalidListener)?;

        let name = name.unwrap_or_else(|| resource.name().to_owned());
        let identifier = resource.identifier();

        {
            let mut state = self.state.lock();
            state.listeners.retain(|entry| !entry.user.is_expired());
            if state.listeners.iter().any(|entry| entry.name == name) {
                return Err(ListenerError::DuplicateName(name));
            }
            state.listeners.push(ListenerEntry {
                name,
                identifier,
                user: listener.clone(),
                filter,
            });
        }

        resource.proceeder().record_emitter(self.identifier, emitter);
        Ok(listener.clone())
    }

    fn record_emitter(&self, identifier: ResourceIdentifier, emitter: ResourceUser) {
        let mut state = self.state.lock();
        state.emitters.retain(|(_, user)| !user.is_expired());
        if !state.emitters.iter().any(|(id, _)| *id == identifier) {
            state.emitters.push((identifier, emitter));
        }
    }

    fn forget_emitter(&self, identifier: ResourceIdentifier) {
        self.state.lock().emitters.retain(|(id, _)| *id != identifier);
    }

    /// Finds a live listener by its name. Null if there's none.
    pub fn get_listener(&self, name: &str) -> ResourceUser {
        self.state
            .lock()
            .listeners
            .iter()
            .find(|entry| entry.name == name && !entry.user.is_expired())
            .map(|entry| entry.user.clone())
            .unwrap_or_default()
    }

    /// Unregisters the listener with given name. Does nothing if there's none.
    pub fn remove_listener(&self, name: &str) {
        let removed = {
            let mut state = self.state.lock();
            let Some(index) = state.listeners.iter().position(|entry| entry.name == name) else {
                return;
            };
            let entry = state.listeners.remove(index);
            let owned = take_owned(&mut state.owned_listeners, entry.identifier);
            (entry, owned)
        };
        self.detach(removed);
    }

    /// Unregisters the listener with given identifier. Does nothing if there's none.
    pub fn remove_listener_by_id(&self, identifier: ResourceIdentifier) {
        let removed = {
            let mut state = self.state.lock();
            let Some(index) = state
                .listeners
                .iter()
                .position(|entry| entry.identifier == identifier)
            else {
                return;
            };
            let entry = state.listeners.remove(index);
            let owned = take_owned(&mut state.owned_listeners, identifier);
            (entry, owned)
        };
        self.detach(removed);
    }

    fn detach(&self, (entry, owned): (ListenerEntry, Option<ResourceHolder>)) {
        if let Some(listener) = entry.user.lock().try_get() {
            listener.proceeder().forget_emitter(self.identifier);
        }
        // Owned listeners are dropped only now, outside of our lock
        drop(owned);
    }

    /// Names of the registered listeners, in registration order.
    pub fn listeners(&self) -> Vec<String> {
        self.state
            .lock()
            .listeners
            .iter()
            .filter(|entry| !entry.user.is_expired())
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.state
            .lock()
            .listeners
            .iter()
            .filter(|entry| !entry.user.is_expired())
            .count()
    }

    /// Registers this resource as a listener of `emitter`.
    pub fn listen(
        &self,
        emitter: &ResourceUser,
        filter: Option<EventFilter>,
    ) -> Result<(), ListenerError> {
        let me = self.bound_user()?;
        let emitter = emitter.lock();
        let emitter = emitter.try_get().ok_or(ListenerError::InvalidListener)?;
        emitter.proceeder().add_listener_entry(&me, None, filter)?;
        Ok(())
    }

    /// Stops listening to `emitter`.
    pub fn unlisten(&self, emitter: &ResourceUser) {
        if let Some(emitter) = emitter.lock().try_get() {
            emitter.proceeder().remove_listener_by_id(self.identifier);
        }
    }

    /// Identifiers of the resources this resource listens to.
    pub fn emitters(&self) -> Vec<ResourceIdentifier> {
        self.state
            .lock()
            .emitters
            .iter()
            .filter(|(_, user)| !user.is_expired())
            .map(|(id, _)| *id)
            .collect()
    }

    // ---------------------------------------------------------------------------------------
    // Dispatching

    /// Creates an event emitted by this resource, and sends it to the listeners. The event is
    /// returned, so callers can inspect its flags.
    pub fn emit(&self, payload: EventPayload) -> Event {
        let event = self.make_event(payload);
        self.send_event(&event);
        event
    }

    pub fn make_event(&self, payload: EventPayload) -> Event {
        Event::new(self.self_user(), &self.name, self.identifier, payload)
    }

    /// Sends given event to our listeners, in registration order.
    pub fn send_event(&self, event: &Event) {
        if !self.is_bound() {
            warn!(
                "Resource `{}` can't send `{}`: it isn't bound to a live handle",
                self.name,
                event.kind()
            );
            return;
        }
        self.dispatch(event);
    }

    fn dispatch(&self, event: &Event) {
        let kind = event.kind();
        let targets: SmallVec<[ResourceUser; 8]> = {
            let mut state = self.state.lock();
            state.listeners.retain(|entry| !entry.user.is_expired());
            state
                .listeners
                .iter()
                .filter(|entry| entry.accepts(kind))
                .map(|entry| entry.user.clone())
                .collect()
        };

        for target in targets {
            if event.should_stop_propagating() {
                break;
            }
            if let Some(listener) = target.lock().try_get() {
                listener.on_event(event);
            }
        }
    }

    /// The standard event processing of a resource. See the [module docs](super).
    pub fn process<R: Resource + ?Sized>(&self, resource: &R, event: &Event) {
        if !event.should_stop_propagating() && !event.no_sublisteners() && self.transmits_events()
        {
            self.dispatch(event);
        }

        let kind = event.kind();
        if resource.handles(kind) {
            resource.handle_event(event);
        }

        let actions: SmallVec<[Action; 2]> = self
            .state
            .lock()
            .actions
            .get(&kind)
            .map(|actions| actions.iter().cloned().collect())
            .unwrap_or_default();
        for action in actions {
            action(event);
        }

        // Every callback runs even if one of them panics, the first panic is resumed afterwards
        let callbacks = mem::take(&mut self.state.lock().next_event_callbacks);
        let mut first_panic = None;
        for callback in callbacks {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                error!("Resource `{}`: a one-shot callback panicked", self.name);
                first_panic.get_or_insert(payload);
            }
        }
        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
    }

    /// Runs `action` every time this resource processes an event of given type.
    pub fn add_action(&self, kind: EventType, action: impl Fn(&Event) + Send + Sync + 'static) {
        self.state
            .lock()
            .actions
            .entry(kind)
            .or_default()
            .push(Arc::new(action));
    }

    pub fn reset_actions(&self) {
        self.state.lock().actions.clear();
    }

    /// Runs `callback` once, with the next event this resource processes.
    pub fn on_next_event(&self, callback: impl FnOnce(&Event) + Send + 'static) {
        self.state
            .lock()
            .next_event_callbacks
            .push(Box::new(callback));
    }

    /// Whether processed events are forwarded to our listeners. On by default.
    pub fn transmits_events(&self) -> bool {
        self.transmits.load(Ordering::Acquire)
    }

    pub fn set_transmits_events(&self, value: bool) {
        self.transmits.store(value, Ordering::Release);
    }

    // ---------------------------------------------------------------------------------------
    // Custom data

    /// Null if nothing is stored under `key`.
    pub fn custom_data(&self, key: &str) -> Variant {
        self.custom_data.read().get(key).cloned().unwrap_or_default()
    }

    pub fn set_custom_data(&self, key: impl Into<String>, value: impl Into<Variant>) {
        self.custom_data.write().insert(key.into(), value.into());
    }

    pub fn remove_custom_data(&self, key: &str) -> Option<Variant> {
        self.custom_data.write().remove(key)
    }
}

fn take_owned(
    owned: &mut Vec<ResourceHolder>,
    identifier: ResourceIdentifier,
) -> Option<ResourceHolder> {
    let index = owned
        .iter()
        .position(|holder| holder.try_get().map(|l| l.identifier()) == Some(identifier))?;
    Some(owned.remove(index))
}

impl Drop for EventProceeder {
    fn drop(&mut self) {
        let emitters = mem::take(&mut self.state.get_mut().emitters);
        for (_, emitter) in emitters {
            if let Some(emitter) = emitter.lock().try_get() {
                emitter.proceeder().remove_listener_by_id(self.identifier);
            }
        }

        // Our own handle is already expired, so the event skips the binding check
        let event = self.make_event(EventPayload::ResourceUnloaded);
        self.dispatch(&event);

        // Owned listeners are destroyed last, once nothing of ours is locked
        drop(mem::take(self.state.get_mut()));

        trace!("Resource `{}` ({}) destroyed", self.name, self.identifier);
    }
}

impl fmt::Debug for EventProceeder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventProceeder")
            .field("name", &self.name)
            .field("identifier", &self.identifier)
            .field("listeners", &self.listeners())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event::CustomEvent, HasProceeder};
    use std::{
        panic::catch_unwind,
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn listener(name: &'static str, log: &Log) -> Holder<GenericListener> {
        let holder = Holder::new_resource(GenericListener::new(name));
        let log = log.clone();
        holder
            .proceeder()
            .add_action(EventType::Custom, move |_| log.lock().push(name));
        holder
    }

    fn custom() -> EventPayload {
        EventPayload::Custom(CustomEvent::default())
    }

    #[test]
    fn listener_names_are_unique() {
        let emitter = Holder::new_resource(GenericListener::new("emitter"));
        let first = Holder::new_resource(GenericListener::new("L"));
        let second = Holder::new_resource(GenericListener::new("L"));

        emitter
            .proceeder()
            .add_listener(&first.user().as_resource())
            .unwrap();
        assert!(matches!(
            emitter.proceeder().add_listener(&second.user().as_resource()),
            Err(ListenerError::DuplicateName(name)) if name == "L"
        ));
        assert_eq!(emitter.proceeder().listeners(), vec!["L".to_owned()]);
        assert!(second.proceeder().emitters().is_empty());

        emitter
            .proceeder()
            .add_listener_as("L'", &second.user().as_resource())
            .unwrap();
        assert_eq!(emitter.proceeder().listener_count(), 2);
    }

    #[test]
    fn unbound_resources_cannot_have_listeners() {
        let emitter = GenericListener::new("emitter");
        let listener = Holder::new_resource(GenericListener::new("L"));
        assert!(matches!(
            emitter.proceeder().add_listener(&listener.user().as_resource()),
            Err(ListenerError::Unbound(_))
        ));
        assert!(matches!(
            listener.proceeder().add_listener(&ResourceUser::null()),
            Err(ListenerError::InvalidListener)
        ));
    }

    #[test]
    fn removing_an_absent_listener_does_nothing() {
        let log = Log::default();
        let emitter = Holder::new_resource(GenericListener::new("emitter"));
        let l1 = listener("L1", &log);
        emitter
            .proceeder()
            .add_listener(&l1.user().as_resource())
            .unwrap();

        emitter.proceeder().remove_listener("missing");
        emitter.proceeder().remove_listener_by_id(0);
        assert_eq!(emitter.proceeder().listeners(), vec!["L1".to_owned()]);

        emitter.proceeder().remove_listener("L1");
        assert!(emitter.proceeder().listeners().is_empty());
        assert!(l1.proceeder().emitters().is_empty());
        emitter.proceeder().remove_listener("L1");
    }

    #[test]
    fn next_event_callbacks_run_once() {
        let resource = Holder::new_resource(GenericListener::new("resource"));
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = calls.clone();
        resource.proceeder().on_next_event(move |event| {
            assert_eq!(event.kind(), EventType::Custom);
            sink.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..3 {
            resource.on_event(&Event::orphan(custom()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_panicking_callback_does_not_drop_the_others() {
        let resource = Holder::new_resource(GenericListener::new("resource"));
        let calls = Arc::new(AtomicUsize::new(0));
        for i in 0..3 {
            let sink = calls.clone();
            resource.proceeder().on_next_event(move |_| {
                if i == 0 {
                    panic!("first callback fails");
                }
                sink.fetch_add(1, Ordering::SeqCst);
            });
        }

        let result = catch_unwind(AssertUnwindSafe(|| {
            resource.on_event(&Event::orphan(custom()))
        }));
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        resource.on_event(&Event::orphan(custom()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn forwarding_can_be_disabled() {
        let log = Log::default();
        let relay = listener("relay", &log);
        let leaf = listener("leaf", &log);
        relay
            .proceeder()
            .add_listener(&leaf.user().as_resource())
            .unwrap();

        relay.on_event(&Event::orphan(custom()));
        assert_eq!(*log.lock(), vec!["leaf", "relay"]);

        log.lock().clear();
        let event = Event::orphan(custom());
        event.set_no_sublisteners(true);
        relay.on_event(&event);
        assert_eq!(*log.lock(), vec!["relay"]);

        log.lock().clear();
        relay.proceeder().set_transmits_events(false);
        relay.on_event(&Event::orphan(custom()));
        assert_eq!(*log.lock(), vec!["relay"]);

        log.lock().clear();
        relay.proceeder().set_transmits_events(true);
        relay.on_event(&Event::orphan(custom()));
        assert_eq!(*log.lock(), vec!["leaf", "relay"]);
    }

    #[test]
    fn filtered_listeners_only_see_their_types() {
        let log = Log::default();
        let emitter = Holder::new_resource(GenericListener::new("emitter"));
        let all = listener("all", &log);
        let updates = listener("updates", &log);
        emitter
            .proceeder()
            .add_listener(&all.user().as_resource())
            .unwrap();
        emitter
            .proceeder()
            .add_filtered_listener(&updates.user().as_resource(), [EventType::Update])
            .unwrap();

        emitter.proceeder().emit(custom());
        assert_eq!(*log.lock(), vec!["all"]);
    }

    #[test]
    fn listeners_can_remove_themselves_while_dispatching() {
        let log = Log::default();
        let emitter = Holder::new_resource(GenericListener::new("emitter"));
        let l1 = listener("L1", &log);
        let l2 = listener("L2", &log);

        let weak_emitter = emitter.user();
        l1.proceeder().add_action(EventType::Custom, move |_| {
            if let Some(emitter) = weak_emitter.lock().try_get() {
                emitter.proceeder().remove_listener("L1");
            }
        });
        for listener in [&l1, &l2] {
            emitter
                .proceeder()
                .add_listener(&listener.user().as_resource())
                .unwrap();
        }

        emitter.proceeder().emit(custom());
        emitter.proceeder().emit(custom());
        assert_eq!(*log.lock(), vec!["L1", "L2", "L2"]);
        assert_eq!(emitter.proceeder().listeners(), vec!["L2".to_owned()]);
    }

    #[test]
    fn a_panicking_listener_leaves_the_graph_intact() {
        let log = Log::default();
        let emitter = Holder::new_resource(GenericListener::new("emitter"));
        let l2 = listener("L2", &log);
        let panicking = Holder::new_resource(GenericListener::new("P"));
        panicking
            .proceeder()
            .add_action(EventType::Custom, |_| panic!("listener fails"));
        for listener in [l2.user().as_resource(), panicking.user().as_resource()] {
            emitter.proceeder().add_listener(&listener).unwrap();
        }

        let result = catch_unwind(AssertUnwindSafe(|| emitter.proceeder().emit(custom())));
        assert!(result.is_err());
        assert_eq!(
            emitter.proceeder().listeners(),
            vec!["L2".to_owned(), "P".to_owned()]
        );
        assert_eq!(panicking.proceeder().emitters(), vec![emitter.identifier()]);

        emitter.proceeder().remove_listener("P");
        emitter.proceeder().emit(custom());
        assert_eq!(*log.lock(), vec!["L2", "L2"]);
    }

    #[test]
    fn concurrent_graph_mutation() {
        let emitter = Holder::new_resource(GenericListener::new("emitter"));

        thread::scope(|scope| {
            for i in 0..8 {
                let emitter = emitter.clone();
                scope.spawn(move || {
                    for j in 0..2000 {
                        let holder = emitter.clone();
                        let name = format!("L{i}.{j}");
                        let listener = Holder::new_resource(GenericListener::new(name.as_str()));
                        holder
                            .proceeder()
                            .add_listener(&listener.user().as_resource())
                            .unwrap();
                        if j % 2 == 0 {
                            holder.proceeder().emit(custom());
                            holder.proceeder().remove_listener(&name);
                        }
                        drop(listener);
                    }
                });
            }
        });

        assert_eq!(emitter.counter().holders, 1);
        assert_eq!(emitter.proceeder().listener_count(), 0);
        assert!(emitter.proceeder().listeners().is_empty());
    }
}
