//! The frame loop
//!
//! An [`Application`] owns the [`ResourceContext`] and drives it one frame at a time. Every frame
//! is split into the following stages:
//!  * window events: every window is polled until its queue is drained,
//!  * bus dispatch: events posted to the [`crate::bus::EventBus`] are sent,
//!  * update: an [`crate::event::EventType::Update`] event is emitted to the managers, and from
//!    them to every resource they manage,
//!  * scene drawing: every scene of the context is drawn, and its target presented,
//!  * close checks: the [`CloseBehaviour`]s are evaluated.
//!
//! Durations of the stages are recorded by a [`FrameProfiler`].

use crate::{
    context::ResourceContext,
    event::{EventPayload, Key, UpdateEvent},
    handle::Holder,
    resource::{EventProceeder, Resource},
    window::Window,
    HasProceeder,
};
use bitflags::bitflags;
use log::*;
use parking_lot::{Mutex, RwLock};
use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    thread,
    time::{Duration, Instant},
};

#[doc(inline)]
pub use profiler::*;
mod profiler;

/// Run state of the frame loop, shared with whoever may want to stop it.
pub struct EngineContext {
    /// See: [`Self::request_shutdown`]
    should_run: AtomicBool,
    /// Whether [`Application::run`] is inside its loop. Only modified by the loop itself.
    is_running: AtomicBool,
}

impl Default for EngineContext {
    fn default() -> Self {
        Self {
            should_run: AtomicBool::new(true),
            is_running: AtomicBool::new(false),
        }
    }
}

impl EngineContext {
    /// Tells the frame loop to break out at the end of the current frame.
    pub fn request_shutdown(&self) {
        trace!(
            "Thread `{}` requesting shutdown",
            thread::current().name().unwrap_or("(no name)")
        );
        self.should_run.store(false, Ordering::Release);
    }

    pub fn should_run(&self) -> bool {
        self.should_run.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }
}

bitflags! {
    /// Conditions under which the application stops its loop.
    pub struct CloseBehaviour: u8 {
        /// Every window of the context is closed (ignored when there are no windows)
        const ALL_WINDOWS_CLOSED = 1 << 0;
        /// Escape is held down on any keyboard
        const ESCAPE_KEY = 1 << 1;
        /// [`Application::terminate`] was called
        const TERMINATE_CALLED = 1 << 2;
    }
}

impl Default for CloseBehaviour {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(HasProceeder)]
pub struct Application {
    proceeder: EventProceeder,
    context: ResourceContext,
    engine: EngineContext,
    close_behaviour: RwLock<CloseBehaviour>,
    profiler: Mutex<FrameProfiler>,
    /// Fixed elapsed time of every update, for deterministic runs
    frame_time: RwLock<Option<Duration>>,
    last_frame: Mutex<Option<Instant>>,
    frame_count: AtomicUsize,
    terminate_requested: AtomicBool,
    windows_were_closed: AtomicBool,
}

impl Application {
    /// Creates the application, making every manager of the context one of its listeners.
    pub fn create(name: impl Into<String>, context: ResourceContext) -> Holder<Application> {
        let app = Holder::new_resource(Self {
            proceeder: EventProceeder::new(name),
            context,
            engine: EngineContext::default(),
            close_behaviour: RwLock::new(CloseBehaviour::default()),
            profiler: Mutex::new(FrameProfiler::new()),
            frame_time: RwLock::new(None),
            last_frame: Mutex::new(None),
            frame_count: AtomicUsize::new(0),
            terminate_requested: AtomicBool::new(false),
            windows_were_closed: AtomicBool::new(false),
        });

        for manager in app.context.managers() {
            if let Err(error) = app.proceeder.add_listener(&manager) {
                warn!("Application `{}`: {error}", app.name());
            }
        }

        debug!("Application `{}` created", app.name());
        app
    }

    pub fn context(&self) -> &ResourceContext {
        &self.context
    }

    pub fn engine(&self) -> &EngineContext {
        &self.engine
    }

    pub fn close_behaviour(&self) -> CloseBehaviour {
        *self.close_behaviour.read()
    }

    pub fn set_close_behaviour(&self, behaviour: CloseBehaviour) {
        *self.close_behaviour.write() = behaviour;
    }

    pub fn frame_time(&self) -> Option<Duration> {
        *self.frame_time.read()
    }

    /// With `Some`, every update reports given elapsed time instead of the measured one.
    pub fn set_frame_time(&self, frame_time: Option<Duration>) {
        *self.frame_time.write() = frame_time;
    }

    /// Amount of frames processed so far.
    pub fn frame_count(&self) -> usize {
        self.frame_count.load(Ordering::Relaxed)
    }

    pub fn last_profile(&self) -> Option<ProfilingInfo> {
        self.profiler.lock().last_frame().cloned()
    }

    pub fn average_frame_time(&self) -> Duration {
        self.profiler.lock().average_frame_time()
    }

    /// Asks the loop to stop, if [`CloseBehaviour::TERMINATE_CALLED`] is enabled.
    pub fn terminate(&self) {
        if !self.close_behaviour().contains(CloseBehaviour::TERMINATE_CALLED) {
            debug!(
                "Application `{}`: terminate called, but it doesn't close on it",
                self.name()
            );
        }
        self.terminate_requested.store(true, Ordering::Release);
    }

    /// Processes one frame. Returns whether the loop should go on.
    pub fn frame(&self) -> bool {
        self.profiler.lock().begin_frame();

        self.stage(FrameStage::WindowEvents);
        let windows = self.context.windows.holders();
        for window in &windows {
            window.poll_events();
        }

        self.stage(FrameStage::BusDispatch);
        self.context.bus.flush();

        self.stage(FrameStage::Update);
        let elapsed = self.elapsed();
        let update = self
            .proceeder
            .emit(EventPayload::Update(UpdateEvent { elapsed }));

        self.stage(FrameStage::SceneDrawing);
        self.context.scenes.draw_scenes(&update);

        self.stage(FrameStage::CloseChecks);
        let should_close = self.should_close(&windows);
        drop(windows);

        let info = self.profiler.lock().finish_frame();
        let frame = self.frame_count.fetch_add(1, Ordering::Relaxed);
        trace!("Frame {frame} took {:?}", info.total_time);

        if should_close {
            self.engine.request_shutdown();
        }
        self.engine.should_run()
    }

    /// Runs frames until a close behaviour is triggered, or a shutdown requested. Returns how
    /// many frames were processed.
    pub fn run(&self) -> usize {
        self.run_loop(None)
    }

    /// Like [`Self::run`], but stops after `frames` frames at most.
    pub fn run_frames(&self, frames: usize) -> usize {
        self.run_loop(Some(frames))
    }

    fn run_loop(&self, limit: Option<usize>) -> usize {
        info!("Application `{}` is running", self.name());
        self.engine.is_running.store(true, Ordering::Release);

        let mut processed = 0;
        while self.engine.should_run() && limit.map_or(true, |limit| processed < limit) {
            processed += 1;
            if !self.frame() {
                break;
            }
        }

        self.engine.is_running.store(false, Ordering::Release);
        info!(
            "Application `{}` stopped after {processed} frames (average {:?})",
            self.name(),
            self.average_frame_time()
        );
        processed
    }

    fn stage(&self, stage: FrameStage) {
        self.profiler.lock().next_stage(stage);
    }

    fn elapsed(&self) -> Duration {
        let now = Instant::now();
        let previous = self.last_frame.lock().replace(now);
        match self.frame_time() {
            Some(fixed) => fixed,
            None => previous.map_or(Duration::ZERO, |previous| now.duration_since(previous)),
        }
    }

    fn should_close(&self, windows: &[Holder<Window>]) -> bool {
        let behaviour = self.close_behaviour();
        let mut close = false;

        let all_closed = !windows.is_empty() && windows.iter().all(|w| w.is_closed());
        if all_closed && !self.windows_were_closed.swap(true, Ordering::AcqRel) {
            self.proceeder.emit(EventPayload::LastWindowClosed);
        }
        if all_closed && behaviour.contains(CloseBehaviour::ALL_WINDOWS_CLOSED) {
            debug!("Every window is closed");
            close = true;
        }

        if behaviour.contains(CloseBehaviour::ESCAPE_KEY)
            && self
                .context
                .keyboards
                .holders()
                .iter()
                .any(|keyboard| keyboard.is_key_down(Key::Escape))
        {
            debug!("Escape pressed");
            close = true;
        }

        if behaviour.contains(CloseBehaviour::TERMINATE_CALLED)
            && self.terminate_requested.load(Ordering::Acquire)
        {
            debug!("Terminate called");
            close = true;
        }

        close
    }
}

impl Resource for Application {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::{EventType, KeyEvent, KeyModifiers},
        manager::LoaderOptions,
        window::HeadlessWindow,
    };
    use std::sync::Arc;

    fn application() -> Holder<Application> {
        let app = Application::create("app", ResourceContext::new());
        app.set_frame_time(Some(Duration::from_millis(16)));
        app
    }

    #[test]
    fn run_frames_stops_at_the_limit() {
        let app = application();
        app.context().windows.load("main", &LoaderOptions::new());

        assert_eq!(app.run_frames(5), 5);
        assert_eq!(app.frame_count(), 5);
        assert!(!app.engine().is_running());
        assert!(app.engine().should_run());

        let profile = app.last_profile().unwrap();
        let stages = profile.segments.iter().map(|(s, _)| *s).collect::<Vec<_>>();
        assert_eq!(
            stages,
            vec![
                FrameStage::WindowEvents,
                FrameStage::BusDispatch,
                FrameStage::Update,
                FrameStage::SceneDrawing,
                FrameStage::CloseChecks,
            ]
        );
    }

    #[test]
    fn update_reaches_managed_resources() {
        let app = application();
        let keyboard = app.context().keyboards.load("keys", &LoaderOptions::new()).lock();

        let updates = Arc::new(Mutex::new(vec![]));
        let sink = updates.clone();
        keyboard.proceeder().add_action(EventType::Update, move |e| {
            sink.lock().push(e.to::<UpdateEvent>().elapsed)
        });

        app.run_frames(2);
        assert_eq!(*updates.lock(), vec![Duration::from_millis(16); 2]);
    }

    #[test]
    fn closing_every_window_stops_the_loop() {
        let app = application();
        let window = app.context().windows.load("main", &LoaderOptions::new()).lock();

        assert!(app.frame());
        window.close();
        assert!(!app.frame());
        assert_eq!(app.run(), 0);
    }

    #[test]
    fn escape_key_stops_the_loop() {
        let app = application();
        let backend = HeadlessWindow::new("main", (640, 480)).script(EventPayload::KeyDown(
            KeyEvent {
                key: Key::Escape,
                modifiers: KeyModifiers::empty(),
            },
        ));
        let window = app
            .context()
            .windows
            .load_holder(Holder::new_resource(Window::new(
                "main",
                "main",
                Box::new(backend),
            )))
            .lock();
        let keyboard = app.context().keyboards.load("keys", &LoaderOptions::new());
        window
            .proceeder()
            .add_listener(&keyboard.as_resource())
            .unwrap();

        assert_eq!(app.run_frames(10), 1);
    }

    #[test]
    fn disabled_behaviours_are_ignored() {
        let app = application();
        app.set_close_behaviour(CloseBehaviour::ALL_WINDOWS_CLOSED);
        app.terminate();
        assert_eq!(app.run_frames(3), 3);

        app.set_close_behaviour(CloseBehaviour::TERMINATE_CALLED);
        assert_eq!(app.run_frames(3), 1);
    }

    #[test]
    fn shutdown_from_another_thread() {
        let app = application();
        let user = app.user();
        std::thread::spawn(move || {
            if let Some(app) = user.lock().try_get() {
                app.engine().request_shutdown();
            }
        })
        .join()
        .unwrap();
        assert_eq!(app.run_frames(3), 0);
    }
}
