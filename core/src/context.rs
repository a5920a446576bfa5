//! `SupervisorContext`: one per emulator session (spec §3). Owns the
//! authoritative `state`, the Sync Channel, the engine handle, boot
//! configuration, artifact handles, and the rewind ring.
//!
//! Grounded on the teacher's `Machine`/`Emulator` ownership style
//! (`core/src/lib.rs`): one struct holding sub-resources, transitions
//! exposed as small methods rather than exposing the lock directly.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, Condvar};
use std::thread::JoinHandle;

use crate::{
    config::BootConfig,
    engine::{Components, Engine, KeySource, SioDriver},
    log::*,
    rewind::RewindRing,
    state::SupervisorState,
    sync::SyncChannel,
};

/// Guards `state`, `saved_state` and `interrupt_depth` (spec §3 invariant 1).
struct Locked {
    state: SupervisorState,
    saved_state: SupervisorState,
    interrupt_depth: u32,
}

/// Worker-lifecycle callbacks (spec §3: "Callbacks: startCallback,
/// cleanCallback (worker-side), plus per-frame/per-crash hooks"). All are
/// best-effort notifications, not control flow -- none of them can veto a
/// transition.
#[derive(Default)]
pub struct Hooks {
    /// Called once, right after the worker binds its thread-local context
    /// and before any artifact is loaded.
    pub start: Option<Box<dyn FnMut() + Send>>,
    /// Called once during teardown, after the engine handle is cleared.
    pub clean: Option<Box<dyn FnMut() + Send>>,
    /// Called every time `run_one_step` reports `StepOutcome::FrameComplete`.
    pub per_frame: Option<Box<dyn FnMut() + Send>>,
    /// Called when the engine reports `StepOutcome::Crashed`.
    pub per_crash: Option<Box<dyn FnMut() + Send>>,
}

/// One emulator session. Cheap to clone (it's `Arc`-wrapped internally by
/// `Controller`); the type itself is not `Clone` -- callers hold it behind
/// an `Arc<SupervisorContext>`.
pub struct SupervisorContext {
    locked: Mutex<Locked>,
    state_cond: Condvar,

    pub(crate) sync: SyncChannel,
    pub(crate) config: BootConfig,

    /// Set by the worker on entry, cleared on exit (invariant 4).
    pub(crate) engine: Mutex<Option<Box<dyn Engine>>>,

    /// Worker thread handle, set by `Controller::start`, taken by
    /// `Controller::join`.
    pub(crate) thread: Mutex<Option<JoinHandle<()>>>,

    pub(crate) rewind: Mutex<RewindRing>,

    /// Filled in by `Controller::start` once `lifecycle::resolve_rom` has
    /// found a ROM (either the configured path or a scanned candidate).
    /// `BootConfig` itself stays immutable (spec §3), so the resolved path
    /// lives here instead of being written back into it.
    pub(crate) resolved_rom: Mutex<Option<PathBuf>>,

    /// Debugger/cheats handle attached by the caller before `Start` (spec §3:
    /// "optional ... cheat device, debugger handle"; SPEC_FULL.md "Component
    /// table"). Taken by the worker's bootstrap phase and handed to
    /// `Engine::set_component_table`; `None` once taken.
    pub(crate) components: Mutex<Option<Components>>,

    /// Live input source attached by the caller before `Start` (spec §3 "key
    /// source"). Taken by the worker's bootstrap phase and handed to
    /// `Engine::set_key_source`.
    pub(crate) key_source: Mutex<Option<Arc<dyn KeySource>>>,

    /// Link-cable driver attached by the caller before `Start` (spec §3 "SIO
    /// drivers"). Taken by the worker's bootstrap phase and handed to
    /// `Engine::set_sio_driver`.
    pub(crate) sio_driver: Mutex<Option<Box<dyn SioDriver>>>,

    pub(crate) hooks: Mutex<Hooks>,
}

impl SupervisorContext {
    pub fn new(config: BootConfig) -> Arc<Self> {
        let rewind_capacity = config.rewind_capacity;
        Arc::new(Self {
            locked: Mutex::new(Locked {
                state: SupervisorState::Initialized,
                saved_state: SupervisorState::Initialized,
                interrupt_depth: 0,
            }),
            state_cond: Condvar::new(),
            sync: SyncChannel::new(),
            config,
            engine: Mutex::new(None),
            thread: Mutex::new(None),
            rewind: Mutex::new(RewindRing::new(rewind_capacity, config.rewind_interval)),
            resolved_rom: Mutex::new(None),
            components: Mutex::new(None),
            key_source: Mutex::new(None),
            sio_driver: Mutex::new(None),
            hooks: Mutex::new(Hooks::default()),
        })
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    /// Attaches the debugger/cheats component table to be handed to the
    /// engine at worker bootstrap. Must be called before `Controller::start`
    /// -- the worker takes it once, on entry, and never looks again.
    pub fn set_components(&self, components: Components) {
        *self.components.lock().expect("components mutex poisoned") = Some(components);
    }

    /// Attaches the live input source handed to `Engine::set_key_source` at
    /// worker bootstrap. Must be called before `Controller::start`.
    pub fn set_key_source(&self, key_source: Arc<dyn KeySource>) {
        *self.key_source.lock().expect("key source mutex poisoned") = Some(key_source);
    }

    /// Attaches the link-cable driver handed to `Engine::set_sio_driver` at
    /// worker bootstrap. Must be called before `Controller::start`.
    pub fn set_sio_driver(&self, driver: Box<dyn SioDriver>) {
        *self.sio_driver.lock().expect("sio driver mutex poisoned") = Some(driver);
    }

    /// Installs the worker-lifecycle hooks (spec §3 "Callbacks"). Must be
    /// called before `Controller::start`.
    pub fn set_hooks(&self, hooks: Hooks) {
        *self.hooks.lock().expect("hooks mutex poisoned") = hooks;
    }

    pub fn sync(&self) -> &SyncChannel {
        &self.sync
    }

    /// Reads `state` under the lock. Non-blocking.
    pub fn state(&self) -> SupervisorState {
        self.locked.lock().expect("state mutex poisoned").state
    }

    pub fn has_crashed(&self) -> bool {
        self.state() == SupervisorState::Crashed
    }

    pub fn has_exited(&self) -> bool {
        self.state() == SupervisorState::Shutdown
    }

    pub fn is_paused(&self) -> bool {
        self.state() == SupervisorState::Paused
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// `_waitOnInterrupt`: serializes every controller verb behind an active
    /// debugging session (spec §4.2).
    pub(crate) fn wait_on_interrupt(&self) {
        let mut guard = self.locked.lock().expect("state mutex poisoned");
        while guard.state == SupervisorState::Interrupted {
            guard = self.state_cond.wait(guard).expect("state mutex poisoned");
        }
    }

    /// Writes `state` and broadcasts. The sole place that mutates `state`
    /// outside of the more specialized helpers below.
    pub(crate) fn set_state(&self, new_state: SupervisorState) {
        let mut guard = self.locked.lock().expect("state mutex poisoned");
        guard.state = new_state;
        self.state_cond.notify_all();
    }

    /// Worker entry: `Initialized -> Running`.
    pub(crate) fn enter_running(&self) {
        self.set_state(SupervisorState::Running);
    }

    /// `Pause`: `Running -> Pausing`, then wait until the worker leaves
    /// `Pausing`.
    pub(crate) fn pause(&self) {
        {
            let mut guard = self.locked.lock().expect("state mutex poisoned");
            if guard.state == SupervisorState::Running {
                guard.state = SupervisorState::Pausing;
                self.state_cond.notify_all();
            }
        }
        self.sync.set_drawing_enabled(false);
        self.wait_until_not_state(SupervisorState::Pausing);
    }

    /// Worker self-pause: sets `Pausing` without waiting for the transition
    /// (the worker parks as soon as control returns to its own loop).
    pub(crate) fn pause_from_thread(&self) {
        let mut guard = self.locked.lock().expect("state mutex poisoned");
        if guard.state == SupervisorState::Running {
            guard.state = SupervisorState::Pausing;
            self.state_cond.notify_all();
        }
    }

    /// `Unpause` / the non-blocking half of `TogglePause`.
    pub(crate) fn unpause(&self) {
        let mut guard = self.locked.lock().expect("state mutex poisoned");
        if matches!(guard.state, SupervisorState::Paused | SupervisorState::Pausing) {
            guard.state = SupervisorState::Running;
            self.state_cond.notify_all();
        }
        drop(guard);
        self.sync.set_drawing_enabled(true);
    }

    /// `Reset`: any active state moves to `Reseting`.
    pub(crate) fn reset(&self) {
        let mut guard = self.locked.lock().expect("state mutex poisoned");
        if guard.state.is_active() && guard.state != SupervisorState::Initialized {
            guard.state = SupervisorState::Reseting;
            self.state_cond.notify_all();
        }
    }

    /// `Interrupt`: reentrant. Returns immediately if this is a nested call
    /// (an outer interrupt has already parked the worker); otherwise saves
    /// `state` and drives the worker to `Interrupted`.
    pub(crate) fn interrupt(&self) {
        let should_drive = {
            let mut guard = self.locked.lock().expect("state mutex poisoned");
            guard.interrupt_depth += 1;
            debug!("interrupt depth now {}", guard.interrupt_depth);
            if guard.interrupt_depth > 1 {
                false
            } else {
                guard.saved_state = guard.state;
                if guard.state == SupervisorState::Running {
                    guard.state = SupervisorState::Interrupting;
                    self.state_cond.notify_all();
                }
                true
            }
        };

        if should_drive {
            self.wait_until_not_state(SupervisorState::Interrupting);
        }
    }

    /// `Continue`: unwinds one level of interrupt; restores `saved_state`
    /// once depth reaches 0.
    pub(crate) fn continue_(&self) {
        let mut guard = self.locked.lock().expect("state mutex poisoned");
        debug_assert!(guard.interrupt_depth > 0, "Continue without a matching Interrupt");
        if guard.interrupt_depth == 0 {
            // Caller bug (spec §7.3): leave state unchanged.
            return;
        }

        guard.interrupt_depth -= 1;
        if guard.interrupt_depth == 0 {
            guard.state = guard.saved_state;
            self.state_cond.notify_all();
        }
    }

    /// `End`: initiate exit from any state, waking both sync channels so
    /// nothing stays parked (spec §5 "Cancellation": always safe, from any
    /// state).
    pub(crate) fn end(&self) {
        self.set_state(SupervisorState::Exiting);
        self.sync.set_video_wait(false);
        self.sync.set_drawing_enabled(true);
        self.sync.set_audio_wait(false);
    }

    /// Worker-side: mark the worker done. Per Design Notes §9(c), a single
    /// unconditional write suffices; the source's retry-on-spurious-failure
    /// loop has no counterpart here.
    pub(crate) fn enter_shutdown(&self) {
        self.set_state(SupervisorState::Shutdown);
    }

    /// Worker-side: mark a terminal engine failure. Called from
    /// `worker::run_inner_loop` when `Engine::run_one_step` reports
    /// `StepOutcome::Crashed` (spec §9(b): `CRASHED` is not part of the
    /// `Running..Shutdown` total order, so the worker's teardown phase
    /// leaves it alone instead of overwriting it with `Shutdown`).
    pub(crate) fn mark_crashed(&self) {
        self.set_state(SupervisorState::Crashed);
    }

    /// `_waitUntilNotState`: blocks until `state != old_state`. Must release
    /// `locked` before waking the sync condvars (cross-wake discipline, spec
    /// §4.2) -- otherwise the worker could never drain them to reach
    /// `locked` itself. Temporarily clears `videoFrameWait` while looping so
    /// a producer parked in `post_frame` can make progress, restoring the
    /// prior value on exit.
    fn wait_until_not_state(&self, old_state: SupervisorState) {
        // `video_mutex` and `locked` are independent locks, so clearing the
        // video-wait flag here (before touching `locked`) can't deadlock;
        // it just ensures a producer parked in `post_frame` can drain its
        // critical section and eventually reach a point where it notices
        // the new `state`.
        let prev_video_wait = self.sync.set_video_wait(false);

        let mut guard = self.locked.lock().expect("state mutex poisoned");
        while guard.state == old_state {
            guard = self.state_cond.wait(guard).expect("state mutex poisoned");
        }
        drop(guard);

        self.sync.set_video_wait(prev_video_wait);
    }

    /// Worker-side: react to a transient state seen in the outer loop (spec
    /// §4.3). Returns `true` if a reset is now pending.
    pub(crate) fn worker_handle_transient(&self) -> bool {
        let mut reset_pending = false;
        let mut guard = self.locked.lock().expect("state mutex poisoned");

        while guard.state.is_transient() {
            match guard.state {
                SupervisorState::Pausing => {
                    guard.state = SupervisorState::Paused;
                    self.state_cond.notify_all();
                }
                SupervisorState::Interrupting => {
                    guard.state = SupervisorState::Interrupted;
                    self.state_cond.notify_all();
                }
                SupervisorState::Reseting => {
                    reset_pending = true;
                    guard.state = SupervisorState::Running;
                    self.state_cond.notify_all();
                    break;
                }
                SupervisorState::Paused | SupervisorState::Interrupted => {
                    guard = self.state_cond.wait(guard).expect("state mutex poisoned");
                }
                _ => unreachable!("is_transient() guarantees one of the above"),
            }
        }

        reset_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootConfig;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn fresh() -> Arc<SupervisorContext> {
        SupervisorContext::new(BootConfig::default())
    }

    #[test]
    fn pause_then_unpause_is_noop_on_observed_state() {
        let ctx = fresh();
        ctx.enter_running();
        assert_eq!(ctx.state(), SupervisorState::Running);

        // A worker stand-in: repeatedly performs whatever transition the
        // current transient state calls for, exactly like the real outer
        // loop's "while RUNNING < state < EXITING" block (spec §4.3).
        let worker_ctx = ctx.clone();
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let worker_stop = stop.clone();
        let worker = thread::spawn(move || {
            while !worker_stop.load(std::sync::atomic::Ordering::SeqCst) {
                worker_ctx.worker_handle_transient();
                thread::sleep(Duration::from_millis(1));
            }
        });

        ctx.pause();
        assert_eq!(ctx.state(), SupervisorState::Paused);
        ctx.unpause();
        assert_eq!(ctx.state(), SupervisorState::Running);

        stop.store(true, std::sync::atomic::Ordering::SeqCst);
        worker.join().unwrap();
    }

    #[test]
    fn nested_interrupt_restores_prior_state() {
        let ctx = fresh();
        ctx.enter_running();

        // Worker stand-in: watches for `Interrupting`/`Pausing` and performs
        // the transition the real worker loop would.
        let worker_ctx = ctx.clone();
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let worker_stop = stop.clone();
        let worker = thread::spawn(move || {
            while !worker_stop.load(std::sync::atomic::Ordering::SeqCst) {
                worker_ctx.worker_handle_transient();
                thread::sleep(Duration::from_millis(1));
            }
        });

        ctx.interrupt();
        assert_eq!(ctx.state(), SupervisorState::Interrupted);
        ctx.interrupt(); // nested; returns immediately, no state change
        assert_eq!(ctx.state(), SupervisorState::Interrupted);

        ctx.continue_();
        assert_eq!(ctx.state(), SupervisorState::Interrupted, "one Continue must not unwind a depth-2 interrupt");

        ctx.continue_();
        assert_eq!(ctx.state(), SupervisorState::Running);

        stop.store(true, std::sync::atomic::Ordering::SeqCst);
        worker.join().unwrap();
    }

    #[test]
    fn end_while_interrupted_reaches_shutdown() {
        let ctx = fresh();
        ctx.enter_running();
        ctx.interrupt();
        assert_eq!(ctx.state(), SupervisorState::Interrupted);

        ctx.end();
        assert_eq!(ctx.state(), SupervisorState::Exiting);
        ctx.enter_shutdown();
        assert_eq!(ctx.state(), SupervisorState::Shutdown);
    }
}
