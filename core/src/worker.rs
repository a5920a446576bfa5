//! The Worker Loop (spec §4.3). Grounded on the teacher's
//! `desktop/src/emu.rs` `emulator_thread` shape: a `loop` that drives the
//! engine and reacts to its disruption signal, generalized into the spec's
//! full outer-loop/inner-loop phase structure with pause/interrupt/reset
//! handling folded in.

use std::sync::Arc;

use crate::{
    artifacts::FsFile,
    context::SupervisorContext,
    engine::{log_recovered_error, Debugger, Engine, StepOutcome},
    lifecycle,
    log::*,
    registry,
    state::SupervisorState,
};

/// The worker thread body. Owns the engine for its entire lifetime; `engine`
/// is installed into `context.engine` on entry and removed on exit
/// (invariant 4, spec §3).
pub(crate) fn run<E: Engine + 'static>(context: Arc<SupervisorContext>, mut engine: E) {
    // Phase 1: bind thread-local context (spec §4.3 phase 1). SIGINT/SIGTRAP
    // arrived already blocked on this thread -- inherited from the
    // controller thread's mask at spawn time (`Controller::start`) -- and
    // are left that way for the worker's whole life, so the kernel delivers
    // them to the controller thread instead.
    registry::publish(&context);

    if let Some(start) = context.hooks.lock().expect("hooks mutex poisoned").start.as_mut() {
        start();
    }

    // Wire up cheats/debugger, key source, SIO driver, then BIOS/patch/
    // cartridge/replay/overrides.
    let components = context.components.lock().expect("components mutex poisoned").take().unwrap_or_default();
    let debugger = components.debugger.clone();
    engine.set_component_table(components);

    let key_source = context.key_source.lock().expect("key source mutex poisoned").take();
    engine.set_key_source(key_source);

    let sio_driver = context.sio_driver.lock().expect("sio driver mutex poisoned").take();
    engine.set_sio_driver(sio_driver);

    load_artifacts(&context, &mut engine);
    engine.reset(context.config().skip_bios);

    {
        let mut slot = context.engine.lock().expect("engine mutex poisoned");
        *slot = Some(Box::new(engine));
    }

    // Phase 2: transition to Running, broadcast.
    context.enter_running();
    debug!("worker entered Running");

    // Phase 3: outer loop.
    while context.state().is_active() {
        match &debugger {
            Some(debugger) => run_inner_loop_with_debugger(&context, debugger),
            None => run_inner_loop(&context),
        }

        let reset_pending = context.worker_handle_transient();

        if reset_pending {
            let mut slot = context.engine.lock().expect("engine mutex poisoned");
            if let Some(engine) = slot.as_mut() {
                engine.reset(context.config().skip_bios);
            }
            debug!("engine reset, re-entering Running");
        }
    }

    // Phase 4: tear down. `Crashed` is terminal and not part of the
    // Running..Shutdown total order (spec §4.2's ordering table never
    // mentions it) -- leave it as-is so `HasCrashed` stays observable,
    // rather than overwriting it with `Shutdown`.
    {
        let mut slot = context.engine.lock().expect("engine mutex poisoned");
        *slot = None;
    }
    if context.state() != SupervisorState::Crashed {
        context.enter_shutdown();
    }
    context.sync().set_video_wait(false);
    context.sync().set_drawing_enabled(true);
    context.sync().set_audio_wait(false);

    if let Some(clean) = context.hooks.lock().expect("hooks mutex poisoned").clean.as_mut() {
        clean();
    }

    registry::clear();
    debug!("worker finished (state = {:?})", context.state());
}

/// Opens BIOS/patch/replay/cartridge/save artifacts and hands them to the
/// engine. Every failure here is recovered locally (spec §7): a missing or
/// unreadable BIOS, patch, replay, or save just means the engine runs
/// without it, logged via `log_recovered_error`. Only a missing ROM is
/// fatal, and that was already checked by `lifecycle::resolve_rom` before
/// the worker was ever spawned.
fn load_artifacts<E: Engine>(context: &SupervisorContext, engine: &mut E) {
    let rom_path = context
        .resolved_rom
        .lock()
        .expect("resolved_rom mutex poisoned")
        .clone();
    let rom_path = match rom_path {
        Some(path) => path,
        None => return,
    };

    if let Some(bios_path) = &context.config().bios_path {
        match FsFile::open(bios_path) {
            Ok(mut bios) => {
                if let Err(err) = engine.load_bios(&mut bios) {
                    log_recovered_error("loading BIOS", &err);
                }
            }
            Err(err) => log_recovered_error("opening BIOS file", &err.into()),
        }
    }

    let patch_path = lifecycle::resolve_patch(context, &rom_path);

    let save_path = context
        .config()
        .state_directory
        .as_ref()
        .map(|dir| dir.join(rom_path.file_name().unwrap_or_default()).with_extension("sav"));

    let mut rom = match FsFile::open(&rom_path) {
        Ok(rom) => rom,
        Err(err) => {
            log_recovered_error("opening ROM file", &err.into());
            return;
        }
    };

    let mut save = save_path.as_ref().and_then(|path| match FsFile::open(path) {
        Ok(save) => Some(save),
        // A missing save is the ordinary case for a fresh game, not worth a
        // warning; any other failure (permissions, a directory in its place,
        // ...) is recovered the same way a bad BIOS/patch is.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            log_recovered_error("opening save file", &err.into());
            None
        }
    });
    let load_result = engine.load_rom(&mut rom, save.as_mut().map(|f| f as &mut dyn crate::artifacts::VirtualFile));
    if let Err(err) = load_result {
        log_recovered_error("loading ROM", &err);
    }

    if let Some(patch_path) = patch_path {
        match FsFile::open(&patch_path) {
            Ok(mut patch) => {
                if let Err(err) = engine.apply_patch(&mut patch) {
                    log_recovered_error("applying patch", &err);
                }
            }
            Err(err) => log_recovered_error("opening patch file", &err.into()),
        }
    }

    if let Some(replay_path) = &context.config().replay_path {
        match FsFile::open(replay_path) {
            Ok(mut replay) => {
                if let Err(err) = engine.load_replay(&mut replay) {
                    log_recovered_error("loading replay movie", &err);
                }
            }
            Err(err) => log_recovered_error("opening replay file", &err.into()),
        }
    }

    if let Some(data) = &context.config().override_data {
        engine.apply_override(data);
    }
}

/// Steps the engine while `state == Running`. Returning from this function
/// means the outer loop needs to handle a transient state (pause, interrupt,
/// reset) or leave (exiting).
fn run_inner_loop(context: &SupervisorContext) {
    loop {
        if context.state() != SupervisorState::Running {
            return;
        }

        let outcome = {
            let mut slot = context.engine.lock().expect("engine mutex poisoned");
            let engine = slot.as_mut().expect("engine handle present while Running");
            engine.run_one_step(context.sync())
        };

        match outcome {
            StepOutcome::Continue => {}
            StepOutcome::FrameComplete => {
                let mut slot = context.engine.lock().expect("engine mutex poisoned");
                let engine = slot.as_mut().expect("engine handle present while Running");
                let mut rewind = context.rewind.lock().expect("rewind mutex poisoned");
                rewind.on_frame_complete(|| engine.serialize_state());
                drop(rewind);
                drop(slot);
                if let Some(per_frame) = context.hooks.lock().expect("hooks mutex poisoned").per_frame.as_mut() {
                    per_frame();
                }
            }
            StepOutcome::Crashed => {
                error!("engine reported an unrecoverable failure");
                if let Some(per_crash) = context.hooks.lock().expect("hooks mutex poisoned").per_crash.as_mut() {
                    per_crash();
                }
                context.mark_crashed();
                return;
            }
        }
    }
}

/// Same role as `run_inner_loop`, but for when a debugger is attached (spec
/// §4.3 phase 3: "if a debugger is attached, delegate stepping to it; when
/// it reports shutdown, move to EXITING"). Stepping itself is entirely the
/// debugger's call; the worker only watches for the transient/shutdown
/// signals around it.
fn run_inner_loop_with_debugger(context: &SupervisorContext, debugger: &Arc<dyn Debugger>) {
    loop {
        if context.state() != SupervisorState::Running {
            return;
        }

        let wants_shutdown = {
            let mut slot = context.engine.lock().expect("engine mutex poisoned");
            let engine = slot.as_mut().expect("engine handle present while Running");
            debugger.step(&mut **engine, context.sync())
        };

        if wants_shutdown {
            debug!("debugger requested shutdown");
            context.end();
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootConfig;
    use crate::engine::tests::TestEngine;
    use std::time::Duration;

    #[test]
    fn worker_runs_to_shutdown_after_end() {
        let context = SupervisorContext::new(BootConfig::default());
        context.sync().set_video_wait(false);

        let worker_ctx = context.clone();
        let handle = std::thread::spawn(move || {
            run(worker_ctx, TestEngine::new(2));
        });

        // Give the worker a moment to actually start running.
        std::thread::sleep(Duration::from_millis(20));
        assert!(context.is_active());

        context.end();
        handle.join().unwrap();
        assert_eq!(context.state(), SupervisorState::Shutdown);
    }

    #[test]
    fn worker_crash_reaches_crashed_state() {
        let context = SupervisorContext::new(BootConfig::default());
        context.sync().set_video_wait(false);

        let mut engine = TestEngine::new(1);
        engine.crash_after_frames = Some(2);

        let worker_ctx = context.clone();
        let handle = std::thread::spawn(move || {
            run(worker_ctx, engine);
        });

        handle.join().unwrap();
        assert_eq!(context.state(), SupervisorState::Crashed);
    }

    /// A debugger stand-in that hands stepping straight to the engine and
    /// reports shutdown after a fixed number of steps.
    struct StepsThenShutdown {
        remaining: std::sync::atomic::AtomicU32,
    }

    impl crate::engine::Debugger for StepsThenShutdown {
        fn post_event(&self, _message: &str) {}

        fn step(&self, engine: &mut dyn Engine, sync: &crate::sync::SyncChannel) -> bool {
            if self.remaining.load(std::sync::atomic::Ordering::SeqCst) == 0 {
                return true;
            }
            self.remaining.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            engine.run_one_step(sync);
            false
        }
    }

    #[test]
    fn attached_debugger_delegates_stepping_and_can_end_the_session() {
        let context = SupervisorContext::new(BootConfig::default());
        context.sync().set_video_wait(false);
        context.set_components(crate::engine::Components {
            debugger: Some(Arc::new(StepsThenShutdown { remaining: std::sync::atomic::AtomicU32::new(3) })),
            cheats: None,
        });

        let worker_ctx = context.clone();
        let handle = std::thread::spawn(move || {
            run(worker_ctx, TestEngine::new(100));
        });

        handle.join().unwrap();
        assert_eq!(context.state(), SupervisorState::Shutdown);
    }
}
