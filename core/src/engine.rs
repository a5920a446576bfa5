//! The engine capability surface (spec §6): everything the core knows how
//! to ask the hosted emulator to do. The core never assumes a concrete CPU
//! or video/audio pipeline -- it depends on this trait, matching the
//! teacher's `env::Peripherals` pattern (`core/src/env.rs`: "Model as a
//! small behavioral abstraction the supervisor depends on, not as a
//! concrete type", Design Notes §9).

use std::sync::Arc;

use crate::artifacts::VirtualFile;
use crate::log::*;
use crate::sync::SyncChannel;

/// One frame's worth of pixels plus the renderer's reported dimensions,
/// handed back from `Engine::get_pixels` (used by the screenshot helper and
/// the desktop video presenter). `pixels` is tightly packed RGB24, `stride`
/// bytes per row.
pub struct FrameBuffer<'a> {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub pixels: &'a [u8],
}

/// What `Engine::run_one_step` reports happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The engine is still mid-frame; call `run_one_step` again.
    Continue,
    /// A full video frame was completed (a `PostFrame` call already
    /// happened as a side effect of reaching this point).
    FrameComplete,
    /// The engine hit an unrecoverable failure. The worker will move to
    /// `Crashed`.
    Crashed,
}

/// Pluggable out-of-band components the engine may consult (spec §6
/// `set_component_table`; SPEC_FULL.md "Component table"). `Debugger` is
/// `Sync` (unlike `Cheats`) because the worker loop keeps its own `Arc`
/// clone alongside the one handed to the engine, so it can delegate outer-
/// loop stepping to it directly (spec §4.3 phase 3).
pub trait Debugger: Send + Sync {
    fn post_event(&self, message: &str);

    /// Delegated stepping while a debugger is attached (spec §4.3 phase 3,
    /// first bullet): drives the engine for this outer-loop iteration under
    /// debugger control instead of the plain run-to-frame-boundary loop.
    /// Returns `true` once the debugger wants the worker to leave the outer
    /// loop for `EXITING`.
    fn step(&self, engine: &mut dyn Engine, sync: &SyncChannel) -> bool;
}

pub trait Cheats: Send {
    /// Applies all active cheat codes to memory. Called once per frame by
    /// the engine, not by the core.
    fn apply(&self);
}

/// External input source (spec §3 "key source"; §6 `set_key_source`).
/// `Sync` for the same reason `Debugger` is: the controller thread that owns
/// the real input device and the worker thread both need a handle to it.
pub trait KeySource: Send + Sync {
    /// Current button-state bitmask, polled by the engine once per frame.
    fn poll(&self) -> u32;
}

/// Serial-link ("link cable") driver (spec §3 "SIO drivers"; §6
/// `set_sio_drivers`).
pub trait SioDriver: Send {
    /// Exchanges one byte over the link; returns the byte shifted back in.
    fn exchange_byte(&mut self, out: u8) -> u8;
}

#[derive(Default)]
pub struct Components {
    pub debugger: Option<Arc<dyn Debugger>>,
    pub cheats: Option<Box<dyn Cheats>>,
}

/// The engine capability set the supervisor core depends on. A real
/// implementation wraps a CPU+PPU+APU; `engine::tests::TestEngine` (below)
/// is a minimal stand-in used by the core's own concurrency tests and by
/// `desktop`'s reference build.
pub trait Engine: Send {
    fn reset(&mut self, skip_bios: bool);

    /// Advances the engine by one schedulable step. The engine is
    /// responsible for calling `sync.post_frame()` itself whenever a frame
    /// boundary is reached (spec §4.1: "the Worker calls PostFrame once per
    /// simulated frame inside the section").
    fn run_one_step(&mut self, sync: &crate::sync::SyncChannel) -> StepOutcome;

    /// Forces `run_one_step` to return at the next opportunity (spec §6:
    /// "set_nextEvent = 0"). Used by `Interrupt` to ensure prompt parking.
    fn force_return(&mut self);

    /// Ensures the CPU is runnable again after `End` (spec §6:
    /// "set_halted = false").
    fn set_runnable(&mut self);

    fn set_component_table(&mut self, components: Components);

    fn get_pixels(&self) -> FrameBuffer<'_>;

    /// Opaque serialized snapshot, used by the rewind ring and by explicit
    /// save-state requests. Kept as raw bytes (rather than an associated
    /// type) so `Box<dyn Engine>` stays object-safe -- the supervisor core
    /// never interprets the bytes, only stores and replays them.
    fn serialize_state(&self) -> Vec<u8>;
    fn deserialize_state(&mut self, snapshot: &[u8]);

    fn load_rom(&mut self, rom: &mut dyn VirtualFile, save: Option<&mut dyn VirtualFile>) -> Result<(), failure::Error>;
    fn load_bios(&mut self, bios: &mut dyn VirtualFile) -> Result<(), failure::Error>;
    fn apply_patch(&mut self, patch: &mut dyn VirtualFile) -> Result<(), failure::Error>;
    fn apply_override(&mut self, data: &[u8]);

    /// Attaches (or detaches, on `None`) the live input source (spec §6
    /// `set_key_source`). Default no-op for engines with no input surface.
    fn set_key_source(&mut self, _key_source: Option<Arc<dyn KeySource>>) {}

    /// Attaches (or detaches) the link-cable driver (spec §6
    /// `set_sio_drivers`). Default no-op.
    fn set_sio_driver(&mut self, _driver: Option<Box<dyn SioDriver>>) {}

    /// Loads a replay movie to drive input deterministically in place of a
    /// live `KeySource` (spec §3 "Optional replay-movie handle"). Default:
    /// unsupported, recovered locally like any other optional artifact (spec
    /// §7) rather than failing bootstrap.
    fn load_replay(&mut self, _replay: &mut dyn VirtualFile) -> Result<(), failure::Error> {
        Err(failure::format_err!("replay movies are not supported by this engine"))
    }
}

/// Shared no-op fallback used wherever recovering from an external-artifact
/// failure is the correct behavior (spec §7: "Errors from external
/// collaborators are recovered locally").
pub(crate) fn log_recovered_error(what: &str, err: &failure::Error) {
    warn!("{} failed, continuing without it: {}", what, err);
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// A minimal engine used by the core's own tests: "frames" are just a
    /// counter that reaches a fixed threshold, with no real CPU behind it.
    /// Grounded on the same idea as the teacher's `Emulator::execute_frame`
    /// test harness (run N steps, observe V-Blank boundaries) but reduced to
    /// the bare minimum the supervisor's concurrency tests need.
    pub struct TestEngine {
        pub steps_per_frame: u32,
        steps_this_frame: u32,
        pub crash_after_frames: Option<u32>,
        frames_emitted: u32,
        components: Components,
    }

    impl TestEngine {
        pub fn new(steps_per_frame: u32) -> Self {
            Self {
                steps_per_frame,
                steps_this_frame: 0,
                crash_after_frames: None,
                frames_emitted: 0,
                components: Components::default(),
            }
        }
    }

    impl Engine for TestEngine {
        fn reset(&mut self, _skip_bios: bool) {
            self.steps_this_frame = 0;
            self.frames_emitted = 0;
        }

        fn run_one_step(&mut self, sync: &crate::sync::SyncChannel) -> StepOutcome {
            if let Some(limit) = self.crash_after_frames {
                if self.frames_emitted >= limit {
                    return StepOutcome::Crashed;
                }
            }

            self.steps_this_frame += 1;
            if self.steps_this_frame >= self.steps_per_frame {
                self.steps_this_frame = 0;
                self.frames_emitted += 1;
                sync.post_frame();
                return StepOutcome::FrameComplete;
            }
            StepOutcome::Continue
        }

        fn force_return(&mut self) {
            self.steps_this_frame = self.steps_per_frame;
        }

        fn set_runnable(&mut self) {}

        fn set_component_table(&mut self, components: Components) {
            self.components = components;
        }

        fn get_pixels(&self) -> FrameBuffer<'_> {
            FrameBuffer { width: 0, height: 0, stride: 0, pixels: &[] }
        }

        fn serialize_state(&self) -> Vec<u8> {
            self.frames_emitted.to_le_bytes().to_vec()
        }

        fn deserialize_state(&mut self, snapshot: &[u8]) {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&snapshot[..4]);
            self.frames_emitted = u32::from_le_bytes(bytes);
        }

        fn load_rom(&mut self, _rom: &mut dyn VirtualFile, _save: Option<&mut dyn VirtualFile>) -> Result<(), failure::Error> {
            Ok(())
        }

        fn load_bios(&mut self, _bios: &mut dyn VirtualFile) -> Result<(), failure::Error> {
            Ok(())
        }

        fn apply_patch(&mut self, _patch: &mut dyn VirtualFile) -> Result<(), failure::Error> {
            Ok(())
        }

        fn apply_override(&mut self, _data: &[u8]) {}
    }

    #[test]
    fn reaching_steps_per_frame_emits_frame_complete() {
        let sync = crate::sync::SyncChannel::new();
        sync.set_video_wait(false);
        let mut engine = TestEngine::new(3);

        assert_eq!(engine.run_one_step(&sync), StepOutcome::Continue);
        assert_eq!(engine.run_one_step(&sync), StepOutcome::Continue);
        assert_eq!(engine.run_one_step(&sync), StepOutcome::FrameComplete);
    }

    #[test]
    fn crash_after_frames_reports_crashed() {
        let sync = crate::sync::SyncChannel::new();
        sync.set_video_wait(false);
        let mut engine = TestEngine::new(1);
        engine.crash_after_frames = Some(1);

        assert_eq!(engine.run_one_step(&sync), StepOutcome::FrameComplete);
        assert_eq!(engine.run_one_step(&sync), StepOutcome::Crashed);
    }
}
