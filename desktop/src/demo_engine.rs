//! A reference `Engine` implementation for the CLI to host. The instruction-
//! set emulator itself is explicitly out of scope for this specification
//! (spec §1 "Out of scope"), so this is a synthetic stand-in: a
//! color-cycling test pattern and a sine-wave tone, just enough to exercise
//! the supervisor core's frame pacing, audio back-pressure, and screenshot
//! paths end to end.
//!
//! Grounded on the teacher's own `main.rs`, which drives a literal
//! color-cycling placeholder buffer (`for i in buffer.iter_mut() { *i = color
//! }`) ahead of wiring up the real Game Boy core -- this is that same idea,
//! generalized into a full `Engine` implementation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use emusup_core::engine::{Components, Engine, FrameBuffer, StepOutcome};
use emusup_core::artifacts::VirtualFile;
use emusup_core::sync::SyncChannel;

pub const WIDTH: usize = 160;
pub const HEIGHT: usize = 144;

/// Steps of `run_one_step` that make up one simulated frame. Arbitrary for a
/// synthetic engine; a real one would instead run until a V-Blank boundary.
const STEPS_PER_FRAME: u32 = 8;

/// Frames between audio chunks, matched to `audio_buffer_count` loosely.
const FRAMES_PER_AUDIO_CHUNK: u32 = 2;

const SAMPLE_RATE: u32 = 48_000;
const SAMPLES_PER_CHUNK: usize = (SAMPLE_RATE as usize * FRAMES_PER_AUDIO_CHUNK as usize) / 60;

pub struct DemoEngine {
    steps_this_frame: u32,
    frames_since_audio: u32,
    phase: u8,
    tone_phase: f64,
    pixels: Vec<u8>,
    shared_frame: Arc<Mutex<Vec<u8>>>,
    audio_buffer: Arc<Mutex<VecDeque<i16>>>,
    components: Components,
}

impl DemoEngine {
    pub fn new(shared_frame: Arc<Mutex<Vec<u8>>>, audio_buffer: Arc<Mutex<VecDeque<i16>>>) -> Self {
        Self {
            steps_this_frame: 0,
            frames_since_audio: 0,
            phase: 0,
            tone_phase: 0.0,
            pixels: vec![0u8; WIDTH * HEIGHT * 3],
            shared_frame,
            audio_buffer,
            components: Components::default(),
        }
    }

    fn render_test_pattern(&mut self) {
        self.phase = self.phase.wrapping_add(1);
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let idx = (y * WIDTH + x) * 3;
                self.pixels[idx] = x as u8 ^ self.phase;
                self.pixels[idx + 1] = y as u8 ^ self.phase;
                self.pixels[idx + 2] = self.phase;
            }
        }
        *self.shared_frame.lock().expect("shared frame poisoned") = self.pixels.clone();
    }

    fn push_audio_chunk(&mut self, sync: &SyncChannel) {
        let mut samples = Vec::with_capacity(SAMPLES_PER_CHUNK);
        for _ in 0..SAMPLES_PER_CHUNK {
            samples.push((self.tone_phase.sin() * i16::MAX as f64 * 0.2) as i16);
            self.tone_phase += 2.0 * std::f64::consts::PI * 440.0 / SAMPLE_RATE as f64;
        }

        let section = sync.lock_audio();
        self.audio_buffer.lock().expect("audio buffer poisoned").extend(samples);
        section.produce(true);
    }
}

impl Engine for DemoEngine {
    fn reset(&mut self, _skip_bios: bool) {
        self.steps_this_frame = 0;
        self.frames_since_audio = 0;
        self.phase = 0;
        self.tone_phase = 0.0;
        self.audio_buffer.lock().expect("audio buffer poisoned").clear();
    }

    fn run_one_step(&mut self, sync: &SyncChannel) -> StepOutcome {
        self.steps_this_frame += 1;
        if self.steps_this_frame < STEPS_PER_FRAME {
            return StepOutcome::Continue;
        }
        self.steps_this_frame = 0;

        self.render_test_pattern();
        sync.post_frame();

        self.frames_since_audio += 1;
        if self.frames_since_audio >= FRAMES_PER_AUDIO_CHUNK {
            self.frames_since_audio = 0;
            self.push_audio_chunk(sync);
        }

        StepOutcome::FrameComplete
    }

    fn force_return(&mut self) {
        self.steps_this_frame = STEPS_PER_FRAME;
    }

    fn set_runnable(&mut self) {}

    fn set_component_table(&mut self, components: Components) {
        self.components = components;
    }

    fn get_pixels(&self) -> FrameBuffer<'_> {
        FrameBuffer { width: WIDTH, height: HEIGHT, stride: WIDTH * 3, pixels: &self.pixels }
    }

    fn serialize_state(&self) -> Vec<u8> {
        let mut bytes = vec![self.phase];
        bytes.extend_from_slice(&self.steps_this_frame.to_le_bytes());
        bytes
    }

    fn deserialize_state(&mut self, snapshot: &[u8]) {
        if snapshot.is_empty() {
            return;
        }
        self.phase = snapshot[0];
        if snapshot.len() >= 5 {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&snapshot[1..5]);
            self.steps_this_frame = u32::from_le_bytes(bytes);
        }
    }

    fn load_rom(&mut self, rom: &mut dyn VirtualFile, _save: Option<&mut dyn VirtualFile>) -> Result<(), failure::Error> {
        let mut probe = [0u8; 4];
        rom.read(&mut probe)?;
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
