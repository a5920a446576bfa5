//! Immutable boot configuration (spec §3: "Immutable boot config").
//!
//! Grounded on the teacher's `desktop/src/args.rs` (a `structopt` struct):
//! this is the core-side counterpart that doesn't know about `structopt`
//! itself (that's the desktop crate's job, see `desktop/src/args.rs`), it
//! just holds the resolved values the CLI layer produces.

use std::path::PathBuf;

/// How many frames the worker may emit per consumer cycle before it's
/// forced to wait (see `sync::SyncChannel::post_frame`).
pub type FrameSkip = i64;

#[derive(Debug, Clone)]
pub struct BootConfig {
    pub frame_skip: FrameSkip,
    pub fps_target: f64,
    pub audio_buffer_count: u32,
    pub skip_bios: bool,
    /// Hint to the engine that it may skip idle-loop busywork (e.g. HALT
    /// spinning) when nothing is listening on the audio/video channels.
    pub idle_optimization: bool,
    pub log_level: log::LevelFilter,
    /// Opaque cartridge-override bytes (e.g. a forced RTC value or save
    /// type); passed through to `Engine::apply_override` untouched.
    pub override_data: Option<Vec<u8>>,

    pub rom_path: Option<PathBuf>,
    pub bios_path: Option<PathBuf>,
    pub patch_path: Option<PathBuf>,
    /// Replay-movie file applied at worker bootstrap via `Engine::load_replay`
    /// (spec §3 "Optional replay-movie handle"; §4.3 phase 1). Like
    /// `patch_path`, a missing or unreadable replay is recovered locally, not
    /// fatal.
    pub replay_path: Option<PathBuf>,
    pub game_directory: Option<PathBuf>,
    pub state_directory: Option<PathBuf>,

    pub rewind_capacity: usize,
    pub rewind_interval: u32,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            frame_skip: 0,
            fps_target: 60.0,
            audio_buffer_count: 4,
            skip_bios: false,
            idle_optimization: true,
            log_level: log::LevelFilter::Info,
            override_data: None,
            rom_path: None,
            bios_path: None,
            patch_path: None,
            replay_path: None,
            game_directory: None,
            state_directory: None,
            rewind_capacity: 600,
            rewind_interval: 60,
        }
    }
}
