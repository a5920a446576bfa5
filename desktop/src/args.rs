//! CLI arguments, translated into a `BootConfig` for the core. Grounded on
//! the teacher's `args.rs` (a `StructOpt` derive with a custom `parse_scale`
//! for `minifb::Scale`), generalized to the full set of boot knobs
//! `BootConfig` exposes.

use std::path::PathBuf;

use emusup_core::BootConfig;
use minifb::Scale;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
pub struct Args {
    /// Path to the ROM file. If omitted, `--game-dir` is scanned for the
    /// first file that looks like a ROM.
    #[structopt(parse(from_os_str))]
    pub rom_path: Option<PathBuf>,

    #[structopt(long = "bios", parse(from_os_str))]
    pub bios_path: Option<PathBuf>,

    #[structopt(long = "patch", parse(from_os_str))]
    pub patch_path: Option<PathBuf>,

    #[structopt(long = "game-dir", parse(from_os_str))]
    pub game_directory: Option<PathBuf>,

    #[structopt(long = "state-dir", parse(from_os_str))]
    pub state_directory: Option<PathBuf>,

    #[structopt(long = "skip-bios")]
    pub skip_bios: bool,

    #[structopt(long = "frame-skip", default_value = "0")]
    pub frame_skip: i64,

    #[structopt(long = "fps", default_value = "60.0")]
    pub fps_target: f64,

    #[structopt(long = "audio-buffers", default_value = "4")]
    pub audio_buffer_count: u32,

    #[structopt(long = "rewind-capacity", default_value = "600")]
    pub rewind_capacity: usize,

    #[structopt(long = "rewind-interval", default_value = "60")]
    pub rewind_interval: u32,

    #[structopt(long = "no-idle-optimization")]
    pub no_idle_optimization: bool,

    #[structopt(long = "debug")]
    pub debug: bool,

    #[structopt(
        long = "scale",
        default_value = "4",
        parse(try_from_str = "parse_scale"),
        help = "Window scale factor: 1, 2, 4, 8, 16, 32 or 'fit'."
    )]
    pub scale: Scale,
}

impl Args {
    pub fn to_boot_config(&self) -> BootConfig {
        BootConfig {
            frame_skip: self.frame_skip,
            fps_target: self.fps_target,
            audio_buffer_count: self.audio_buffer_count,
            skip_bios: self.skip_bios,
            idle_optimization: !self.no_idle_optimization,
            log_level: if self.debug { log::LevelFilter::Trace } else { log::LevelFilter::Info },
            override_data: None,
            rom_path: self.rom_path.clone(),
            bios_path: self.bios_path.clone(),
            patch_path: self.patch_path.clone(),
            game_directory: self.game_directory.clone(),
            state_directory: self.state_directory.clone(),
            rewind_capacity: self.rewind_capacity,
            rewind_interval: self.rewind_interval,
        }
    }
}

fn parse_scale(src: &str) -> Result<Scale, &'static str> {
    match src {
        "1" => Ok(Scale::X1),
        "2" => Ok(Scale::X2),
        "4" => Ok(Scale::X4),
        "8" => Ok(Scale::X8),
        "16" => Ok(Scale::X16),
        "32" => Ok(Scale::X32),
        "fit" => Ok(Scale::FitScreen),
        _ => Err("only '1', '2', '4', '8', '16', '32' or 'fit' are allowed"),
    }
}
