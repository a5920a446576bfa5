//! Lifecycle/Bootstrap (spec §4.6). Grounded on the teacher's `main.rs`
//! `run()` sequencing (parse args, load ROM, construct, spawn) and
//! `build.rs` (artifact presence checks), generalized into the spec's
//! scan-for-ROM-in-a-directory fallback and signal-masking requirements.

use std::fs;
use std::path::PathBuf;

use crate::{
    artifacts::{looks_like_patch, looks_like_rom, FsDirectory, VirtualDirectory},
    context::SupervisorContext,
    error::BootstrapError,
    log::*,
};

/// `Start` step 1: validates that a ROM can be identified, either from an
/// explicit path or by scanning `game_directory` for the first file that
/// looks like a ROM (and, incidentally, logs a sibling patch candidate if
/// one is found -- loading it is the worker's job, see `resolve_patch`).
pub(crate) fn resolve_rom(context: &SupervisorContext) -> Result<PathBuf, BootstrapError> {
    let config = context.config();

    if let Some(path) = &config.rom_path {
        if path.is_file() {
            return Ok(path.clone());
        }
        return Err(BootstrapError::NoRom);
    }

    if let Some(dir) = &config.game_directory {
        if let Ok(mut listing) = FsDirectory::open(dir) {
            listing.rewind();
            while let Some(name) = listing.list_next() {
                if looks_like_rom(&name) {
                    info!("found ROM candidate {} while scanning game directory", name);
                    return Ok(dir.join(name));
                }
            }
        }
    }

    Err(BootstrapError::NoRom)
}

/// Scans the same directory as `rom_path` for a sibling patch file. Purely
/// best-effort: a failed or missing patch is recovered locally (spec §7),
/// never fatal.
pub(crate) fn resolve_patch(context: &SupervisorContext, rom_path: &std::path::Path) -> Option<PathBuf> {
    if let Some(explicit) = &context.config().patch_path {
        return Some(explicit.clone());
    }

    let dir = rom_path.parent()?;
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_str()?;
        if looks_like_patch(name) {
            return Some(dir.join(name));
        }
    }
    None
}

/// On non-Windows hosts, blocks `SIGINT` and `SIGTRAP` in the calling
/// (controller) thread before the worker is spawned. A thread's signal mask
/// is inherited by any thread it spawns, so this also leaves the mask
/// blocked on the worker once it starts; the worker never touches its own
/// mask and so stays blocked for its whole life (see `worker::run`'s phase 1
/// comment), while `unblock_controller_signals` lifts the block back on the
/// controller once the worker is up -- so the signals end up delivered to
/// the controller thread, not the worker (spec §6 "Environment / signals").
#[cfg(not(windows))]
pub(crate) fn block_controller_signals() {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGINT);
        libc::sigaddset(&mut set, libc::SIGTRAP);
        libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
    }
}

#[cfg(windows)]
pub(crate) fn block_controller_signals() {}

/// Unblocks `SIGINT`/`SIGTRAP` on the controller thread again, once the
/// worker has been spawned and has inherited the blocked mask set by
/// `block_controller_signals`. Must run on the same (controller) thread that
/// called `block_controller_signals`.
#[cfg(not(windows))]
pub(crate) fn unblock_controller_signals() {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGINT);
        libc::sigaddset(&mut set, libc::SIGTRAP);
        libc::pthread_sigmask(libc::SIG_UNBLOCK, &set, std::ptr::null_mut());
    }
}

#[cfg(windows)]
pub(crate) fn unblock_controller_signals() {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootConfig;
    use std::io::Write;

    #[test]
    fn resolve_rom_fails_with_no_paths_configured() {
        let context = SupervisorContext::new(BootConfig::default());
        assert!(resolve_rom(&context).is_err());
    }

    #[test]
    fn resolve_rom_accepts_explicit_existing_path() {
        let dir = std::env::temp_dir().join(format!("emusup-test-{:?}", std::thread::current().id()));
        fs::create_dir_all(&dir).unwrap();
        let rom_path = dir.join("game.gba");
        fs::File::create(&rom_path).unwrap().write_all(b"fake rom").unwrap();

        let context = SupervisorContext::new(BootConfig {
            rom_path: Some(rom_path.clone()),
            ..BootConfig::default()
        });
        assert_eq!(resolve_rom(&context).unwrap(), rom_path);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn resolve_rom_scans_game_directory_for_candidate() {
        let dir = std::env::temp_dir().join(format!("emusup-test-scan-{:?}", std::thread::current().id()));
        fs::create_dir_all(&dir).unwrap();
        fs::File::create(dir.join("readme.txt")).unwrap();
        let rom_path = dir.join("game.gba");
        fs::File::create(&rom_path).unwrap();

        let context = SupervisorContext::new(BootConfig {
            game_directory: Some(dir.clone()),
            ..BootConfig::default()
        });
        assert_eq!(resolve_rom(&context).unwrap(), rom_path);

        fs::remove_dir_all(&dir).ok();
    }
}
