//! Failure modes the supervisor surfaces to its caller.
//!
//! Internal protocol misuse (mismatched `Interrupt`/`Continue`, calling
//! `WaitFrameEnd` without a matching `WaitFrameStart`, ...) is not part of
//! this enum: those are bugs in the caller, asserted against in debug builds
//! (see `context::SupervisorContext::interrupt`), not recoverable errors.

use failure::Fail;

/// Bootstrap-time failures. Any of these leaves the context at
/// `SupervisorState::Shutdown` with no worker spawned.
///
/// A missing or unreadable save file is deliberately not a variant here: it
/// only comes up once a ROM has already resolved, inside the worker's
/// artifact-loading phase, and spec §7 treats it the same as a missing BIOS
/// or patch -- recovered locally (`engine::log_recovered_error`), not a
/// reason to abort `Start`.
#[derive(Debug, Fail)]
pub enum BootstrapError {
    #[fail(display = "no ROM could be identified (explicit path missing, and \
        scanning the game directory found no candidate file)")]
    NoRom,
}
