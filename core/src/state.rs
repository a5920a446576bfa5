//! The supervisor state machine (spec §4.2).
//!
//! States are totally ordered: `Running < {transient, paused/interrupted} <
//! Exiting < Shutdown`. The worker loop reads this ordering to decide whether
//! to keep stepping, handle a supervisor message, or leave (see
//! `worker::run`). Encoding the order as a discriminant comparison (rather
//! than a pile of `matches!` arms) is what Design Notes §9 asks for.

/// The authoritative supervisor state. Every read and write happens under
/// `SupervisorContext::state_mutex` (see `context.rs`).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Context built, worker not yet running.
    Initialized = 0,

    /// Worker executing instructions.
    Running = 1,

    /// Interrupt requested; worker has not yet parked.
    Interrupting = 2,

    /// Worker parked on the state condvar; controller is doing reentrant
    /// work (e.g. a debugger read).
    Interrupted = 3,

    /// Pause requested; worker has not yet parked.
    Pausing = 4,

    /// Worker parked on the state condvar.
    Paused = 5,

    /// Reset requested; worker will reinitialize the engine and re-enter
    /// `Running`.
    Reseting = 6,

    /// Worker is leaving its outer loop.
    Exiting = 7,

    /// Worker done; `Controller::join` is permissible.
    Shutdown = 8,

    /// Terminal failure signalled by an engine callback.
    Crashed = 9,
}

impl SupervisorState {
    /// Every state except `Initialized`/`Shutdown`/`Crashed` has the engine
    /// handle attached (invariant 4 in spec §3) -- `Crashed` is listed as
    /// null because by the time it's externally observable, teardown (which
    /// clears the handle) has already run.
    pub fn has_engine(self) -> bool {
        !matches!(
            self,
            SupervisorState::Initialized | SupervisorState::Shutdown | SupervisorState::Crashed
        )
    }

    /// States in which the worker is parked on the state condvar, holding no
    /// engine locks (invariant 3).
    pub fn is_parked(self) -> bool {
        matches!(self, SupervisorState::Paused | SupervisorState::Interrupted)
    }

    /// States between `Running` and `Exiting` (exclusive) that the worker's
    /// outer loop must react to: `Pausing`/`Interrupting`/`Reseting` become
    /// `Paused`/`Interrupted`/`Running` respectively, and `Paused`/
    /// `Interrupted` are where the worker actually blocks.
    pub fn is_transient(self) -> bool {
        self > SupervisorState::Running && self < SupervisorState::Exiting
    }

    /// `true` while the worker's outer loop should keep iterating (spec
    /// §4.3: "while state < EXITING").
    pub fn is_active(self) -> bool {
        self < SupervisorState::Exiting
    }
}

impl PartialOrd for SupervisorState {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SupervisorState {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::SupervisorState as S;

    #[test]
    fn ordering_matches_spec_table() {
        assert!(S::Running < S::Pausing);
        assert!(S::Running < S::Interrupting);
        assert!(S::Pausing < S::Exiting);
        assert!(S::Interrupted < S::Exiting);
        assert!(S::Reseting < S::Exiting);
        assert!(S::Exiting < S::Shutdown);
    }

    #[test]
    fn has_engine_matches_invariant_4() {
        assert!(!S::Initialized.has_engine());
        assert!(!S::Shutdown.has_engine());
        assert!(S::Running.has_engine());
        assert!(S::Paused.has_engine());
        assert!(S::Interrupted.has_engine());
        assert!(S::Exiting.has_engine());
        assert!(!S::Crashed.has_engine());
    }

    #[test]
    fn is_parked_only_for_paused_and_interrupted() {
        assert!(S::Paused.is_parked());
        assert!(S::Interrupted.is_parked());
        assert!(!S::Running.is_parked());
        assert!(!S::Pausing.is_parked());
        assert!(!S::Interrupting.is_parked());
    }

    #[test]
    fn is_active_false_from_exiting_onward() {
        assert!(S::Running.is_active());
        assert!(S::Paused.is_active());
        assert!(!S::Exiting.is_active());
        assert!(!S::Shutdown.is_active());
    }
}
