//! The supervisor core: a concurrency engine that hosts a CPU-bound
//! `Engine` implementation on its own worker thread and coordinates it with
//! paced video/audio consumers and a controller thread, entirely through
//! `Mutex`/`Condvar` rendezvous (spec §1, §4).
//!
//! The crate never assumes a concrete emulator -- callers provide one via
//! the `Engine` trait (see `engine`) and drive the session through
//! `Controller`.

pub mod artifacts;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod log;
pub(crate) mod lifecycle;
pub mod registry;
pub mod rewind;
pub mod screenshot;
pub mod state;
pub mod sync;
pub mod controller;
pub(crate) mod worker;

pub use crate::config::BootConfig;
pub use crate::context::{Hooks, SupervisorContext};
pub use crate::controller::Controller;
pub use crate::engine::{Components, Engine, FrameBuffer, StepOutcome};
pub use crate::error::BootstrapError;
pub use crate::state::SupervisorState;
