//! Minimal `log::Log` implementation, grounded on the teacher's
//! `desktop/src/debug/simple.rs` `SimpleLogger` (no external logging crate,
//! just a terminal println filtered to this crate's own module path).

use log::{Log, Metadata, Record};

struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let is_ours = record
            .module_path()
            .map(|p| p.starts_with("emusup"))
            .unwrap_or(false);
        if is_ours && self.enabled(record.metadata()) {
            println!("{:5}: {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Installs `SimpleLogger` as the global logger and sets the max level from
/// `BootConfig::log_level`. Called once at the very start of `main`.
pub fn init(level: log::LevelFilter) {
    log::set_logger(&SimpleLogger).expect("called logger::init(), but a logger is already set!");
    log::set_max_level(level);
}
