//! Screenshot helper (spec §6 "Screenshot (optional external helper)").
//! Named an external collaborator by spec §1, but simple enough that
//! SPEC_FULL.md folds it into the core rather than leaving it as a seam with
//! no implementation at all -- grounded on the `png` crate, the
//! ecosystem-standard PNG encoder (no example repo in the pack writes PNGs
//! from a pixel buffer).

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use lazy_static::lazy_static;
use png::HasParameters;

use crate::context::SupervisorContext;
use crate::log::*;

lazy_static! {
    /// Process-wide auto-increment counter for screenshot filenames. Shared
    /// across every `SupervisorContext` in the process, matching how the
    /// teacher keeps a single global counter for its own one-shot globals
    /// rather than threading one through per context.
    static ref NEXT_INDEX: AtomicU64 = AtomicU64::new(0);
}

/// Writes the current frame buffer to a PNG under the context's configured
/// state directory. Only meaningful while the worker is parked (spec §6:
/// "only callable when the consumer could otherwise read the back buffer");
/// callers are responsible for that precondition, the same way a video
/// consumer is responsible for holding its `VideoSection` before reading
/// pixels.
pub fn take(context: &SupervisorContext) -> Result<PathBuf, failure::Error> {
    let dir = context
        .config()
        .state_directory
        .clone()
        .ok_or_else(|| failure::format_err!("no state directory configured"))?;
    fs::create_dir_all(&dir)?;

    let index = NEXT_INDEX.fetch_add(1, Ordering::SeqCst);
    let path = dir.join(format!("screenshot-{:04}.png", index));

    let slot = context.engine.lock().expect("engine mutex poisoned");
    let engine = slot
        .as_ref()
        .ok_or_else(|| failure::format_err!("no engine installed"))?;
    let frame = engine.get_pixels();

    let file = fs::File::create(&path)?;
    let writer = &mut std::io::BufWriter::new(file);
    let mut encoder = png::Encoder::new(writer, frame.width as u32, frame.height as u32);
    encoder.set(png::ColorType::RGB).set(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;

    if frame.stride == frame.width * 3 {
        writer.write_image_data(frame.pixels)?;
    } else {
        // Packed copy: drop per-row padding the renderer's stride implies.
        let mut packed = Vec::with_capacity(frame.width * frame.height * 3);
        for row in frame.pixels.chunks(frame.stride) {
            packed.extend_from_slice(&row[..frame.width * 3]);
        }
        writer.write_image_data(&packed)?;
    }

    info!("wrote screenshot to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootConfig;
    use crate::engine::{Components, Engine, FrameBuffer, StepOutcome};

    struct SolidEngine {
        pixels: Vec<u8>,
    }

    impl Engine for SolidEngine {
        fn reset(&mut self, _skip_bios: bool) {}
        fn run_one_step(&mut self, _sync: &crate::sync::SyncChannel) -> StepOutcome {
            StepOutcome::Continue
        }
        fn force_return(&mut self) {}
        fn set_runnable(&mut self) {}
        fn set_component_table(&mut self, _components: Components) {}
        fn get_pixels(&self) -> FrameBuffer<'_> {
            FrameBuffer { width: 2, height: 2, stride: 6, pixels: &self.pixels }
        }
        fn serialize_state(&self) -> Vec<u8> {
            Vec::new()
        }
        fn deserialize_state(&mut self, _snapshot: &[u8]) {}
        fn load_rom(
            &mut self,
            _rom: &mut dyn crate::artifacts::VirtualFile,
            _save: Option<&mut dyn crate::artifacts::VirtualFile>,
        ) -> Result<(), failure::Error> {
            Ok(())
        }
        fn load_bios(&mut self, _bios: &mut dyn crate::artifacts::VirtualFile) -> Result<(), failure::Error> {
            Ok(())
        }
        fn apply_patch(&mut self, _patch: &mut dyn crate::artifacts::VirtualFile) -> Result<(), failure::Error> {
            Ok(())
        }
        fn apply_override(&mut self, _data: &[u8]) {}
    }

    #[test]
    fn fails_without_state_directory() {
        let context = SupervisorContext::new(BootConfig::default());
        assert!(take(&context).is_err());
    }

    #[test]
    fn writes_a_png_under_the_state_directory() {
        let dir = std::env::temp_dir().join(format!("emusup-screenshot-{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();

        let context = SupervisorContext::new(BootConfig {
            state_directory: Some(dir.clone()),
            ..BootConfig::default()
        });

        *context.engine.lock().unwrap() = Some(Box::new(SolidEngine {
            pixels: vec![255; 2 * 2 * 3],
        }));

        let path = take(&context).unwrap();
        assert!(path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
