//! `minifb`-based video presenter. Grounded on the teacher's `main.rs`
//! window loop (`Window::new`/`update_with_buffer`) and the buffer-swap
//! shape of `desktop/src/env.rs`/`render.rs`, adapted to pull frames through
//! `VideoSection` instead of calling the emulator directly. Also owns the
//! controller keybindings (pause/reset/rewind/screenshot) since `minifb`'s
//! keyboard state can only be polled from the thread that owns the window.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use emusup_core::controller::Controller;
use emusup_core::log::*;
use emusup_core::screenshot;
use emusup_core::sync::VideoSection;
use failure::{Error, ResultExt};
use minifb::{Key, KeyRepeat, Scale, Window, WindowOptions};

use crate::demo_engine::{HEIGHT, WIDTH};

const TITLE: &str = "emusup";

/// Allocates the frame buffer shared between the worker's engine and this
/// presenter. The Sync Channel only provides pacing; the pixel bytes
/// themselves travel over this separate shared buffer, same as the
/// teacher's `Shared.gb_frame`.
pub fn new_shared_frame() -> Arc<Mutex<Vec<u8>>> {
    Arc::new(Mutex::new(vec![0u8; WIDTH * HEIGHT * 3]))
}

/// Runs the presentation loop on the calling thread (`minifb` windows must
/// be driven from the thread that created them). Returns once the window is
/// closed or `Escape` is pressed. `P` toggles pause, `R` resets, `N` rewinds
/// one snapshot, `F2` takes a screenshot -- all issued through `controller`
/// exactly as an external controller thread would, just polled from the
/// window's own event loop instead of a separate thread.
pub fn run(controller: Controller, frame: Arc<Mutex<Vec<u8>>>, scale: Scale) -> Result<(), Error> {
    let context = controller.context().clone();

    let mut window = Window::new(
        TITLE,
        WIDTH,
        HEIGHT,
        WindowOptions { borderless: false, title: true, resize: false, scale },
    )
    .context("failed to open window")?;

    let mut rgb_buffer: Vec<u32> = vec![0; WIDTH * HEIGHT];

    while window.is_open() && !window.is_key_down(Key::Escape) && context.is_active() {
        if window.is_key_pressed(Key::P, KeyRepeat::No) {
            controller.toggle_pause();
        }
        if window.is_key_pressed(Key::R, KeyRepeat::No) {
            controller.reset();
        }
        if window.is_key_pressed(Key::N, KeyRepeat::No) {
            if !controller.rewind() {
                debug!("rewind requested with an empty ring");
            }
        }
        if window.is_key_pressed(Key::F2, KeyRepeat::No) {
            if let Err(err) = screenshot::take(&context) {
                warn!("screenshot failed: {}", err);
            }
        }

        match VideoSection::begin(context.sync(), context.config().frame_skip) {
            Some(_section) => {
                let pixels = frame.lock().expect("shared frame poisoned");
                for (dst, src) in rgb_buffer.iter_mut().zip(pixels.chunks(3)) {
                    *dst = (u32::from(src[0]) << 16) | (u32::from(src[1]) << 8) | u32::from(src[2]);
                }
            }
            None => {
                // Consumer suspended or the producer timed out; just redraw
                // the last frame so the window stays responsive.
            }
        }

        window.update_with_buffer(&rgb_buffer).context("failed to present frame")?;

        // The Sync Channel's own 50ms timeout already paces the handshake;
        // this is the host-loop frame-rate cap on top of it, matching the
        // teacher's `desktop/src/emu.rs` use of `spin_sleep` for the same
        // purpose rather than relying on vsync alone.
        spin_sleep::sleep(Duration::from_millis(1000 / 60));
    }

    Ok(())
}
