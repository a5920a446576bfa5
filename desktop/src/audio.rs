//! `cpal`-based audio consumer. The teacher declares `cpal = "0.8.2"` but
//! never wires it up (DESIGN.md); this is the first real use of that
//! dependency, following the `EventLoop`/`build_output_stream` shape of
//! that `cpal` generation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use emusup_core::context::SupervisorContext;
use emusup_core::log::*;

/// Spawns the audio thread. `buffer` is the same ring the engine's
/// `push_audio_chunk` writes into; `ConsumeAudio` is signalled from inside
/// `cpal`'s render callback once a chunk has been drained, matching spec
/// §4.1's audio protocol.
pub fn spawn(context: Arc<SupervisorContext>, buffer: Arc<Mutex<VecDeque<i16>>>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("emusup-audio".to_owned())
        .spawn(move || run(context, buffer))
        .expect("failed to spawn audio thread")
}

fn run(context: Arc<SupervisorContext>, buffer: Arc<Mutex<VecDeque<i16>>>) {
    let device = match cpal::default_output_device() {
        Some(device) => device,
        None => {
            warn!("no audio output device available, audio disabled");
            return;
        }
    };
    let format = match device.default_output_format() {
        Ok(format) => format,
        Err(err) => {
            warn!("no default audio output format ({}), audio disabled", err);
            return;
        }
    };

    let event_loop = cpal::EventLoop::new();
    let stream_id = match event_loop.build_output_stream(&device, &format) {
        Ok(id) => id,
        Err(err) => {
            warn!("failed to build audio output stream ({}), audio disabled", err);
            return;
        }
    };
    event_loop.play_stream(stream_id);

    event_loop.run(move |_stream_id, data| {
        if !context.is_active() {
            return;
        }

        let section = context.sync().lock_audio();
        let mut samples = buffer.lock().expect("audio buffer poisoned");

        match data {
            cpal::StreamData::Output { buffer: cpal::UnknownTypeOutputBuffer::F32(mut out) } => {
                for sample in out.iter_mut() {
                    *sample = samples.pop_front().map(|s| s as f32 / f32::from(i16::MAX)).unwrap_or(0.0);
                }
            }
            cpal::StreamData::Output { buffer: cpal::UnknownTypeOutputBuffer::I16(mut out) } => {
                for sample in out.iter_mut() {
                    *sample = samples.pop_front().unwrap_or(0);
                }
            }
            cpal::StreamData::Output { buffer: cpal::UnknownTypeOutputBuffer::U16(mut out) } => {
                for sample in out.iter_mut() {
                    let signed = samples.pop_front().unwrap_or(0);
                    *sample = (i32::from(signed) + i32::from(i16::MAX) + 1) as u16;
                }
            }
            _ => {}
        }

        drop(samples);
        section.consume();
    });
}
