use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use failure::Error;
use structopt::StructOpt;

use emusup_core::context::SupervisorContext;
use emusup_core::controller::Controller;
use emusup_core::log::*;

mod args;
mod audio;
mod demo_engine;
mod logger;
mod video;

use args::Args;
use demo_engine::DemoEngine;

fn main() {
    if let Err(err) = run() {
        println!("ERROR: {}", err);
        for cause in err.iter_causes() {
            println!("  ... caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let args = Args::from_args();
    let config = args.to_boot_config();
    logger::init(config.log_level);

    let context = SupervisorContext::new(config);
    let controller = Controller::new(context.clone());

    let shared_frame = video::new_shared_frame();
    let audio_buffer = Arc::new(Mutex::new(VecDeque::<i16>::new()));

    let engine_frame = shared_frame.clone();
    let engine_audio = audio_buffer.clone();
    let started = controller.start(move || DemoEngine::new(engine_frame, engine_audio));

    if !started {
        warn!("failed to start: no ROM could be identified");
        return Ok(());
    }
    info!("worker running");

    let audio_thread = audio::spawn(context.clone(), audio_buffer);

    // The video presenter owns the window and must run on this (the main)
    // thread; it returns once the window is closed, `Escape` is pressed, or
    // the session ends on its own (crash, external `End`).
    video::run(controller.clone(), shared_frame, args.scale)?;

    controller.end();
    controller.join();
    drop(audio_thread); // cpal's event loop never returns; we just detach it.

    if controller.has_crashed() {
        warn!("session ended after an engine crash");
    }

    Ok(())
}
