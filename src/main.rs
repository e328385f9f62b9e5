// In src/main.rs

// Declare modules
pub mod color;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod framebuffer;
pub mod keys;
pub mod pattern;
pub mod projector;
pub mod resample;
pub mod response;
pub mod session;
pub mod streamer;

use crate::{
    color::WHITE,
    config::CONFIG,
    console::Console,
    dispatch::{menu_lines, Dispatcher},
    pattern::PatternGenerator,
    session::{Session, SessionSnapshot},
    streamer::FrameStreamer,
};

use anyhow::Context;
use log::{error, info};
use std::io::{stdin, stdout};
use std::sync::Arc;

/// Main entry point for the `dmd-bench` application.
fn main() -> anyhow::Result<()> {
    // Initialize the logger. Default filter is "info" if RUST_LOG is not set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    info!("Starting dmd-bench...");
    let config = &*CONFIG;
    info!(
        "DMD {}x{} mirrors, display {}x{}",
        config.geometry.dmd_width,
        config.geometry.dmd_height,
        config.geometry.display_width,
        config.geometry.display_height
    );

    // --- Operator input before raw mode ---
    let offset = console::prompt_initial_offset(&mut stdin().lock(), &mut stdout())
        .context("Failed to read the initial offset")?;

    // --- Hardware ---
    let projector = projector::open(&config.projector).context("Failed to open projector")?;
    let mut sink = framebuffer::open(config).context("Failed to open frame sink")?;
    sink.fill(WHITE).context("Failed to fill display")?;

    // --- Shared state and the streaming thread ---
    let session = Arc::new(Session::new(SessionSnapshot::initial(config, offset)));
    let streamer = FrameStreamer::spawn(
        Arc::clone(&session),
        PatternGenerator::from_config(config),
        sink,
        config.stream.poll_interval(),
    )?;

    let mut dispatcher = Dispatcher::new(Arc::clone(&session), projector, &config.control);

    // --- Command loop ---
    let loop_result = Console::enter_raw_mode().and_then(|mut console| {
        console.print(&menu_lines())?;
        info!("Starting command loop...");
        let result = console.run(|key| dispatcher.dispatch(key));
        console.restore()?;
        result
    });
    if let Err(e) = &loop_result {
        error!("Command loop failed: {:#}", e);
    }

    // --- Cleanup ---
    info!("Stopping frame streamer...");
    // A streamer failure must not skip the mirror release.
    let stream_result = streamer.shutdown();
    if let Err(e) = dispatcher.release_mirrors() {
        error!("Failed to unlock mirrors on exit: {:#}", e);
    }
    let blank_result = match stream_result {
        Ok(mut sink) => sink.blank().context("Failed to blank display"),
        Err(e) => {
            error!("Frame streamer did not stop cleanly: {:#}", e);
            Err(e)
        }
    };

    loop_result?;
    blank_result?;
    info!("dmd-bench exited successfully.");
    Ok(())
}
