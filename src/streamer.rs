// src/streamer.rs

//! The frame streaming loop.
//!
//! A dedicated thread snapshots the [`Session`], renders the current pattern
//! at display resolution and overwrites the sink in full, then sleeps for the
//! poll interval. It never waits on the command loop: parameters are read
//! from atomics, so a command applied mid-frame shows up one frame later.

use crate::framebuffer::FrameSink;
use crate::pattern::PatternProvider;
use crate::session::Session;
use anyhow::{anyhow, Context, Result};
use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct FrameStreamer {
    stop: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<Box<dyn FrameSink>>>,
}

impl FrameStreamer {
    /// Starts streaming into `sink`. The sink is handed back by
    /// [`FrameStreamer::shutdown`].
    pub fn spawn<P>(
        session: Arc<Session>,
        provider: P,
        sink: Box<dyn FrameSink>,
        interval: Duration,
    ) -> Result<Self>
    where
        P: PatternProvider + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let thread_handle = thread::Builder::new()
            .name("frame-streamer".to_string())
            .spawn(move || {
                info!("FrameStreamer: Started ({:?} interval)", interval);
                let mut worker = StreamWorker::new(provider, sink);
                while !thread_stop.load(Ordering::Acquire) {
                    worker.tick(&session);
                    // Woken early by `unpark` on shutdown.
                    thread::park_timeout(interval);
                }
                debug!(
                    "FrameStreamer: Thread exiting after {} frames",
                    worker.frames
                );
                worker.sink
            })
            .context("Failed to spawn frame streamer thread")?;

        info!("FrameStreamer spawned successfully");
        Ok(FrameStreamer {
            stop,
            thread_handle: Some(thread_handle),
        })
    }

    /// Stops the loop after the frame in flight and returns the sink.
    pub fn shutdown(mut self) -> Result<Box<dyn FrameSink>> {
        let handle = self
            .thread_handle
            .take()
            .context("Frame streamer already stopped")?;
        self.stop.store(true, Ordering::Release);
        handle.thread().unpark();
        handle
            .join()
            .map_err(|e| anyhow!("Frame streamer thread panicked: {:?}", e))
    }
}

impl Drop for FrameStreamer {
    fn drop(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!("FrameStreamer dropped while running; stopping");
            self.stop.store(true, Ordering::Release);
            handle.thread().unpark();
            if let Err(e) = handle.join() {
                error!("FrameStreamer thread panicked: {:?}", e);
            }
        }
    }
}

/// One frame's worth of work, separated from the thread for testing.
struct StreamWorker<P> {
    provider: P,
    sink: Box<dyn FrameSink>,
    frames: u64,
    last_error: Option<String>,
}

impl<P: PatternProvider> StreamWorker<P> {
    fn new(provider: P, sink: Box<dyn FrameSink>) -> Self {
        StreamWorker {
            provider,
            sink,
            frames: 0,
            last_error: None,
        }
    }

    /// Renders and presents one frame. On failure the previous frame stays
    /// on the display.
    fn tick(&mut self, session: &Session) {
        let state = session.snapshot();
        let result = self
            .provider
            .render(&state)
            .map_err(anyhow::Error::from)
            .and_then(|frame| self.sink.present(&frame));

        match result {
            Ok(()) => {
                self.frames += 1;
                trace!("FrameStreamer: frame {} ({:?})", self.frames, state);
                if self.last_error.take().is_some() {
                    info!("FrameStreamer: streaming resumed");
                }
            }
            Err(e) => {
                let message = format!("{:#}", e);
                if self.last_error.as_deref() != Some(message.as_str()) {
                    warn!(
                        "FrameStreamer: keeping previous frame, {} at offset {} failed: {}",
                        state.family, state.offset, message
                    );
                    self.last_error = Some(message);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{BLACK, WHITE};
    use crate::framebuffer::MemorySink;
    use crate::pattern::{PatternBuffer, PatternError, PatternGenerator};
    use crate::response::ResponseCurve;
    use crate::session::{Edge, Offset, PatternFamily, SessionSnapshot};
    use std::time::Instant;
    use test_log::test;

    fn generator() -> PatternGenerator {
        PatternGenerator::new((8, 4), (16, 8), ResponseCurve::default())
    }

    fn knife_session() -> Session {
        Session::new(SessionSnapshot {
            family: PatternFamily::Knife,
            ..SessionSnapshot::default()
        })
    }

    #[test]
    fn it_should_overwrite_the_whole_sink_each_tick() {
        let session = knife_session();
        let sink = MemorySink::new((16, 8));
        let mut worker = StreamWorker::new(generator(), Box::new(sink.clone()));

        worker.tick(&session);
        let screen = sink.screen();
        assert_eq!(screen.get(7, 0), Some(BLACK));
        assert_eq!(screen.get(8, 0), Some(WHITE));

        session.set_edge(Edge::Edge2);
        worker.tick(&session);
        let screen = sink.screen();
        assert_eq!(screen.get(7, 7), Some(WHITE));
        assert_eq!(screen.get(8, 7), Some(BLACK));
        assert_eq!(sink.presented(), 2);
    }

    #[test]
    fn it_should_keep_the_previous_frame_when_generation_fails() {
        let session = Session::new(SessionSnapshot {
            width: 8,
            ..SessionSnapshot::default()
        });
        let sink = MemorySink::new((16, 8));
        let mut worker = StreamWorker::new(generator(), Box::new(sink.clone()));

        worker.tick(&session);
        let good = sink.screen();

        // Band moved entirely off the DMD.
        session.set_offset(Offset::new(100, 0));
        worker.tick(&session);
        worker.tick(&session);
        assert_eq!(sink.screen(), good);
        assert_eq!(sink.presented(), 1);
        assert!(worker.last_error.is_some());

        session.set_offset(Offset::default());
        worker.tick(&session);
        assert!(worker.last_error.is_none());
        assert_eq!(sink.presented(), 2);
    }

    struct Failing;

    impl PatternProvider for Failing {
        fn render(&self, _: &SessionSnapshot) -> Result<PatternBuffer, PatternError> {
            Err(PatternError::InvalidEdge(9))
        }
    }

    #[test]
    fn it_should_stop_promptly_and_return_the_sink() {
        let session = Arc::new(knife_session());
        let sink = MemorySink::new((16, 8));
        let streamer = FrameStreamer::spawn(
            Arc::clone(&session),
            generator(),
            Box::new(sink.clone()),
            Duration::from_millis(5),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.presented() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(sink.presented() >= 3);

        let mut returned = streamer.shutdown().unwrap();
        let after = sink.presented();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(sink.presented(), after);

        returned.blank().unwrap();
        assert!(sink.screen().pixels().iter().all(|&p| p == BLACK));
    }

    #[test]
    fn it_should_survive_a_provider_that_always_fails() {
        let session = Arc::new(Session::default());
        let sink = MemorySink::new((16, 8));
        let streamer = FrameStreamer::spawn(
            session,
            Failing,
            Box::new(sink.clone()),
            Duration::from_millis(1),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(streamer.shutdown().is_ok());
        assert_eq!(sink.presented(), 0);
    }
}
