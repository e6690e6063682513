//! The run-forever control loop tying input, capture and persistence
//! together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::capture::FrameSource;
use crate::config;
use crate::error::ServiceError;
use crate::input::{Debouncer, EdgeSource};
use crate::persist::PersistenceDispatcher;

/// Top-level orchestrator.
///
/// Waits for a debounced press, drives one acquire/copy cycle on the frame
/// source, hands the frame to the dispatcher and goes back to waiting.
/// There is no terminal state in normal operation; the loop leaves only on
/// the shutdown flag or a fatal error, and the session's resources are
/// released by drop on every exit path.
pub struct ControlLoop<F, S> {
    frames: F,
    presses: Debouncer<S>,
    dispatcher: PersistenceDispatcher,
    shutdown: Arc<AtomicBool>,
}

impl<F: FrameSource, S: EdgeSource> ControlLoop<F, S> {
    pub fn new(
        frames: F,
        presses: Debouncer<S>,
        dispatcher: PersistenceDispatcher,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            frames,
            presses,
            dispatcher,
            shutdown,
        }
    }

    /// Runs until shutdown is requested or a fatal error occurs.
    ///
    /// Save outcomes are drained opportunistically on every iteration, so a
    /// failed save is logged without ever blocking the next press. The
    /// shutdown flag is checked each time the edge wait returns, which
    /// bounds shutdown latency by the poll timeout. In-flight saves are not
    /// waited for.
    pub fn run(&mut self) -> Result<(), ServiceError> {
        info!("waiting for button presses");
        loop {
            self.report_saves();
            if self.shutdown.load(Ordering::SeqCst) {
                info!("shutdown requested, leaving the capture loop");
                return Ok(());
            }

            match self.presses.next_press(config::EDGE_POLL_TIMEOUT)? {
                None => {
                    debug!("waiting...");
                }
                Some(press) => {
                    let frame = self.frames.capture()?;
                    // Observability only: the frame is whatever the camera
                    // completed first after the press.
                    info!(
                        "press to frame ready: {:?} ({} bytes)",
                        press.at.elapsed(),
                        frame.len()
                    );
                    let image = self.dispatcher.dispatch(frame);
                    debug!("dispatched image {}", image);
                }
            }
        }
    }

    fn report_saves(&mut self) {
        for outcome in self.dispatcher.drain_outcomes() {
            match outcome.result {
                Ok(()) => debug!("image {} saved to {}", outcome.image, outcome.path.display()),
                Err(e) => error!("image {}: {}", outcome.image, e),
            }
        }
    }
}
