//! Background persistence of captured frames.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::capture::CapturedFrame;
use crate::error::ServiceError;

/// Result of one background save, reported on the outcome channel.
#[derive(Debug)]
pub struct SaveOutcome {
    /// The image number the frame was dispatched under.
    pub image: u64,
    pub path: PathBuf,
    pub result: Result<(), ServiceError>,
}

/// Hands captured frames to background save threads and numbers them.
///
/// The image number is assigned (and the counter advanced) at dispatch
/// time, so the next press gets the next number even while an earlier save
/// is still writing. Numbering order matches dispatch order; completion
/// order is not guaranteed. The counter resets to zero each run, so a
/// restarted service overwrites the previous run's files.
pub struct PersistenceDispatcher {
    dir: PathBuf,
    next_image: u64,
    outcome_tx: Sender<SaveOutcome>,
    outcome_rx: Receiver<SaveOutcome>,
}

impl PersistenceDispatcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::channel();
        Self {
            dir: dir.into(),
            next_image: 0,
            outcome_tx,
            outcome_rx,
        }
    }

    /// Spawns a fire-and-forget save thread for `frame` and returns the
    /// image number it was assigned.
    ///
    /// The thread owns the frame bytes outright and is never joined; it
    /// reports its outcome on the channel and terminates.
    pub fn dispatch(&mut self, frame: CapturedFrame) -> u64 {
        let image = self.next_image;
        self.next_image += 1;

        let path = self.dir.join(format!("Image{}.jpg", image));
        let tx = self.outcome_tx.clone();
        thread::spawn(move || {
            let result = save(&path, frame.as_bytes());
            if result.is_ok() {
                debug!("saved {} ({} bytes)", path.display(), frame.len());
            }
            // The receiving loop may already be gone during shutdown.
            let _ = tx.send(SaveOutcome {
                image,
                path,
                result,
            });
        });
        image
    }

    /// Drains completed save outcomes without blocking.
    pub fn drain_outcomes(&mut self) -> Vec<SaveOutcome> {
        let mut done = Vec::new();
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            done.push(outcome);
        }
        done
    }

    /// Blocks up to `timeout` for a single outcome. Used by tests; the
    /// control loop itself never waits on saves.
    pub fn wait_outcome(&mut self, timeout: Duration) -> Option<SaveOutcome> {
        self.outcome_rx.recv_timeout(timeout).ok()
    }
}

/// Writes exactly the frame's bytes to a new file. An existing file of the
/// same name is truncated, which is how restart renumbering is meant to
/// behave.
fn save(path: &Path, bytes: &[u8]) -> Result<(), ServiceError> {
    let mut file = File::create(path)
        .map_err(|e| ServiceError::Persistence(format!("create {}: {}", path.display(), e)))?;
    file.write_all(bytes)
        .map_err(|e| ServiceError::Persistence(format!("write {}: {}", path.display(), e)))?;
    file.flush()
        .map_err(|e| ServiceError::Persistence(format!("flush {}: {}", path.display(), e)))?;
    Ok(())
}
