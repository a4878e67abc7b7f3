//! Cross-task access to a running control loop.
//!
//! Flags (liveness, pause) and the drag input are shared state read at the
//! top of each tick. Requests that need the loop's policies or physics
//! (reset, motion requests) travel over a command channel and are answered
//! once the loop processes them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot, watch};

use crate::drag::Drag;
use crate::error::LoopError;
use crate::snapshot::PoseSnapshot;

/// Requests processed by the loop between ticks.
#[derive(Debug)]
pub(crate) enum Command {
    Reset(oneshot::Sender<Result<(), LoopError>>),
    RequestMotion {
        name: String,
        robot: Option<usize>,
        force: bool,
        reply: oneshot::Sender<bool>,
    },
}

/// Cloneable handle for stopping, pausing and steering a [`ControlLoop`].
///
/// [`ControlLoop`]: crate::ControlLoop
#[derive(Clone, Debug)]
pub struct LoopHandle {
    pub(crate) alive: Arc<AtomicBool>,
    pub(crate) paused: Arc<AtomicBool>,
    pub(crate) drag: Arc<watch::Sender<Option<Drag>>>,
    pub(crate) snapshots: watch::Receiver<PoseSnapshot>,
    pub(crate) commands: mpsc::Sender<Command>,
}

impl LoopHandle {
    /// Ask the loop to exit at the top of its next tick.
    pub fn stop(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Start or update an interactive drag.
    pub fn set_drag(&self, drag: Drag) {
        self.drag.send_replace(Some(drag));
    }

    pub fn clear_drag(&self) {
        self.drag.send_replace(None);
    }

    /// Receiver of post-tick pose snapshots.
    pub fn snapshots(&self) -> watch::Receiver<PoseSnapshot> {
        self.snapshots.clone()
    }

    /// Most recently published snapshot.
    pub fn latest_snapshot(&self) -> PoseSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Reset the simulation and every policy. Resolves once the loop has
    /// processed the request.
    ///
    /// Fails with [`LoopError::Stopped`] once the loop is no longer running.
    /// Requests are only served from inside `run` or `tick`.
    pub async fn reset(&self) -> Result<(), LoopError> {
        if !self.is_alive() {
            return Err(LoopError::Stopped);
        }
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Reset(reply))
            .await
            .map_err(|_| LoopError::Stopped)?;
        response.await.map_err(|_| LoopError::Stopped)?
    }

    /// Route a named-motion request to one robot (or all with `None`).
    ///
    /// Returns `false` if the loop is gone or stopped.
    pub async fn request_motion(&self, name: &str, robot: Option<usize>, force: bool) -> bool {
        if !self.is_alive() {
            return false;
        }
        let (reply, response) = oneshot::channel();
        let command = Command::RequestMotion {
            name: name.to_owned(),
            robot,
            force,
            reply,
        };
        if self.commands.send(command).await.is_err() {
            return false;
        }
        response.await.unwrap_or(false)
    }
}
