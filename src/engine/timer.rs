// src/engine/timer.rs

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::session::SessionCommand;

/// The single countdown a session owns, for both open rounds and the
/// results-display auto-advance.
///
/// Expiry posts a [`SessionCommand::TimerFired`] carrying a generation number
/// back into the session's own queue; the session ignores fires whose
/// generation is stale. Together with the serialized command loop this makes
/// cancel-vs-expiry races benign: an already-completed round turns a late
/// fire into a no-op.
pub struct RoundTimer {
    handle: Option<JoinHandle<()>>,
}

impl RoundTimer {
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Arms the timer, replacing any previous countdown.
    pub fn start(
        &mut self,
        tx: mpsc::UnboundedSender<SessionCommand>,
        generation: u64,
        duration: Duration,
    ) {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(SessionCommand::TimerFired { generation });
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Default for RoundTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
