use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// A struct which can be used to shut down a registry and everything waiting
/// on it. You can create multiple connected shutdowns by cloning.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// This channel is used to tell waiters to shut down.
    notify: broadcast::Sender<ExitStatus>,
    /// The first status sent, shared between clones so late waiters and
    /// repeated calls to `wait_for_shutdown` see it too.
    status: Arc<Mutex<Option<ExitStatus>>>,
}

impl Shutdown {
    /// Creates a new active shutdown.
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self {
            notify,
            status: Default::default(),
        }
    }

    /// Sends `ExitStatus::Exited` to all `Shutdown`s cloned from this one.
    pub fn shut_down(&self) {
        self.shut_down_with_status(ExitStatus::Exited)
    }

    /// Sends `status` to all `Shutdown`s cloned from this one. Only the first
    /// status sent is kept.
    pub fn shut_down_with_status(&self, status: ExitStatus) {
        match self.status.lock() {
            Ok(mut last) => {
                if last.is_some() {
                    return;
                }
                *last = Some(status);
            }
            Err(e) => {
                tracing::error!("Failed to initiate shutdown: {}", e);
                return;
            }
        }
        // No receivers just means nobody is waiting yet
        let _ = self.notify.send(status);
    }

    /// The status sent so far, if any.
    pub fn status(&self) -> Option<ExitStatus> {
        self.status.lock().ok().and_then(|status| *status)
    }

    pub fn is_shut_down(&self) -> bool {
        self.status().is_some()
    }

    /// Waits to receive a shutdown status.
    pub async fn wait_for_shutdown(&self) -> ExitStatus {
        use tokio::sync::broadcast::error::RecvError;

        let mut recv = self.notify.subscribe();
        if let Some(status) = self.status() {
            return status;
        }
        loop {
            match recv.recv().await {
                Ok(status) => return status,
                // The sender lives in `self`, so the channel cannot close
                // while we wait on it
                Err(RecvError::Closed) => return self.status().unwrap_or(ExitStatus::Exited),
                Err(RecvError::Lagged(_)) => {
                    if let Some(status) = self.status() {
                        return status;
                    }
                }
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExitStatus {
    Status(u32),
    Exited,
    TimedOut,
}
