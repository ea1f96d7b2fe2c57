//! Process-wide stop signal.
//!
//! Three kinds of listeners subscribe: the HTTP server (stop accepting, then
//! drain), the grace-period deadline, and the datastore's background tasks
//! (pool error watcher and reconnect loop). `main` and the signal handler
//! trigger it.

use tokio::sync::broadcast;

/// Cloneable handle to the stop signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe before triggering; a receiver created afterwards never fires.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal. Triggering twice, or with no subscribers, is harmless.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
