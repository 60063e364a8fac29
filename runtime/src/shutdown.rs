use tokio::sync::watch;

/// Create a shutdown signal pair: send `true` on the returned sender to
/// request every daemon loop holding a `ShutdownSignal` to stop after its
/// current iteration.
///
/// Daemon loops race their next unit of work against `changed()` in a
/// `tokio::select!`, finishing the current iteration before exiting.
#[must_use]
pub fn channel() -> (watch::Sender<bool>, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (tx, ShutdownSignal(rx))
}

/// Receiving half of a shutdown signal, cheap to clone across daemon tasks.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    /// True once shutdown has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown has been requested. Safe to call in a
    /// `tokio::select!` branch alongside other work.
    pub async fn requested(&mut self) {
        while !*self.0.borrow() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_resolves_after_send() {
        let (tx, mut signal) = channel();
        assert!(!signal.is_requested());

        tx.send(true).unwrap();
        signal.requested().await;
        assert!(signal.is_requested());
    }
}
