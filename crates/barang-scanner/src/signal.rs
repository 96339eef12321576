use std::{future::Future, sync::Arc};

use barang_types::{BarangError, Result};
use tokio::sync::watch;

/// Cancellation switch shared between a session and whoever may abort it.
///
/// Clones trigger the same switch, so a handle taken before `scan()` starts
/// can stop the run from another task.
#[derive(Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Re-arms the switch for a fresh run.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn token(&self) -> StopToken {
        StopToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the switch is triggered or its owner is gone.
    pub async fn stopped(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Runs `fut` unless the switch fires first.
    pub async fn guard<F: Future>(&mut self, fut: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = self.stopped() => Err(BarangError::Cancelled),
            output = fut => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn guard_returns_cancelled_once_triggered() {
        let signal = StopSignal::new();
        let mut token = signal.token();
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.trigger();
        });
        let result = token
            .guard(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert!(matches!(result, Err(BarangError::Cancelled)));
    }

    #[tokio::test]
    async fn reset_rearms_for_next_run() {
        let signal = StopSignal::new();
        signal.trigger();
        assert!(signal.token().is_stopped());
        signal.reset();
        let mut token = signal.token();
        assert!(!token.is_stopped());
        assert_eq!(token.guard(async { 7 }).await.unwrap(), 7);
    }
}
