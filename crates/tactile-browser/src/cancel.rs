//! Page-lifetime cancellation.
//!
//! A [`CancelSource`] belongs to whoever owns the page or frame context. It
//! hands out [`CancelSignal`]s bound to the current context generation; when
//! the context is torn down (navigation, context destruction) the generation
//! advances and every outstanding signal reports cancelled. New signals
//! taken afterwards belong to the new context.

use tokio::sync::watch;

/// Owner side: advances the context generation on teardown.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<u64>,
}

/// Observer side, checked at every suspension point.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<u64>,
    generation: u64,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0u64);
        Self { tx }
    }

    /// A signal tied to the current context generation.
    pub fn signal(&self) -> CancelSignal {
        let rx = self.tx.subscribe();
        let generation = *rx.borrow();
        CancelSignal { rx, generation }
    }

    /// Tear down the current context, cancelling every signal handed out so far.
    pub fn cancel(&self) {
        self.tx.send_modify(|generation| *generation += 1);
        tracing::debug!(generation = *self.tx.borrow(), "page context torn down");
    }

    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    /// Whether the context this signal was taken from is gone.
    ///
    /// A dropped source counts as torn down.
    pub fn is_cancelled(&self) -> bool {
        let current = *self.rx.borrow();
        current != self.generation || self.rx.has_changed().is_err()
    }

    /// Resolve once the context is torn down.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() != self.generation {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_signal_is_live() {
        let source = CancelSource::new();
        assert!(!source.signal().is_cancelled());
    }

    #[test]
    fn cancel_affects_outstanding_signals_only() {
        let source = CancelSource::new();
        let before = source.signal();
        source.cancel();
        let after = source.signal();
        assert!(before.is_cancelled());
        assert!(!after.is_cancelled());
        assert_eq!(source.generation(), 1);
    }

    #[test]
    fn dropped_source_counts_as_cancelled() {
        let source = CancelSource::new();
        let signal = source.signal();
        drop(source);
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_wakes_on_teardown() {
        let source = CancelSource::new();
        let signal = source.signal();
        let waiter = tokio::spawn(async move { signal.cancelled().await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        source.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_future_pending_while_live() {
        let source = CancelSource::new();
        let signal = source.signal();
        let res = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(res.is_err());
    }
}
