//! Cancellation primitive with a wakeable sleep.
//!
//! The capture loop paces itself by sleeping until the next frame is due;
//! that sleep must end immediately when the session is stopped, not at the
//! next poll. The token pairs an atomic flag with a channel so a sleeping
//! thread is woken the moment `cancel` is called.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

/// Owner side of a cancellation pair.
pub struct CancellationSource {
    cancelled: Arc<AtomicBool>,
    wake_tx: Sender<()>,
}

/// Observer side of a cancellation pair. Cloneable; every clone observes
/// the same cancellation.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    wake_rx: Receiver<()>,
}

/// Create a linked source/token pair.
pub fn cancellation_pair() -> (CancellationSource, CancellationToken) {
    let cancelled = Arc::new(AtomicBool::new(false));
    let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);

    (
        CancellationSource {
            cancelled: Arc::clone(&cancelled),
            wake_tx,
        },
        CancellationToken { cancelled, wake_rx },
    )
}

impl CancellationSource {
    /// Cancel the pair and wake any sleeping token holder.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.wake_tx.try_send(());
    }
}

impl Drop for CancellationSource {
    fn drop(&mut self) {
        // Dropping the sender disconnects the channel, which also ends any
        // in-flight sleep.
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl CancellationToken {
    /// Check for cancellation without blocking.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` or until cancelled, whichever comes first.
    ///
    /// Returns true if the pair was cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }

        match self.wake_rx.recv_timeout(duration) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_token_starts_uncancelled() {
        let (_source, token) = cancellation_pair();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_observed() {
        let (source, token) = cancellation_pair();
        source.cancel();
        assert!(token.is_cancelled());
        assert!(token.sleep(Duration::from_secs(5)));
    }

    #[test]
    fn test_sleep_times_out_when_not_cancelled() {
        let (_source, token) = cancellation_pair();
        let start = Instant::now();
        let cancelled = token.sleep(Duration::from_millis(20));
        assert!(!cancelled);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_cancel_wakes_sleeper() {
        let (source, token) = cancellation_pair();
        let handle = std::thread::spawn(move || {
            let start = Instant::now();
            let cancelled = token.sleep(Duration::from_secs(10));
            (cancelled, start.elapsed())
        });

        std::thread::sleep(Duration::from_millis(30));
        source.cancel();

        let (cancelled, waited) = handle.join().unwrap();
        assert!(cancelled);
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn test_dropping_source_cancels() {
        let (source, token) = cancellation_pair();
        drop(source);
        assert!(token.sleep(Duration::from_secs(5)));
        assert!(token.is_cancelled());
    }
}
