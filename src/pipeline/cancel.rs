//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A one-way stop flag shared between the host and the pipeline thread.
///
/// Once set it stays set for the rest of the run; there is no reset.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    flag: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread, any number of times.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let signal = CancellationSignal::new();
        let other = signal.clone();
        assert!(!other.is_cancelled());
        signal.cancel();
        signal.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let signal = CancellationSignal::new();
        let remote = signal.clone();
        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(signal.is_cancelled());
    }
}
