// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::sync::atomic::{AtomicU64, Ordering};

/// Token identifying one call within an async operation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// Monotonic counter separating the most recently initiated call in an async
/// family from the calls it superseded.
///
/// A caller grabs a [`Generation`] before suspending on the network and checks
/// it again before delivering the result; a result whose generation is no
/// longer current is discarded rather than displayed.
///
/// # Example
/// ```
/// use cvl_utils::GenerationCounter;
///
/// let refreshes = GenerationCounter::new();
/// let first = refreshes.begin();
/// let second = refreshes.begin();
/// assert!(!refreshes.is_current(first));
/// assert!(refreshes.is_current(second));
/// ```
#[derive(Debug, Default)]
pub struct GenerationCounter(AtomicU64);

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new call, superseding every generation handed out before it.
    pub fn begin(&self) -> Generation {
        Generation(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `generation` is still the most recently initiated call.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.0.load(Ordering::SeqCst) == generation.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_call_supersedes_earlier_one() {
        let counter = GenerationCounter::new();
        let first = counter.begin();
        assert!(counter.is_current(first));

        let second = counter.begin();
        assert!(!counter.is_current(first));
        assert!(counter.is_current(second));
    }

    #[tokio::test]
    async fn stale_result_is_detectable_after_resolution_order_inverts() {
        let counter = GenerationCounter::new();
        let slow = counter.begin();
        let fast = counter.begin();

        // The slow call resolving last must still observe it was superseded.
        tokio::task::yield_now().await;
        assert!(counter.is_current(fast));
        assert!(!counter.is_current(slow));
    }
}
