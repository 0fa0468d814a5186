//! Cancellable delayed trigger for search form edits

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::criteria::{CriteriaUpdate, SearchCriteria};

/// Delay before applying `pending`: `debounce` while the text filter holds
/// something once `pending` is merged into `current`, zero otherwise.
pub fn delay_for(
    pending: &CriteriaUpdate,
    current: &SearchCriteria,
    text_filter: &str,
    debounce: Duration,
) -> Duration {
    let text_present = if pending.filters.contains_key(text_filter) {
        pending.text_filter_present(text_filter)
    } else {
        current.filter(text_filter).is_some()
    };
    if text_present {
        debounce
    } else {
        Duration::ZERO
    }
}

/// Runs only the most recently scheduled action. Scheduling aborts
/// whatever is still waiting.
#[derive(Debug, Default)]
pub struct Debouncer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any pending action with `action`, fired after `delay`.
    /// A zero delay still runs on a later turn of the runtime.
    pub fn schedule<F>(&self, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        });

        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Drop the pending action, if any
    pub fn cancel(&self) {
        if let Some(handle) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SortOrder;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_rule() {
        let debounce = Duration::from_millis(400);
        let empty = SearchCriteria::new(SortOrder::asc("name"), 25);
        let typed = CriteriaUpdate::new().filter("name", "ab");
        let cleared = CriteriaUpdate::new().filter("name", "");
        let sort_only = CriteriaUpdate::new().sort(SortOrder::desc("name"));

        assert_eq!(delay_for(&typed, &empty, "name", debounce), debounce);
        assert_eq!(delay_for(&cleared, &empty, "name", debounce), Duration::ZERO);
        assert_eq!(delay_for(&sort_only, &empty, "name", debounce), Duration::ZERO);
    }

    #[test]
    fn test_delay_follows_text_filter_already_applied() {
        let debounce = Duration::from_millis(400);
        let searching = SearchCriteria::new(SortOrder::asc("name"), 25).with_filter("name", "abc");
        let sort_only = CriteriaUpdate::new().sort(SortOrder::desc("name"));
        let cleared = CriteriaUpdate::new().filter("name", "");

        assert_eq!(delay_for(&sort_only, &searching, "name", debounce), debounce);
        assert_eq!(delay_for(&cleared, &searching, "name", debounce), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_last_action_runs() {
        let debouncer = Debouncer::new();
        let fired = Arc::new(Mutex::new(Vec::new()));

        for value in ["a", "ab", "abc"] {
            let fired = Arc::clone(&fired);
            debouncer.schedule(Duration::from_millis(400), move || {
                fired.lock().unwrap().push(value);
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*fired.lock().unwrap(), vec!["abc"]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_is_still_deferred() {
        let debouncer = Debouncer::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        debouncer.schedule(Duration::ZERO, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let debouncer = Debouncer::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        debouncer.schedule(Duration::from_millis(50), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
