//! Latest-value slots shared between one sampler and any number of readers.
//!
//! A slot holds an `Arc` to the newest snapshot. Publishing swaps the `Arc`,
//! so a reader holds either the old snapshot or the new one in full.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

#[derive(Debug)]
struct Published<T> {
    value: Arc<T>,
    published_at: Instant,
}

pub fn slot<T>(expected_interval: Duration, stale_factor: u32) -> (Publisher<T>, SlotReader<T>) {
    let (tx, rx) = watch::channel(None);
    let reader = SlotReader {
        rx,
        stale_after: expected_interval * stale_factor.max(1),
        created_at: Instant::now(),
    };
    (Publisher { tx }, reader)
}

/// Write side of a slot. Owned by exactly one sampler.
#[derive(Debug)]
pub struct Publisher<T> {
    tx: watch::Sender<Option<Published<T>>>,
}

impl<T> Publisher<T> {
    /// Replace the slot's value. Never waits for readers.
    pub fn publish(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.tx.send_replace(Some(Published {
            value: Arc::clone(&value),
            published_at: Instant::now(),
        }));
        value
    }
}

#[derive(Debug)]
pub struct SlotReader<T> {
    rx: watch::Receiver<Option<Published<T>>>,
    stale_after: Duration,
    created_at: Instant,
}

impl<T> Clone for SlotReader<T> {
    fn clone(&self) -> Self {
        SlotReader {
            rx: self.rx.clone(),
            stale_after: self.stale_after,
            created_at: self.created_at,
        }
    }
}

impl<T> SlotReader<T> {
    /// Newest snapshot, or `None` before the first cycle completes.
    pub fn latest(&self) -> Option<Arc<T>> {
        self.rx.borrow().as_ref().map(|p| Arc::clone(&p.value))
    }

    pub fn published_at(&self) -> Option<Instant> {
        self.rx.borrow().as_ref().map(|p| p.published_at)
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }

    pub fn is_stale_at(&self, now: Instant) -> bool {
        let since = self.published_at().unwrap_or(self.created_at);
        now.saturating_duration_since(since) > self.stale_after
    }

    /// Wait for the next publication. Returns `false` once the sampler has
    /// gone away.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// The owning sampler ended. The last value stays readable.
    pub fn sampler_stopped(&self) -> bool {
        self.rx.has_changed().is_err()
    }
}
