use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

/// Single slot, last write wins.
///
/// Producers overwrite whatever has not been consumed yet; a value that gets
/// overwritten is never delivered. Meant for exactly one consumer.
#[derive(Debug)]
pub struct Mailbox<T> {
    inner: Arc<Inner<T>>,
}

#[derive(Debug)]
struct Inner<T> {
    slot: Mutex<Option<T>>,
    notify: Notify,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// Stores `value`, returning the unconsumed value it replaced.
    pub fn put(&self, value: T) -> Option<T> {
        let replaced = self.slot().replace(value);
        self.inner.notify.notify_one();
        replaced
    }

    pub fn take(&self) -> Option<T> {
        self.slot().take()
    }

    pub fn clear(&self) {
        self.slot().take();
    }

    /// Waits until the slot holds a value and takes it.
    pub async fn recv(&self) -> T {
        loop {
            if let Some(value) = self.take() {
                return value;
            }
            self.inner.notify.notified().await;
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<T>> {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
