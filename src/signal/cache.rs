//! Per-signal subscription multiplexing.
//!
//! A [`SignalCache`] registers exactly one callback with the backend and fans
//! every inbound reading out, synchronously and in subscription order, to any
//! number of listeners. It also holds the latest reading so one-shot reads
//! can be served without another backend round-trip.
//!
//! Lifecycle invariant: the cache is torn down (and the backend callback
//! cleared) exactly when it has no listeners *and* is not staged. While
//! staged it survives listener removal to serve repeated one-shot reads.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::signal::backend::{Reading, SignalValue};
use crate::sync::lock;

/// One cache listener, flagged by what it wants to receive.
pub(crate) enum CacheListener<T> {
    /// Receives just the payload.
    Value(Box<dyn Fn(&T) + Send>),
    /// Receives the signal name and the full reading.
    Reading(Box<dyn Fn(&str, &Reading<T>) + Send>),
}

struct CacheInner<T> {
    latest: Option<Reading<T>>,
    listeners: Vec<(u64, CacheListener<T>)>,
    staged: bool,
    next_id: u64,
}

/// Multiplexes one backend subscription across any number of listeners.
pub(crate) struct SignalCache<T: SignalValue> {
    name: String,
    inner: Mutex<CacheInner<T>>,
    valid: watch::Sender<bool>,
}

impl<T: SignalValue> SignalCache<T> {
    pub(crate) fn new(name: &str) -> Arc<Self> {
        let (valid, _) = watch::channel(false);
        Arc::new(Self {
            name: name.to_string(),
            inner: Mutex::new(CacheInner {
                latest: None,
                listeners: Vec::new(),
                staged: false,
                next_id: 0,
            }),
            valid,
        })
    }

    /// Deliver one backend reading to every current listener, in
    /// subscription order, then mark the cache valid.
    ///
    /// Listener callbacks run under the cache lock, so they must not call
    /// back into this cache.
    pub(crate) fn notify(&self, reading: Reading<T>) {
        {
            let mut inner = lock(&self.inner);
            inner.latest = Some(reading.clone());
            for (_, listener) in &inner.listeners {
                Self::deliver(&self.name, listener, &reading);
            }
        }
        self.valid.send_replace(true);
    }

    fn deliver(name: &str, listener: &CacheListener<T>, reading: &Reading<T>) {
        match listener {
            CacheListener::Value(callback) => callback(&reading.value),
            CacheListener::Reading(callback) => callback(name, reading),
        }
    }

    /// Register a listener, returning its id.
    ///
    /// If the cache is already valid the listener is notified synchronously,
    /// before any subsequent backend update can interleave.
    pub(crate) fn subscribe(&self, listener: CacheListener<T>) -> u64 {
        let mut inner = lock(&self.inner);
        if let Some(latest) = inner.latest.clone() {
            Self::deliver(&self.name, &listener, &latest);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, listener));
        id
    }

    /// Remove a listener. Returns whether the cache is still needed
    /// (other listeners remain or the cache is staged).
    pub(crate) fn unsubscribe(&self, id: u64) -> bool {
        let mut inner = lock(&self.inner);
        inner.listeners.retain(|(listener_id, _)| *listener_id != id);
        !inner.listeners.is_empty() || inner.staged
    }

    /// Set the staged flag. Returns whether the cache is still needed.
    pub(crate) fn set_staged(&self, staged: bool) -> bool {
        let mut inner = lock(&self.inner);
        inner.staged = staged;
        !inner.listeners.is_empty() || inner.staged
    }

    /// Await the first reading, then return the latest one.
    pub(crate) async fn get_reading(&self) -> Reading<T> {
        let mut rx = self.valid.subscribe();
        loop {
            if let Some(reading) = lock(&self.inner).latest.clone() {
                return reading;
            }
            // The sender lives as long as `self`, so this only wakes on a
            // real validity change.
            let _ = rx.changed().await;
        }
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reading(value: f64) -> Reading<f64> {
        Reading::now(value)
    }

    #[test]
    fn fanout_is_in_subscription_order_with_per_listener_flavor() {
        let cache = SignalCache::<f64>::new("power");
        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = events.clone();
        cache.subscribe(CacheListener::Value(Box::new(move |value| {
            lock(&sink).push(format!("value:{value}"));
        })));
        let sink = events.clone();
        cache.subscribe(CacheListener::Reading(Box::new(move |name, reading| {
            lock(&sink).push(format!("reading:{name}:{}", reading.value));
        })));
        let sink = events.clone();
        cache.subscribe(CacheListener::Value(Box::new(move |value| {
            lock(&sink).push(format!("value2:{value}"));
        })));

        cache.notify(reading(3.5));

        assert_eq!(
            *lock(&events),
            vec![
                "value:3.5".to_string(),
                "reading:power:3.5".to_string(),
                "value2:3.5".to_string(),
            ]
        );
    }

    #[test]
    fn one_update_yields_exactly_one_notification_per_listener() {
        let cache = SignalCache::<u64>::new("counter");
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let count = count.clone();
            cache.subscribe(CacheListener::Value(Box::new(move |_value| {
                count.fetch_add(1, Ordering::SeqCst);
            })));
        }

        cache.notify(Reading::now(1));
        assert_eq!(count.load(Ordering::SeqCst), 4);

        // Duplicate emissions are not coalesced.
        cache.notify(Reading::now(1));
        assert_eq!(count.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn late_subscriber_is_notified_synchronously_from_valid_cache() {
        let cache = SignalCache::<f64>::new("power");
        cache.notify(reading(1.25));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        cache.subscribe(CacheListener::Value(Box::new(move |value| {
            lock(&sink).push(*value);
        })));

        // Delivered during subscribe, before any further notify.
        assert_eq!(*lock(&seen), vec![1.25]);
    }

    #[test]
    fn unsubscribe_of_last_listener_reports_not_needed_unless_staged() {
        let cache = SignalCache::<f64>::new("power");
        let id = cache.subscribe(CacheListener::Value(Box::new(|_value| {})));
        assert!(!cache.unsubscribe(id));
        assert_eq!(cache.listener_count(), 0);

        let id = cache.subscribe(CacheListener::Value(Box::new(|_value| {})));
        assert!(cache.set_staged(true));
        // Staged caches survive removal of the last listener.
        assert!(cache.unsubscribe(id));
        // Unstaging with no listeners left finally releases it.
        assert!(!cache.set_staged(false));
    }

    #[tokio::test]
    async fn get_reading_waits_for_first_value() {
        let cache = SignalCache::<u64>::new("counter");
        let waiter = cache.clone();
        let handle = tokio::spawn(async move { waiter.get_reading().await.value });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cache.notify(Reading::now(99));

        assert_eq!(handle.await.unwrap(), 99);
    }
}
