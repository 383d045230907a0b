//! Keyed request coalescing.
//!
//! Concurrent callers asking for the same key share one execution of the
//! underlying operation. The entry lives only while the operation is in
//! flight; the next call after it resolves starts a fresh execution.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

/// Map from operation key to the shared result of its in-flight execution.
pub struct SingleFlight<K, V> {
    inflight: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty coalescer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` for `key`, or join the execution already in flight.
    ///
    /// Every caller that joins receives a clone of the same value. If the
    /// caller driving the operation is dropped, one of the waiters takes over
    /// with its own `operation`.
    pub async fn run<F, Fut>(&self, key: K, operation: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let value = cell.get_or_init(operation).await.clone();

        let mut inflight = self.inflight.lock().await;
        if inflight
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            inflight.remove(&key);
        }
        value
    }

    /// Number of keys with an execution in flight.
    pub async fn in_flight(&self) -> usize {
        self.inflight.lock().await.len()
    }
}
