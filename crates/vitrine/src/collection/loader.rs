//! Background loads with one in-flight task per box.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use vitrine_core::logging::targets;
use vitrine_core::{CancellationToken, DispatcherHandle, ThreadPool};

use crate::store::BoxId;

type InFlight = Arc<Mutex<HashMap<BoxId, (u64, CancellationToken)>>>;

/// Runs content loads on the worker pool and hands results to the dispatcher.
///
/// Starting a load for a box cancels the box's previous load. A cancelled
/// load never reaches its continuation, even if the worker already finished.
pub struct ContentLoader {
    pool: Arc<ThreadPool>,
    dispatcher: DispatcherHandle,
    in_flight: InFlight,
    generation: AtomicU64,
}

impl ContentLoader {
    pub fn new(pool: Arc<ThreadPool>, dispatcher: DispatcherHandle) -> Self {
        Self {
            pool,
            dispatcher,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Run `task` on a worker, then `continuation` on the dispatcher thread.
    pub fn load<F, T, C>(&self, key: BoxId, task: F, continuation: C)
    where
        F: FnOnce(&CancellationToken) -> T + Send + 'static,
        T: Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Some((_, previous)) = self.in_flight.lock().insert(key, (generation, token.clone())) {
            tracing::debug!(target: targets::COLLECTION, box_id = key.0, "superseding in-flight load");
            previous.cancel();
        }

        let worker_token = token.clone();
        let in_flight = self.in_flight.clone();
        self.pool.spawn_with_callback(
            move || task(&worker_token),
            &self.dispatcher,
            move |result| {
                if token.is_cancelled() {
                    tracing::trace!(target: targets::COLLECTION, box_id = key.0, "dropping cancelled load");
                    return;
                }
                {
                    let mut in_flight = in_flight.lock();
                    if in_flight.get(&key).is_some_and(|(current, _)| *current == generation) {
                        in_flight.remove(&key);
                    }
                }
                continuation(result);
            },
        );
    }

    /// Cancel the in-flight load for `key`. Returns whether there was one.
    pub fn cancel(&self, key: BoxId) -> bool {
        match self.in_flight.lock().remove(&key) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a load for `key` has been started and not yet delivered.
    pub fn is_loading(&self, key: BoxId) -> bool {
        self.in_flight.lock().contains_key(&key)
    }

    /// Number of loads started and not yet delivered or cancelled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl Drop for ContentLoader {
    fn drop(&mut self) {
        for (_, (_, token)) in self.in_flight.lock().drain() {
            token.cancel();
        }
    }
}

impl std::fmt::Debug for ContentLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentLoader")
            .field("pool", &self.pool)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
