//! Call-rate shaping: keyed debounce and leading-edge throttle.
//!
//! A [`Debouncer`] owns its timer registry. Clone it to share the registry
//! between call sites; create a new one to get an isolated registry. Within
//! one registry, every debounced function under the same key shares a single
//! pending timer, so a call through one cancels the other's pending call.
//! This includes all functions created with [`Debouncer::debounce_default`],
//! which share [`DEFAULT_DEBOUNCE_KEY`].

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Key used by unkeyed debounced functions. Two of them on the same
/// `Debouncer` cancel each other's pending calls.
pub const DEFAULT_DEBOUNCE_KEY: &str = "default";

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct TimerRegistry {
    timers: Mutex<HashMap<String, PendingTimer>>,
    next_generation: AtomicU64,
}

impl TimerRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingTimer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone, Default)]
pub struct Debouncer {
    registry: Arc<TimerRegistry>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `f` so that each call replaces the pending call under `key`.
    /// Calls must be made from within a tokio runtime.
    pub fn debounce<A, F>(&self, key: impl Into<String>, wait: Duration, f: F) -> Debounced<A>
    where
        A: Send + 'static,
        F: Fn(A) + Send + Sync + 'static,
    {
        Debounced {
            debouncer: self.clone(),
            key: key.into(),
            wait,
            f: Arc::new(f),
            _args: PhantomData,
        }
    }

    pub fn debounce_default<A, F>(&self, wait: Duration, f: F) -> Debounced<A>
    where
        A: Send + 'static,
        F: Fn(A) + Send + Sync + 'static,
    {
        self.debounce(DEFAULT_DEBOUNCE_KEY, wait, f)
    }

    fn schedule<J>(&self, key: &str, wait: Duration, job: J)
    where
        J: FnOnce() + Send + 'static,
    {
        let generation = self.registry.next_generation.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::downgrade(&self.registry);
        let owned_key = key.to_string();

        let mut timers = self.registry.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if let Some(registry) = registry.upgrade() {
                let mut timers = registry.lock();
                if timers
                    .get(&owned_key)
                    .is_some_and(|t| t.generation == generation)
                {
                    timers.remove(&owned_key);
                }
            }
            job();
        });

        if let Some(previous) = timers.insert(key.to_string(), PendingTimer { generation, handle }) {
            previous.handle.abort();
            tracing::trace!(key, "Replaced pending debounced call");
        }
    }

    /// Cancels the pending call under `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &str) -> bool {
        match self.registry.lock().remove(key) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancels every pending call.
    pub fn clear(&self) {
        let mut timers = self.registry.lock();
        for (_, pending) in timers.drain() {
            pending.handle.abort();
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.registry.lock().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.registry.lock().len()
    }
}

pub struct Debounced<A> {
    debouncer: Debouncer,
    key: String,
    wait: Duration,
    f: Arc<dyn Fn(A) + Send + Sync>,
    _args: PhantomData<fn(A)>,
}

impl<A: Send + 'static> Debounced<A> {
    pub fn call(&self, args: A) {
        let f = Arc::clone(&self.f);
        self.debouncer.schedule(&self.key, self.wait, move || f(args));
    }

    pub fn cancel(&self) -> bool {
        self.debouncer.cancel(&self.key)
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Runs `f` on the first call, then drops calls until `limit` has passed.
pub struct Throttle<A> {
    limit: Duration,
    last_run: Mutex<Option<Instant>>,
    f: Box<dyn Fn(A) + Send + Sync>,
}

impl<A> Throttle<A> {
    pub fn new<F>(limit: Duration, f: F) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            limit,
            last_run: Mutex::new(None),
            f: Box::new(f),
        }
    }

    /// Returns `true` when `f` ran, `false` when the call was dropped.
    pub fn call(&self, args: A) -> bool {
        let now = Instant::now();
        {
            let mut last_run = self.last_run.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = *last_run {
                if now.duration_since(previous) < self.limit {
                    tracing::trace!("Throttled call dropped");
                    return false;
                }
            }
            *last_run = Some(now);
        }
        (self.f)(args);
        true
    }

    /// Opens the window again immediately.
    pub fn reset(&self) {
        *self.last_run.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
