//! Keyed stale-while-revalidate cache for API reads.
//!
//! Each key holds at most one in-flight request; concurrent readers of a key
//! share it and its result. Subscribed readers ([`Query`]) are refreshed in
//! the background when their key is invalidated, and keep seeing the previous
//! data until the refetch completes.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::{ClientError, Result};

/// Function producing a fresh value for a key.
pub type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<Arc<T>>>>;

/// Wraps an async closure into a [`Fetcher`].
pub fn fetcher<T, F, Fut>(f: F) -> Fetcher<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Snapshot of one key as seen by a reader.
pub struct QueryState<T> {
    /// Last successfully fetched value.
    pub data: Option<Arc<T>>,
    /// Error of the last fetch, cleared by the next success.
    pub error: Option<ClientError>,
    /// A fetch is running and no data exists yet.
    pub is_loading: bool,
    /// A fetch is running or scheduled.
    pub is_validating: bool,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            is_validating: self.is_validating,
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            is_validating: false,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for QueryState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryState")
            .field("data", &self.data)
            .field("error", &self.error)
            .field("is_loading", &self.is_loading)
            .field("is_validating", &self.is_validating)
            .finish()
    }
}

struct Entry<T> {
    state: watch::Sender<QueryState<T>>,
    in_flight: Option<SharedFetch<T>>,
    fetcher: Option<Fetcher<T>>,
    /// Generation of the latest request started for this key.
    generation: u64,
    /// Generation of the request that produced the current data.
    data_generation: u64,
    /// Requests older than this generation began before the last
    /// invalidation.
    invalidated_at: u64,
    revalidation_scheduled: bool,
}

impl<T> Entry<T> {
    fn new() -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            state,
            in_flight: None,
            fetcher: None,
            generation: 0,
            data_generation: 0,
            invalidated_at: 0,
            revalidation_scheduled: false,
        }
    }

    fn fresh_data(&self) -> Option<Arc<T>> {
        if self.data_generation < self.invalidated_at {
            None
        } else {
            self.state.borrow().data.clone()
        }
    }

    fn invalidate(&mut self, generation: u64) {
        self.invalidated_at = generation;
    }

    /// The in-flight request, if it started after the last invalidation.
    fn current_in_flight(&self) -> Option<&SharedFetch<T>> {
        self.in_flight
            .as_ref()
            .filter(|_| self.generation >= self.invalidated_at)
    }

    fn has_subscribers(&self) -> bool {
        self.state.receiver_count() > 0
    }
}

struct Inner<T> {
    entries: HashMap<String, Entry<T>>,
    next_generation: u64,
}

/// Keyed, single-flight cache of values of type `T`.
///
/// Cloning yields another handle to the same cache.
pub struct QueryCache<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for QueryCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("QueryCache")
            .field("keys", &inner.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Default for QueryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> QueryCache<T> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                next_generation: 1,
            })),
        }
    }

    /// Returns the cached value for `key`, fresh or stale.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        let inner = self.inner.lock();
        inner
            .entries
            .get(key)
            .and_then(|entry| entry.state.borrow().data.clone())
    }

    /// Returns fresh data for `key`, joining an in-flight request or starting
    /// one when needed.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error; every caller sharing the request gets it.
    pub async fn fetch(&self, key: &str, fetcher: Fetcher<T>) -> Result<Arc<T>> {
        let pending = {
            let mut inner = self.inner.lock();
            let generation = inner.next_generation;
            let entry = inner
                .entries
                .entry(key.to_string())
                .or_insert_with(Entry::new);

            if let Some(data) = entry.fresh_data() {
                tracing::debug!(key, "Query cache hit");
                return Ok(data);
            }

            let (pending, started) = self.start_fetch(key, entry, fetcher, generation);
            if started {
                inner.next_generation += 1;
            }
            pending
        };

        pending.await
    }

    /// Mounts a reader on `key`.
    ///
    /// The fetcher is remembered for background revalidation. A fetch starts
    /// right away unless fresh data is cached; it runs on the current tokio
    /// runtime.
    #[must_use]
    pub fn subscribe(&self, key: &str, fetcher: Fetcher<T>) -> Query<T> {
        let (receiver, pending) = {
            let mut inner = self.inner.lock();
            let generation = inner.next_generation;
            let entry = inner
                .entries
                .entry(key.to_string())
                .or_insert_with(Entry::new);

            entry.fetcher = Some(Arc::clone(&fetcher));
            let receiver = entry.state.subscribe();

            let pending = if entry.fresh_data().is_none() {
                let (pending, started) = self.start_fetch(key, entry, fetcher, generation);
                if started {
                    inner.next_generation += 1;
                }
                Some(pending)
            } else {
                None
            };
            (receiver, pending)
        };

        if let Some(pending) = pending {
            spawn_detached(async move {
                let _ = pending.await;
            });
        }

        Query {
            key: key.to_string(),
            receiver,
        }
    }

    /// Marks `key` stale.
    ///
    /// Readers keep the current data. If a reader is subscribed, a refetch is
    /// scheduled in the background; otherwise the next [`fetch`](Self::fetch)
    /// refetches. The key stays stale until a request started after this call
    /// succeeds; a request already in flight does not count.
    pub fn invalidate(&self, key: &str) {
        let scheduled = {
            let mut inner = self.inner.lock();
            let generation = inner.next_generation;
            let Some(entry) = inner.entries.get_mut(key) else {
                return;
            };
            entry.invalidate(generation);
            let scheduled = Self::schedule_revalidation(entry);
            inner.next_generation += 1;
            scheduled
        };

        tracing::debug!(key, revalidating = scheduled, "Invalidated query");
        if scheduled {
            self.spawn_revalidation(key.to_string());
        }
    }

    /// Invalidates every key starting with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let scheduled: Vec<String> = {
            let mut inner = self.inner.lock();
            let generation = inner.next_generation;
            inner.next_generation += 1;
            inner
                .entries
                .iter_mut()
                .filter(|(key, _)| key.starts_with(prefix))
                .filter_map(|(key, entry)| {
                    entry.invalidate(generation);
                    Self::schedule_revalidation(entry).then(|| key.clone())
                })
                .collect()
        };

        for key in scheduled {
            self.spawn_revalidation(key);
        }
    }

    /// Drops every entry. Mounted readers stop receiving updates.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Returns the in-flight request of `entry`, or starts one. The boolean
    /// is true when a new request was started with `generation`.
    ///
    /// A request that began before the last invalidation is not joined; the
    /// new request waits for it so requests for one key never overlap.
    fn start_fetch(
        &self,
        key: &str,
        entry: &mut Entry<T>,
        fetcher: Fetcher<T>,
        generation: u64,
    ) -> (SharedFetch<T>, bool) {
        if let Some(in_flight) = entry.current_in_flight() {
            return (in_flight.clone(), false);
        }

        let earlier = entry.in_flight.take();
        entry.generation = generation;
        entry.revalidation_scheduled = false;
        entry.state.send_modify(|state| {
            state.is_validating = true;
            state.is_loading = state.data.is_none();
        });

        let weak = Arc::downgrade(&self.inner);
        let owned_key = key.to_string();
        let pending = async move {
            if let Some(earlier) = earlier {
                let _ = earlier.await;
            }
            let result = fetcher().await.map(Arc::new);
            Self::complete(&weak, &owned_key, generation, &result);
            result
        }
        .boxed()
        .shared();

        entry.in_flight = Some(pending.clone());
        (pending, true)
    }

    fn complete(weak: &Weak<Mutex<Inner<T>>>, key: &str, generation: u64, result: &Result<Arc<T>>) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let mut inner = inner.lock();
        let Some(entry) = inner.entries.get_mut(key) else {
            return;
        };
        if entry.generation != generation {
            return;
        }

        entry.in_flight = None;
        if result.is_ok() {
            entry.data_generation = generation;
        }
        let still_validating = entry.revalidation_scheduled;
        entry.state.send_modify(|state| {
            match result {
                Ok(data) => {
                    state.data = Some(Arc::clone(data));
                    state.error = None;
                }
                // The previous data stays stale; the next read refetches.
                Err(e) => state.error = Some(e.clone()),
            }
            state.is_validating = still_validating;
            state.is_loading = still_validating && state.data.is_none();
        });

        match result {
            Ok(_) => tracing::debug!(key, "Query fetched"),
            Err(e) => tracing::debug!(key, error = %e, "Query fetch failed"),
        }
    }

    /// Flags a background refetch for `entry` when someone is watching it.
    fn schedule_revalidation(entry: &mut Entry<T>) -> bool {
        if entry.revalidation_scheduled || !entry.has_subscribers() || entry.fetcher.is_none() {
            return false;
        }
        entry.revalidation_scheduled = true;
        entry.state.send_modify(|state| state.is_validating = true);
        true
    }

    fn spawn_revalidation(&self, key: String) {
        let cache = self.clone();
        spawn_detached(async move {
            let fetcher = {
                let inner = cache.inner.lock();
                inner.entries.get(&key).and_then(|entry| entry.fetcher.clone())
            };
            if let Some(fetcher) = fetcher {
                let _ = cache.fetch(&key, fetcher).await;
            }
        });
    }
}

/// Spawns on the current runtime. Outside a runtime the work is skipped; a
/// later [`QueryCache::fetch`] picks up the pending state instead.
fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(future);
        }
        Err(_) => tracing::debug!("No tokio runtime, skipping background fetch"),
    }
}

/// A mounted reader of one cache key.
pub struct Query<T> {
    key: String,
    receiver: watch::Receiver<QueryState<T>>,
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").field("key", &self.key).finish()
    }
}

impl<T> Query<T> {
    /// Returns the cache key this reader watches.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> QueryState<T> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next state change. Returns false once the entry is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Waits until no fetch is running or scheduled and returns that state.
    pub async fn settled(&mut self) -> QueryState<T> {
        let settled = self
            .receiver
            .wait_for(|state| !state.is_validating)
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }
}
