//! Scope table, completion handling and dispatch shared by all loaders.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use slotmap::SlotMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::events::{Listener, LoaderEvent, SubscriptionId, Subscribers};
use super::{LoadContext, LoaderConfig, LoaderId, LoaderStats, ScopeHandle};
use crate::error::{LoadError, UsageError};
use crate::fetch::PayloadDecoder;
use crate::lifecycle::{GenerationGuard, Lifecycle, Pool, PoolStats};
use crate::operation::{LoadOutcome, LoadingState, OperationId};
use crate::scope::{ConsumerId, LoadRequest, LoadScope, ScopeKey, ScopeState};

/// Worker result for one operation.
struct Completion<P> {
    handle: ScopeHandle,
    guard: GenerationGuard,
    operation: OperationId,
    result: Result<Arc<P>, LoadError>,
}

/// Terminal outcome relayed from an operation callback.
struct Settled<P> {
    handle: ScopeHandle,
    guard: GenerationGuard,
    outcome: LoadOutcome<P>,
}

/// A started operation waiting for dispatch.
#[derive(Debug)]
struct PendingLoad {
    handle: ScopeHandle,
    request: LoadRequest,
}

/// State shared by every loader variant.
///
/// Owns the scopes, the scope pool, the worker channels and the listener
/// list. Variants wrap a core and decide which keys stay desired.
pub struct LoaderCore<D: PayloadDecoder> {
    id: LoaderId,
    name: String,
    lifecycle: Lifecycle,
    context: LoadContext,
    decoder: Arc<D>,

    scopes: SlotMap<ScopeHandle, LoadScope<D::Output>>,
    index: HashMap<ScopeKey, ScopeHandle>,
    pool: Pool<LoadScope<D::Output>>,

    pending: VecDeque<PendingLoad>,
    in_flight: usize,
    next_operation: OperationId,

    completions_tx: mpsc::UnboundedSender<Completion<D::Output>>,
    completions_rx: mpsc::UnboundedReceiver<Completion<D::Output>>,
    settled_tx: mpsc::UnboundedSender<Settled<D::Output>>,
    settled_rx: mpsc::UnboundedReceiver<Settled<D::Output>>,

    subscribers: Subscribers,
    stats: LoaderStats,
}

impl<D: PayloadDecoder> fmt::Debug for LoaderCore<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("lifecycle", &self.lifecycle.state())
            .field("scopes", &self.scopes.len())
            .field("pending", &self.pending.len())
            .field("in_flight", &self.in_flight)
            .field("subscribers", &self.subscribers)
            .finish()
    }
}

impl<D: PayloadDecoder> LoaderCore<D> {
    /// Create a core for one data feed.
    ///
    /// # Arguments
    ///
    /// * `name` - Feed name used in log output
    /// * `context` - Runtime, fetch service and configuration
    /// * `decoder` - Payload decoder shared with worker tasks
    pub fn new(name: impl Into<String>, context: LoadContext, decoder: D) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        let mut lifecycle = Lifecycle::new();
        lifecycle.initialize();
        let name = name.into();
        let id = context.allocate_loader_id();
        let pool = Pool::with_capacity(context.config().pool_capacity);

        tracing::info!(
            loader = %id,
            name = %name,
            fetch = context.fetch().name(),
            scheme = context.config().url_scheme.as_str(),
            "Loader created"
        );

        Self {
            id,
            name,
            lifecycle,
            context,
            decoder: Arc::new(decoder),
            scopes: SlotMap::with_key(),
            index: HashMap::new(),
            pool,
            pending: VecDeque::new(),
            in_flight: 0,
            next_operation: 1,
            completions_tx,
            completions_rx,
            settled_tx,
            settled_rx,
            subscribers: Subscribers::default(),
            stats: LoaderStats::default(),
        }
    }

    /// Loader identifier.
    pub fn id(&self) -> LoaderId {
        self.id
    }

    /// Feed name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loader configuration.
    pub fn config(&self) -> &LoaderConfig {
        self.context.config()
    }

    /// Whether the loader has not been disposed.
    pub fn is_live(&self) -> bool {
        self.lifecycle.is_live()
    }

    /// Scope behind a handle.
    pub fn scope(&self, handle: ScopeHandle) -> Option<&LoadScope<D::Output>> {
        self.scopes.get(handle)
    }

    /// Handle registered for `key`.
    pub fn find_scope(&self, key: &ScopeKey) -> Option<ScopeHandle> {
        self.index.get(key).copied()
    }

    /// Every registered scope.
    pub fn scopes(&self) -> impl Iterator<Item = (ScopeHandle, &LoadScope<D::Output>)> {
        self.scopes.iter()
    }

    /// Keys of every registered scope.
    pub fn keys(&self) -> impl Iterator<Item = &ScopeKey> {
        self.index.keys()
    }

    /// Number of registered scopes.
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Loaded payload of a scope.
    pub fn payload(&self, handle: ScopeHandle) -> Option<Arc<D::Output>> {
        self.scopes.get(handle).and_then(LoadScope::payload)
    }

    /// Seed values for a consumer of `handle`.
    pub fn fallback_values_payload(&self, handle: ScopeHandle) -> Option<Value> {
        let range = self.context.config().collider_zoom_range;
        self.scopes
            .get(handle)
            .and_then(|scope| scope.fallback_values_payload(range))
    }

    /// Fetches currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Operations waiting for dispatch.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Scope pool counters.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Counters.
    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            scopes: self.scopes.len(),
            pending: self.pending.len(),
            in_flight: self.in_flight,
            pool: self.pool.stats(),
            ..self.stats
        }
    }

    // =========================================================================
    // Scope table
    // =========================================================================

    /// See [`super::Loader::get_or_create_scope`].
    pub fn get_or_create_scope(
        &mut self,
        key: ScopeKey,
        reload: bool,
        create_if_missing: bool,
    ) -> Option<ScopeHandle> {
        if !self.lifecycle.is_live() {
            return None;
        }
        if let Some(handle) = self.find_scope(&key) {
            if reload {
                self.start_load(handle, true);
            }
            return Some(handle);
        }
        if !create_if_missing {
            return None;
        }
        match self.create_scope(key) {
            Ok(handle) => {
                self.start_load(handle, false);
                Some(handle)
            }
            Err(e) => {
                tracing::error!(loader = %self.id, error = %e, "Scope creation failed");
                None
            }
        }
    }

    /// Register a new scope for `key`.
    ///
    /// Registering a key twice is a usage error; debug builds assert.
    pub(crate) fn create_scope(&mut self, key: ScopeKey) -> Result<ScopeHandle, UsageError> {
        if !self.lifecycle.is_live() {
            return Err(UsageError::LoaderDisposed);
        }
        debug_assert!(
            !self.index.contains_key(&key),
            "duplicate scope registration: {}",
            key
        );
        if self.index.contains_key(&key) {
            return Err(UsageError::DuplicateScope(key));
        }

        let mut scope = self.pool.acquire();
        if !scope.init(key.clone(), self.id) {
            // Pool handed back a scope in an unexpected state.
            scope = LoadScope::default();
            scope.init(key.clone(), self.id);
        }
        let handle = self.scopes.insert(scope);
        self.index.insert(key.clone(), handle);
        self.stats.created += 1;

        tracing::debug!(loader = %self.id, scope = %key, "Scope created");
        self.subscribers
            .emit(&LoaderEvent::ScopeCreated { handle, key });
        Ok(handle)
    }

    /// Start (or restart) the load of a scope and queue it for dispatch.
    pub(crate) fn start_load(&mut self, handle: ScopeHandle, reload: bool) -> bool {
        let operation = self.next_operation;
        let scheme = self.context.config().url_scheme;

        let Some(scope) = self.scopes.get_mut(handle) else {
            return false;
        };
        let Some(request) = scope.start_load(reload, operation, scheme) else {
            return false;
        };
        self.next_operation += 1;
        self.pending.push_back(PendingLoad { handle, request });
        true
    }

    /// State of a scope, for reload decisions.
    pub(crate) fn scope_state(&self, handle: ScopeHandle) -> Option<ScopeState> {
        self.scopes.get(handle).map(LoadScope::state)
    }

    /// See [`super::Loader::add_reference`].
    pub fn add_reference(
        &mut self,
        handle: ScopeHandle,
        consumer: ConsumerId,
    ) -> Result<bool, UsageError> {
        let scope = self
            .scopes
            .get_mut(handle)
            .ok_or(UsageError::UnknownScope)?;
        Ok(scope.add_consumer(consumer))
    }

    /// Unregister a consumer; release the scope on the transition to zero
    /// unless `desired`.
    pub fn remove_reference(
        &mut self,
        handle: ScopeHandle,
        consumer: ConsumerId,
        desired: bool,
    ) -> Result<bool, UsageError> {
        let scope = self
            .scopes
            .get_mut(handle)
            .ok_or(UsageError::UnknownScope)?;
        let emptied = scope.remove_consumer(consumer);
        if emptied && !desired {
            self.release_scope(handle);
        }
        Ok(emptied)
    }

    /// Dispose a scope, drop it from the table and recycle it.
    pub fn release_scope(&mut self, handle: ScopeHandle) -> bool {
        let Some(mut scope) = self.scopes.remove(handle) else {
            return false;
        };
        let key = scope.key().cloned();
        if let Some(key) = &key {
            self.index.remove(key);
        }
        scope.dispose();
        self.pool.release(scope);
        self.stats.released += 1;

        if let Some(key) = key {
            tracing::debug!(loader = %self.id, scope = %key, "Scope released");
            self.subscribers
                .emit(&LoaderEvent::ScopeReleased { handle, key });
        }
        true
    }

    // =========================================================================
    // Completions
    // =========================================================================

    /// Drain worker results and apply them to their scopes.
    ///
    /// Results for released or recycled scopes and for superseded
    /// operations are discarded. Returns the number of scopes that reached
    /// `Loaded`.
    pub fn apply_completions(&mut self) -> usize {
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            let guard = completion.guard;
            let Some(scope) = self
                .scopes
                .get_mut(completion.handle)
                .filter(|scope| scope.is_current(guard))
            else {
                self.stats.discarded += 1;
                tracing::trace!(loader = %self.id, operation = completion.operation, "Discarding result of released scope");
                continue;
            };
            match scope.operation_mut() {
                Some(op) if op.id() == completion.operation => {
                    op.complete(completion.result.into());
                }
                _ => {
                    self.stats.discarded += 1;
                    tracing::trace!(loader = %self.id, operation = completion.operation, "Discarding superseded result");
                }
            }
        }

        let mut loaded = 0;
        while let Ok(settled) = self.settled_rx.try_recv() {
            if !self.lifecycle.is_live() {
                continue;
            }
            let guard = settled.guard;
            let Some(scope) = self
                .scopes
                .get_mut(settled.handle)
                .filter(|scope| scope.is_current(guard))
            else {
                continue;
            };
            let Some(key) = scope.key().cloned() else {
                continue;
            };
            let handle = settled.handle;
            let error = settled.outcome.error.clone();

            let event = match scope.apply_outcome(settled.outcome) {
                Some(ScopeState::Loaded) => {
                    loaded += 1;
                    self.stats.loaded += 1;
                    LoaderEvent::ScopeLoaded { handle, key }
                }
                Some(ScopeState::Failed) => {
                    self.stats.failed += 1;
                    LoaderEvent::ScopeFailed {
                        handle,
                        key,
                        error: error.unwrap_or(LoadError::Other("unknown failure".to_string())),
                    }
                }
                Some(ScopeState::Interrupted) => LoaderEvent::ScopeInterrupted { handle, key },
                _ => continue,
            };
            self.subscribers.emit(&event);
        }
        loaded
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Execute ready operations and spawn their fetches.
    ///
    /// At most `max_in_flight` fetches run at once; the rest stay queued in
    /// order. With a `dispatch_interval`, an operation is held in `Interval`
    /// until `now + dispatch_interval` of the first pass that sees it.
    /// Returns the number of fetches spawned.
    pub fn dispatch_pending(&mut self, now: Instant) -> usize {
        if !self.lifecycle.is_live() {
            return 0;
        }
        let max_in_flight = self.context.config().max_in_flight.max(1);
        let interval = self.context.config().dispatch_interval;
        let mut waiting = VecDeque::with_capacity(self.pending.len());
        let mut dispatched = 0;

        while let Some(pending) = self.pending.pop_front() {
            if self.in_flight >= max_in_flight {
                waiting.push_back(pending);
                waiting.extend(self.pending.drain(..));
                break;
            }

            let handle = pending.handle;
            let Some(op) = self
                .scopes
                .get_mut(handle)
                .and_then(LoadScope::operation_mut)
            else {
                continue;
            };
            if op.id() != pending.request.operation {
                continue;
            }
            if !interval.is_zero() && op.state() == LoadingState::None {
                op.delay(now + interval);
            }
            if !op.is_ready(now) {
                waiting.push_back(pending);
                continue;
            }

            let guard = pending.request.guard;
            let settled_tx = self.settled_tx.clone();
            let executed = op.execute(Box::new(move |outcome| {
                let _ = settled_tx.send(Settled {
                    handle,
                    guard,
                    outcome,
                });
            }));
            if executed.is_err() {
                continue;
            }
            let token = op.cancellation_token();

            self.spawn_fetch(handle, pending.request, token);
            self.in_flight += 1;
            self.stats.dispatched += 1;
            dispatched += 1;
        }

        self.pending = waiting;
        if dispatched > 0 {
            tracing::debug!(
                loader = %self.id,
                dispatched,
                in_flight = self.in_flight,
                pending = self.pending.len(),
                "Dispatched loads"
            );
        }
        dispatched
    }

    fn spawn_fetch(&self, handle: ScopeHandle, request: LoadRequest, token: CancellationToken) {
        let fetch = Arc::clone(self.context.fetch());
        let decoder = Arc::clone(&self.decoder);
        let tx = self.completions_tx.clone();
        let LoadRequest {
            operation,
            params,
            guard,
        } = request;

        self.context.runtime().spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(LoadError::Interrupted),
                fetched = fetch.fetch(&params) => match fetched {
                    Ok(bytes) => decoder
                        .decode(bytes)
                        .map(Arc::new)
                        .map_err(LoadError::from),
                    Err(e) => Err(LoadError::from(e)),
                },
            };
            // The receiver is gone once the loader is dropped.
            let _ = tx.send(Completion {
                handle,
                guard,
                operation,
                result,
            });
        });
    }

    // =========================================================================
    // Events and teardown
    // =========================================================================

    /// Add an event listener.
    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    /// Remove an event listener.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Unsubscribe everyone, then interrupt and drop every scope.
    ///
    /// Idempotent; returns `true` on the first call.
    pub fn dispose(&mut self) -> bool {
        if !self.lifecycle.begin_dispose() {
            return false;
        }
        self.subscribers.clear();

        let count = self.scopes.len();
        for (_, mut scope) in self.scopes.drain() {
            scope.dispose();
        }
        self.index.clear();
        self.pending.clear();
        self.pool.clear();
        while self.completions_rx.try_recv().is_ok() {}
        while self.settled_rx.try_recv().is_ok() {}

        self.lifecycle.finish_dispose();
        tracing::info!(loader = %self.id, name = %self.name, scopes = count, "Loader disposed");
        true
    }
}

impl<D: PayloadDecoder> Drop for LoaderCore<D> {
    fn drop(&mut self) {
        self.dispose();
    }
}
