//! Loaders own the scopes of one data feed.
//!
//! A loader keeps its scopes in a generational arena and hands out
//! [`ScopeHandle`]s. Consumers reference scopes through handles only, so a
//! handle outliving its scope resolves to nothing instead of freed state.
//!
//! # Tick
//!
//! All scope mutation happens on the caller's tick:
//!
//! 1. [`Loader::apply_completions`] drains worker results
//! 2. the variant reconciles its desired key set
//!    ([`IdLoader::add_id`] / [`GridIndexLoader::on_grid_changed`])
//! 3. [`Loader::dispatch_pending`] spawns fetches for ready operations
//!
//! Fetch and decode run on tokio workers and report back over a channel.

mod core;
mod events;
mod grid_index;
mod id;

pub use self::core::LoaderCore;
pub use events::{Listener, LoaderEvent, SubscriptionId};
pub use grid_index::{GridIndexLoader, ReconcileSummary};
pub use id::IdLoader;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;

use crate::error::UsageError;
use crate::fetch::{FetchService, PayloadDecoder};
use crate::lifecycle::{PoolStats, DEFAULT_POOL_CAPACITY};
use crate::scope::{ConsumerId, LoadScope, ScopeItem, ScopeKey, UrlScheme};

slotmap::new_key_type! {
    /// Handle to a scope inside its loader.
    pub struct ScopeHandle;
}

/// Identifies a loader within a [`LoadContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoaderId(pub u32);

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loader#{}", self.0)
    }
}

/// Payload type produced by a loader.
pub type Payload<L> = <<L as Loader>::Decoder as PayloadDecoder>::Output;

// =============================================================================
// Configuration
// =============================================================================

/// Default number of concurrent fetches per loader.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Default delay between scheduling a load and dispatching it.
pub const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::ZERO;

/// Loader behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    /// How scope keys become fetch parameters.
    pub url_scheme: UrlScheme,
    /// Hold new operations in `Interval` for this long before dispatch.
    pub dispatch_interval: Duration,
    /// Maximum concurrent fetches.
    pub max_in_flight: usize,
    /// Recycled scopes kept for reuse.
    pub pool_capacity: usize,
    /// Zoom range whose tiles get `colliderEnabled` in their seed values.
    pub collider_zoom_range: Option<(u32, u32)>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            url_scheme: UrlScheme::default(),
            dispatch_interval: DEFAULT_DISPATCH_INTERVAL,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            collider_zoom_range: None,
        }
    }
}

impl LoaderConfig {
    /// Set the URL scheme.
    pub fn with_url_scheme(mut self, scheme: UrlScheme) -> Self {
        self.url_scheme = scheme;
        self
    }

    /// Set the dispatch interval.
    pub fn with_dispatch_interval(mut self, interval: Duration) -> Self {
        self.dispatch_interval = interval;
        self
    }

    /// Set the concurrency limit.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }

    /// Set the collider zoom range.
    pub fn with_collider_zoom_range(mut self, range: Option<(u32, u32)>) -> Self {
        self.collider_zoom_range = range;
        self
    }
}

// =============================================================================
// Context
// =============================================================================

/// Everything a loader needs from its environment.
///
/// Passed to loader constructors in place of process-wide registries.
/// Clones share the loader id counter.
#[derive(Clone)]
pub struct LoadContext {
    runtime: Handle,
    fetch: Arc<dyn FetchService>,
    config: LoaderConfig,
    next_loader_id: Arc<AtomicU32>,
}

impl fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadContext")
            .field("fetch", &self.fetch.name())
            .field("config", &self.config)
            .finish()
    }
}

impl LoadContext {
    /// Create a context spawning workers on `runtime`.
    pub fn new(runtime: Handle, fetch: Arc<dyn FetchService>, config: LoaderConfig) -> Self {
        Self {
            runtime,
            fetch,
            config,
            next_loader_id: Arc::new(AtomicU32::new(1)),
        }
    }

    /// Create a context on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current(fetch: Arc<dyn FetchService>, config: LoaderConfig) -> Self {
        Self::new(Handle::current(), fetch, config)
    }

    /// Runtime workers are spawned on.
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Fetch collaborator.
    pub fn fetch(&self) -> &Arc<dyn FetchService> {
        &self.fetch
    }

    /// Loader configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Copy of this context with a different configuration.
    pub fn with_config(&self, config: LoaderConfig) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }

    pub(crate) fn allocate_loader_id(&self) -> LoaderId {
        LoaderId(self.next_loader_id.fetch_add(1, Ordering::Relaxed))
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Loader counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Scopes currently registered.
    pub scopes: usize,
    /// Operations waiting for dispatch.
    pub pending: usize,
    /// Fetches currently running.
    pub in_flight: usize,
    /// Scopes created since start.
    pub created: u64,
    /// Scopes released since start.
    pub released: u64,
    /// Fetches dispatched since start.
    pub dispatched: u64,
    /// Loads that reached `Loaded`.
    pub loaded: u64,
    /// Loads that reached `Failed`.
    pub failed: u64,
    /// Worker results dropped because their scope or operation was gone.
    pub discarded: u64,
    /// Scope pool counters.
    pub pool: PoolStats,
}

// =============================================================================
// Loader trait
// =============================================================================

/// Operations shared by every loader variant.
///
/// Variants supply the core and the desired-key predicate; reference
/// counting, completion handling and dispatch are shared.
pub trait Loader {
    /// Decoder turning fetched bytes into payloads.
    type Decoder: PayloadDecoder;

    /// Shared loader state.
    fn core(&self) -> &LoaderCore<Self::Decoder>;

    /// Shared loader state, mutably.
    fn core_mut(&mut self) -> &mut LoaderCore<Self::Decoder>;

    /// Whether `key` is kept alive independently of consumers.
    fn is_desired(&self, key: &ScopeKey) -> bool;

    /// Loader identifier.
    fn id(&self) -> LoaderId {
        self.core().id()
    }

    /// Look up a scope, optionally creating and loading it.
    ///
    /// # Arguments
    ///
    /// * `key` - Scope key
    /// * `reload` - Restart the load of an existing scope
    /// * `create_if_missing` - Create the scope when absent
    ///
    /// # Returns
    ///
    /// The scope's handle, or `None` if absent and not created.
    fn get_or_create_scope(
        &mut self,
        key: ScopeKey,
        reload: bool,
        create_if_missing: bool,
    ) -> Option<ScopeHandle> {
        self.core_mut()
            .get_or_create_scope(key, reload, create_if_missing)
    }

    /// Look up a scope without creating it.
    fn find_scope(&self, key: &ScopeKey) -> Option<ScopeHandle> {
        self.core().find_scope(key)
    }

    /// Scope behind a handle; `None` for stale handles.
    fn scope(
        &self,
        handle: ScopeHandle,
    ) -> Option<&LoadScope<<Self::Decoder as PayloadDecoder>::Output>> {
        self.core().scope(handle)
    }

    /// Create-or-find `key` and register `consumer` in one step.
    fn acquire(&mut self, key: ScopeKey, consumer: ConsumerId) -> Option<ScopeHandle> {
        let handle = self.get_or_create_scope(key, false, true)?;
        self.add_reference(handle, consumer).ok()?;
        Some(handle)
    }

    /// Register a consumer. Returns `true` on the zero-to-one transition.
    fn add_reference(
        &mut self,
        handle: ScopeHandle,
        consumer: ConsumerId,
    ) -> Result<bool, UsageError> {
        self.core_mut().add_reference(handle, consumer)
    }

    /// Unregister a consumer. On the transition to zero the scope is
    /// released unless its key is still desired.
    fn remove_reference(
        &mut self,
        handle: ScopeHandle,
        consumer: ConsumerId,
    ) -> Result<bool, UsageError> {
        let desired = match self.core().scope(handle).and_then(LoadScope::key) {
            Some(key) => self.is_desired(key),
            None => return Err(UsageError::UnknownScope),
        };
        self.core_mut().remove_reference(handle, consumer, desired)
    }

    /// Release every scope with no consumers whose key is not desired.
    fn collect_unreferenced(&mut self) -> usize {
        let orphans: Vec<ScopeHandle> = self
            .core()
            .scopes()
            .filter(|(_, scope)| {
                !scope.has_consumers() && scope.key().is_some_and(|key| !self.is_desired(key))
            })
            .map(|(handle, _)| handle)
            .collect();
        let core = self.core_mut();
        orphans
            .into_iter()
            .filter(|handle| core.release_scope(*handle))
            .count()
    }

    /// Whether `item` belongs to the scope behind `handle`.
    fn is_in_scope(&self, handle: ScopeHandle, item: &dyn ScopeItem) -> bool {
        self.core()
            .scope(handle)
            .is_some_and(|scope| scope.is_in_scope(item))
    }

    /// Apply worker results. Returns the number of scopes that loaded.
    fn apply_completions(&mut self) -> usize {
        self.core_mut().apply_completions()
    }

    /// Spawn fetches for operations ready at `now`. Returns how many were
    /// dispatched.
    fn dispatch_pending(&mut self, now: Instant) -> usize {
        self.core_mut().dispatch_pending(now)
    }

    /// Add an event listener.
    fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        self.core_mut().subscribe(listener)
    }

    /// Remove an event listener.
    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.core_mut().unsubscribe(id)
    }

    /// Counters.
    fn stats(&self) -> LoaderStats {
        self.core().stats()
    }

    /// Unsubscribe everyone, then interrupt and drop every scope.
    fn dispose(&mut self) -> bool {
        self.core_mut().dispose()
    }
}
