//! Load scopes: one addressable unit of loadable content.
//!
//! A scope deduplicates interest in a key. It owns at most one live
//! [`LoadOperation`], keeps the last loaded payload and tracks which
//! consumers depend on it. Scopes are owned by a loader, which hands out
//! [`crate::loader::ScopeHandle`]s instead of references.

mod item;
mod key;
mod url;

pub use item::{ConsumerId, ScopeItem};
pub use key::{grid_hash, GridKey, ScopeKey, SerializableId};
pub use url::{grid_url_params, url_params, UrlParams, UrlScheme};

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::coord::{tile_center_lat_lon, GeoCoordinate};
use crate::error::LoadError;
use crate::lifecycle::{GenerationGuard, Lifecycle, LifecycleState, Recycle};
use crate::loader::LoaderId;
use crate::operation::{LoadOperation, LoadOutcome, LoadingState, OperationId};

/// Load state of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScopeState {
    /// No load has been requested.
    #[default]
    Empty,
    /// An operation is pending or in flight.
    Loading,
    /// The payload is available.
    Loaded,
    /// The last attempt failed; waits for an explicit reload.
    Failed,
    /// The last attempt was cut short.
    Interrupted,
}

impl fmt::Display for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// A fetch the owning loader must dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// Operation the result belongs to.
    pub operation: OperationId,
    /// Positional fetch parameters.
    pub params: UrlParams,
    /// Scope identity at the time the load started.
    pub guard: GenerationGuard,
}

/// One addressable unit of loadable content.
pub struct LoadScope<P> {
    lifecycle: Lifecycle,
    key: Option<ScopeKey>,
    loader: Option<LoaderId>,
    state: ScopeState,
    consumers: Vec<ConsumerId>,
    operation: Option<LoadOperation<P>>,
    payload: Option<Arc<P>>,
    error: Option<LoadError>,
}

impl<P> Default for LoadScope<P> {
    fn default() -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            key: None,
            loader: None,
            state: ScopeState::Empty,
            consumers: Vec::new(),
            operation: None,
            payload: None,
            error: None,
        }
    }
}

impl<P> fmt::Debug for LoadScope<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadScope")
            .field("lifecycle", &self.lifecycle.state())
            .field("key", &self.key)
            .field("state", &self.state)
            .field("consumers", &self.consumers)
            .field("operation", &self.operation)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

impl<P> LoadScope<P> {
    /// Bind a fresh (or recycled) scope to a key and its owning loader.
    ///
    /// Returns `false` if the scope is not in a state that can be
    /// initialized.
    pub fn init(&mut self, key: ScopeKey, loader: LoaderId) -> bool {
        if !self.lifecycle.initialize() {
            return false;
        }
        self.key = Some(key);
        self.loader = Some(loader);
        true
    }

    /// Lifecycle state.
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Whether the scope is live.
    pub fn is_live(&self) -> bool {
        self.lifecycle.is_live()
    }

    /// Whether a result carrying `guard` still belongs to this scope.
    pub fn is_current(&self, guard: GenerationGuard) -> bool {
        self.lifecycle.is_current(guard)
    }

    /// Scope key; `None` once disposed.
    pub fn key(&self) -> Option<&ScopeKey> {
        self.live().and(self.key.as_ref())
    }

    /// Owning loader; `None` once disposed.
    pub fn loader(&self) -> Option<LoaderId> {
        self.live().and(self.loader)
    }

    /// Load state.
    pub fn state(&self) -> ScopeState {
        self.state
    }

    /// Last loaded payload; `None` until loaded or once disposed.
    pub fn payload(&self) -> Option<Arc<P>> {
        self.live().and(self.payload.clone())
    }

    /// Error of the last failed attempt.
    pub fn error(&self) -> Option<&LoadError> {
        self.live().and(self.error.as_ref())
    }

    /// Current operation, if one is pending or in flight.
    pub fn operation(&self) -> Option<&LoadOperation<P>> {
        self.live().and(self.operation.as_ref())
    }

    pub(crate) fn operation_mut(&mut self) -> Option<&mut LoadOperation<P>> {
        if !self.lifecycle.is_live() {
            return None;
        }
        self.operation.as_mut()
    }

    /// Consumers in registration order.
    pub fn consumers(&self) -> &[ConsumerId] {
        &self.consumers
    }

    /// Number of consumers.
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Whether any consumer holds the scope.
    pub fn has_consumers(&self) -> bool {
        !self.consumers.is_empty()
    }

    fn live(&self) -> Option<()> {
        self.lifecycle.is_live().then_some(())
    }

    /// Whether `item` belongs to this scope.
    ///
    /// Id scopes match on id; grid scopes match on both index and
    /// dimensions.
    pub fn is_in_scope(&self, item: &dyn ScopeItem) -> bool {
        match self.key() {
            Some(ScopeKey::Id(id)) => item.id() == Some(id),
            Some(ScopeKey::Grid(key)) => {
                item.grid_index() == Some(key.index)
                    && item.grid_dimensions() == Some(key.dimensions)
            }
            None => false,
        }
    }

    /// Register a consumer. Returns `true` if the count went from zero to
    /// one.
    pub fn add_consumer(&mut self, consumer: ConsumerId) -> bool {
        if !self.lifecycle.is_live() || self.consumers.contains(&consumer) {
            return false;
        }
        self.consumers.push(consumer);
        self.consumers.len() == 1
    }

    /// Unregister a consumer. Returns `true` if the count dropped to zero.
    pub fn remove_consumer(&mut self, consumer: ConsumerId) -> bool {
        let Some(pos) = self.consumers.iter().position(|c| *c == consumer) else {
            return false;
        };
        self.consumers.remove(pos);
        self.consumers.is_empty()
    }

    /// Positional fetch parameters for this scope.
    pub fn url_params(&self, scheme: UrlScheme) -> Option<UrlParams> {
        self.key().map(|key| url_params(key, scheme))
    }

    /// Begin a load unless one is already running.
    ///
    /// With `reload` a running operation is interrupted and replaced.
    /// Returns the request to dispatch, or `None` if nothing was started.
    pub fn start_load(
        &mut self,
        reload: bool,
        operation: OperationId,
        scheme: UrlScheme,
    ) -> Option<LoadRequest> {
        if !self.lifecycle.is_live() {
            return None;
        }
        if self.state == ScopeState::Loading && !reload {
            return None;
        }
        let key = self.key.as_ref()?;
        let params = url_params(key, scheme);
        let label = key.to_string();

        if let Some(mut previous) = self.operation.take() {
            if !previous.is_terminal() {
                tracing::debug!(
                    scope = %label,
                    previous = previous.id(),
                    next = operation,
                    "Superseding in-flight load"
                );
            }
            previous.dispose();
        }

        self.operation = Some(LoadOperation::new(operation, label));
        self.state = ScopeState::Loading;
        Some(LoadRequest {
            operation,
            params,
            guard: self.lifecycle.guard(),
        })
    }

    /// Apply the terminal outcome of the current operation.
    ///
    /// Outcomes of superseded operations are ignored. Returns the new state
    /// when the outcome was applied.
    pub fn apply_outcome(&mut self, outcome: LoadOutcome<P>) -> Option<ScopeState> {
        if !self.lifecycle.is_live() {
            return None;
        }
        let current = self.operation.as_ref()?;
        if current.id() != outcome.operation || !current.is_terminal() {
            return None;
        }
        self.operation = None;

        self.state = match outcome.state {
            LoadingState::Loaded => {
                self.payload = outcome.payload;
                self.error = None;
                ScopeState::Loaded
            }
            LoadingState::Failed => {
                // Consumers keep whatever they had before.
                self.error = outcome.error;
                ScopeState::Failed
            }
            LoadingState::Interrupted => ScopeState::Interrupted,
            LoadingState::None | LoadingState::Interval | LoadingState::Loading => {
                return None;
            }
        };
        Some(self.state)
    }

    /// Seed values for a consumer created before the payload arrives.
    ///
    /// Grid scopes yield `index`, `dimensions`, `geoCoordinate` (tile
    /// center on the surface) and `colliderEnabled`, which is true when the
    /// zoom lies inside `collider_zoom_range`. Id scopes yield `id`.
    /// Returns `None` once disposed.
    pub fn fallback_values_payload(&self, collider_zoom_range: Option<(u32, u32)>) -> Option<Value> {
        let value = match self.key()? {
            ScopeKey::Id(id) => json!({ "id": id }),
            ScopeKey::Grid(key) => {
                let (lat, lon) = tile_center_lat_lon(key.index, key.dimensions);
                let zoom = key.zoom();
                let collider_enabled =
                    collider_zoom_range.is_some_and(|(min, max)| (min..=max).contains(&zoom));
                json!({
                    "index": [key.index.x, key.index.y],
                    "dimensions": [key.dimensions.x, key.dimensions.y],
                    "geoCoordinate": GeoCoordinate::surface(lat, lon),
                    "colliderEnabled": collider_enabled,
                })
            }
        };
        Some(value)
    }

    /// Tear the scope down. A pending operation is interrupted.
    ///
    /// Idempotent; returns `true` on the first call.
    pub fn dispose(&mut self) -> bool {
        if !self.lifecycle.begin_dispose() {
            return false;
        }
        if let Some(mut operation) = self.operation.take() {
            operation.dispose();
            if self.state == ScopeState::Loading {
                self.state = ScopeState::Interrupted;
            }
        }
        self.consumers.clear();
        self.lifecycle.finish_dispose();
        true
    }
}

impl<P> Recycle for LoadScope<P> {
    fn recycle(&mut self) {
        self.dispose();
        self.key = None;
        self.loader = None;
        self.state = ScopeState::Empty;
        self.consumers.clear();
        self.operation = None;
        self.payload = None;
        self.error = None;
        self.lifecycle.recycle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::operation::LoadResult;
    use glam::IVec2;
    use std::sync::Mutex;

    fn grid_scope() -> LoadScope<String> {
        let mut scope = LoadScope::default();
        let key = GridKey::new(IVec2::new(3, 2), IVec2::new(8, 8));
        assert!(scope.init(key.into(), LoaderId(1)));
        scope
    }

    struct Tile {
        index: IVec2,
        dimensions: IVec2,
    }

    impl ScopeItem for Tile {
        fn grid_index(&self) -> Option<IVec2> {
            Some(self.index)
        }
        fn grid_dimensions(&self) -> Option<IVec2> {
            Some(self.dimensions)
        }
    }

    struct Poi(SerializableId);

    impl ScopeItem for Poi {
        fn id(&self) -> Option<&SerializableId> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_grid_is_in_scope_requires_index_and_dimensions() {
        let scope = grid_scope();
        let same = Tile {
            index: IVec2::new(3, 2),
            dimensions: IVec2::new(8, 8),
        };
        let other_zoom = Tile {
            index: IVec2::new(3, 2),
            dimensions: IVec2::new(16, 16),
        };
        assert!(scope.is_in_scope(&same));
        assert!(!scope.is_in_scope(&other_zoom));
        assert!(!scope.is_in_scope(&Poi(SerializableId::from("3/2"))));
    }

    #[test]
    fn test_id_is_in_scope() {
        let mut scope = LoadScope::<String>::default();
        scope.init(SerializableId::from("a").into(), LoaderId(1));
        assert!(scope.is_in_scope(&Poi(SerializableId::from("a"))));
        assert!(!scope.is_in_scope(&Poi(SerializableId::from("b"))));
    }

    #[test]
    fn test_consumer_transitions() {
        let mut scope = grid_scope();
        assert!(scope.add_consumer(ConsumerId(1)));
        assert!(!scope.add_consumer(ConsumerId(2)));
        assert!(!scope.add_consumer(ConsumerId(2)), "duplicate ignored");
        assert_eq!(scope.consumers(), &[ConsumerId(1), ConsumerId(2)]);
        assert!(!scope.remove_consumer(ConsumerId(1)));
        assert!(!scope.remove_consumer(ConsumerId(9)));
        assert!(scope.remove_consumer(ConsumerId(2)));
    }

    #[test]
    fn test_start_load_only_once_without_reload() {
        let mut scope = grid_scope();
        let request = scope.start_load(false, 1, UrlScheme::ZoomXY).unwrap();
        assert_eq!(request.params.as_slice(), &["3", "3", "2"]);
        assert_eq!(scope.state(), ScopeState::Loading);
        assert!(scope.start_load(false, 2, UrlScheme::ZoomXY).is_none());
        assert_eq!(scope.operation().map(LoadOperation::id), Some(1));
    }

    #[test]
    fn test_reload_interrupts_previous_operation() {
        let mut scope = grid_scope();
        scope.start_load(false, 1, UrlScheme::ZoomXY);
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        scope
            .operation_mut()
            .unwrap()
            .execute(Box::new(move |o: LoadOutcome<String>| sink.lock().unwrap().push(o.state)))
            .unwrap();

        let request = scope.start_load(true, 2, UrlScheme::ZoomXY).unwrap();
        assert_eq!(request.operation, 2);
        assert_eq!(*fired.lock().unwrap(), vec![LoadingState::Interrupted]);
        assert_eq!(scope.operation().map(LoadOperation::id), Some(2));
    }

    #[test]
    fn test_apply_outcome_ignores_stale_operation() {
        let mut scope = grid_scope();
        scope.start_load(false, 1, UrlScheme::ZoomXY);
        let stale = LoadOutcome {
            operation: 7,
            state: LoadingState::Loaded,
            success: true,
            payload: Some(Arc::new("late".to_string())),
            error: None,
        };
        assert_eq!(scope.apply_outcome(stale), None);
        assert!(scope.payload().is_none());
    }

    fn settle(scope: &mut LoadScope<String>, result: LoadResult<String>) -> Option<ScopeState> {
        let captured = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&captured);
        let operation = scope.operation_mut().unwrap();
        operation
            .execute(Box::new(move |o| *sink.lock().unwrap() = Some(o)))
            .unwrap();
        operation.complete(result);
        let outcome = captured.lock().unwrap().take().unwrap();
        scope.apply_outcome(outcome)
    }

    #[test]
    fn test_failed_load_keeps_previous_payload() {
        let mut scope = grid_scope();
        scope.start_load(false, 1, UrlScheme::ZoomXY);
        let state = settle(&mut scope, LoadResult::loaded(Arc::new("v1".to_string())));
        assert_eq!(state, Some(ScopeState::Loaded));

        scope.start_load(true, 2, UrlScheme::ZoomXY);
        let state = settle(&mut scope, LoadResult::failed(FetchError::NotFound.into()));
        assert_eq!(state, Some(ScopeState::Failed));
        assert_eq!(scope.payload().as_deref(), Some(&"v1".to_string()));
        assert_eq!(scope.error(), Some(&LoadError::Fetch(FetchError::NotFound)));
        assert!(scope.operation().is_none());
    }

    #[test]
    fn test_fallback_values_payload() {
        let scope = grid_scope();
        let seed = scope.fallback_values_payload(Some((3, 5))).unwrap();
        assert_eq!(seed["index"], json!([3, 2]));
        assert_eq!(seed["dimensions"], json!([8, 8]));
        assert_eq!(seed["colliderEnabled"], json!(true));
        assert!(seed["geoCoordinate"]["lat"].is_f64());
        assert_eq!(seed["geoCoordinate"]["alt"], json!(0.0));

        let seed = scope.fallback_values_payload(Some((10, 12))).unwrap();
        assert_eq!(seed["colliderEnabled"], json!(false));
        let seed = scope.fallback_values_payload(None).unwrap();
        assert_eq!(seed["colliderEnabled"], json!(false));

        let mut id_scope = LoadScope::<String>::default();
        id_scope.init(SerializableId::from("poi").into(), LoaderId(1));
        assert_eq!(id_scope.fallback_values_payload(None), Some(json!({ "id": "poi" })));
    }

    #[test]
    fn test_disposed_accessors_return_none() {
        let mut scope = grid_scope();
        scope.add_consumer(ConsumerId(1));
        scope.start_load(false, 1, UrlScheme::ZoomXY);
        assert!(scope.dispose());
        assert!(!scope.dispose());
        assert_eq!(scope.key(), None);
        assert_eq!(scope.loader(), None);
        assert!(scope.operation().is_none());
        assert!(scope.fallback_values_payload(None).is_none());
        assert!(scope.url_params(UrlScheme::ZoomXY).is_none());
        assert_eq!(scope.state(), ScopeState::Interrupted);
        assert!(!scope.add_consumer(ConsumerId(2)));
        assert!(scope.start_load(true, 2, UrlScheme::ZoomXY).is_none());
    }

    #[test]
    fn test_recycle_matches_fresh_scope() {
        let mut scope = grid_scope();
        scope.add_consumer(ConsumerId(4));
        scope.start_load(false, 1, UrlScheme::ZoomXY);
        settle(&mut scope, LoadResult::loaded(Arc::new("data".to_string())));
        let old_generation = scope.lifecycle.generation();

        scope.recycle();
        assert_eq!(scope.lifecycle_state(), LifecycleState::Pooled);
        let key = ScopeKey::from(SerializableId::from("fresh"));
        assert!(scope.init(key.clone(), LoaderId(2)));

        let mut fresh = LoadScope::<String>::default();
        fresh.init(key, LoaderId(2));

        assert_eq!(scope.key(), fresh.key());
        assert_eq!(scope.loader(), fresh.loader());
        assert_eq!(scope.state(), fresh.state());
        assert_eq!(scope.consumers(), fresh.consumers());
        assert_eq!(scope.payload(), fresh.payload());
        assert_eq!(scope.error(), fresh.error());
        assert!(scope.operation().is_none());
        assert_eq!(scope.lifecycle_state(), fresh.lifecycle_state());
        assert_ne!(scope.lifecycle.generation(), old_generation);
    }

    #[test]
    fn test_request_guard_goes_stale_after_recycle() {
        let mut scope = grid_scope();
        let request = scope.start_load(false, 1, UrlScheme::ZoomXY).unwrap();
        assert!(scope.is_current(request.guard));

        scope.recycle();
        let key = GridKey::new(IVec2::new(3, 2), IVec2::new(8, 8));
        assert!(scope.init(key.into(), LoaderId(1)));
        assert!(!scope.is_current(request.guard));

        let fresh = scope.start_load(false, 1, UrlScheme::ZoomXY).unwrap();
        assert!(scope.is_current(fresh.guard));
    }
}
