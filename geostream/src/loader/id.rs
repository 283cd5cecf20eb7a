//! Loader driven by an explicit id list.

use super::{LoadContext, Loader, LoaderCore, ScopeHandle};
use crate::fetch::PayloadDecoder;
use crate::scope::{ScopeKey, SerializableId};

/// Loads scopes for an ordered list of ids.
///
/// An id in the list keeps its scope alive even without consumers; a
/// consumer reference keeps it alive after the id is removed.
#[derive(Debug)]
pub struct IdLoader<D: PayloadDecoder> {
    core: LoaderCore<D>,
    ids: Vec<SerializableId>,
}

impl<D: PayloadDecoder> IdLoader<D> {
    /// Create an empty loader.
    pub fn new(name: impl Into<String>, context: LoadContext, decoder: D) -> Self {
        Self {
            core: LoaderCore::new(name, context, decoder),
            ids: Vec::new(),
        }
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> &[SerializableId] {
        &self.ids
    }

    /// Append an id and make sure its scope exists.
    ///
    /// Adding an id twice keeps a single entry.
    pub fn add_id(&mut self, id: impl Into<SerializableId>) -> Option<ScopeHandle> {
        if !self.core.is_live() {
            return None;
        }
        let id = id.into();
        if !self.ids.contains(&id) {
            self.ids.push(id.clone());
        }
        self.core
            .get_or_create_scope(ScopeKey::Id(id), false, true)
    }

    /// Remove an id. Its scope is released unless a consumer still holds it.
    ///
    /// Returns `false` if the id was not in the list.
    pub fn remove_id(&mut self, id: &SerializableId) -> bool {
        let Some(pos) = self.ids.iter().position(|i| i == id) else {
            return false;
        };
        self.ids.remove(pos);

        if let Some(handle) = self.core.find_scope(&ScopeKey::Id(id.clone())) {
            let held = self
                .core
                .scope(handle)
                .is_some_and(|scope| scope.has_consumers());
            if held {
                tracing::debug!(loader = %self.core.id(), id = %id, "Id removed; scope kept by consumers");
            } else {
                self.core.release_scope(handle);
            }
        }
        true
    }

    /// Replace the whole id list, keeping the new order.
    pub fn set_ids<I>(&mut self, ids: I)
    where
        I: IntoIterator,
        I::Item: Into<SerializableId>,
    {
        let next: Vec<SerializableId> = ids.into_iter().map(Into::into).collect();
        let removed: Vec<SerializableId> = self
            .ids
            .iter()
            .filter(|id| !next.contains(id))
            .cloned()
            .collect();
        for id in &removed {
            self.remove_id(id);
        }
        for id in next {
            self.add_id(id);
        }
    }
}

impl<D: PayloadDecoder> Loader for IdLoader<D> {
    type Decoder = D;

    fn core(&self) -> &LoaderCore<D> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LoaderCore<D> {
        &mut self.core
    }

    fn is_desired(&self, key: &ScopeKey) -> bool {
        key.as_id().is_some_and(|id| self.ids.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::{RawDecoder, StaticFetchService};
    use crate::loader::{LoaderConfig, LoaderEvent};
    use crate::scope::{ConsumerId, ScopeState};
    use bytes::Bytes;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    fn loader(service: Arc<StaticFetchService>) -> IdLoader<RawDecoder> {
        let context = LoadContext::current(service, LoaderConfig::default());
        IdLoader::new("pois", context, RawDecoder)
    }

    async fn settle<L: Loader>(loader: &mut L) {
        for _ in 0..100 {
            loader.dispatch_pending(Instant::now());
            tokio::task::yield_now().await;
            loader.apply_completions();
            let stats = loader.stats();
            if stats.in_flight == 0 && stats.pending == 0 {
                break;
            }
        }
    }

    fn id(s: &str) -> SerializableId {
        SerializableId::from(s)
    }

    #[tokio::test]
    async fn test_add_id_loads_payload() {
        let service = Arc::new(StaticFetchService::new());
        service.insert("a", "alpha");
        let mut loader = loader(Arc::clone(&service));

        let handle = loader.add_id("a").unwrap();
        assert_eq!(loader.scope(handle).unwrap().state(), ScopeState::Loading);
        settle(&mut loader).await;

        let scope = loader.scope(handle).unwrap();
        assert_eq!(scope.state(), ScopeState::Loaded);
        assert_eq!(scope.payload().as_deref(), Some(&Bytes::from_static(b"alpha")));
        assert_eq!(service.request_count("a"), 1);
    }

    #[tokio::test]
    async fn test_add_id_twice_keeps_single_entry() {
        let mut loader = loader(Arc::new(StaticFetchService::new()));
        let first = loader.add_id("a");
        let second = loader.add_id("a");
        assert_eq!(first, second);
        assert_eq!(loader.ids(), &[id("a")]);
        assert_eq!(loader.stats().scopes, 1);
    }

    #[tokio::test]
    async fn test_remove_unreferenced_id_releases_scope() {
        let mut loader = loader(Arc::new(StaticFetchService::new()));
        let handle = loader.add_id("a").unwrap();
        assert!(loader.remove_id(&id("a")));
        assert!(loader.scope(handle).is_none());
        assert!(!loader.remove_id(&id("a")));
        assert_eq!(loader.stats().released, 1);
    }

    #[tokio::test]
    async fn test_remove_id_while_referenced() {
        let mut loader = loader(Arc::new(StaticFetchService::new()));
        let a = loader.add_id("A").unwrap();
        loader.add_id("B").unwrap();
        loader.add_reference(a, ConsumerId(1)).unwrap();

        loader.remove_id(&id("A"));
        assert!(loader.scope(a).is_some(), "consumer keeps A alive");
        assert_eq!(loader.ids(), &[id("B")]);

        assert_eq!(loader.remove_reference(a, ConsumerId(1)), Ok(true));
        assert!(loader.scope(a).is_none());
        assert!(loader.find_scope(&ScopeKey::Id(id("A"))).is_none());
    }

    #[tokio::test]
    async fn test_listed_id_survives_last_consumer() {
        let mut loader = loader(Arc::new(StaticFetchService::new()));
        let a = loader.add_id("A").unwrap();
        loader.add_reference(a, ConsumerId(1)).unwrap();
        loader.remove_reference(a, ConsumerId(1)).unwrap();
        assert!(loader.scope(a).is_some());
    }

    #[tokio::test]
    async fn test_failed_load_waits_for_explicit_reload() {
        let service = Arc::new(StaticFetchService::new());
        service.insert_error("a", FetchError::Http { status: 500 });
        let mut loader = loader(Arc::clone(&service));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        loader.subscribe(Box::new(move |e: &LoaderEvent| sink.lock().unwrap().push(e.clone())));

        let handle = loader.add_id("a").unwrap();
        settle(&mut loader).await;
        assert_eq!(loader.scope(handle).unwrap().state(), ScopeState::Failed);

        // No silent retry.
        settle(&mut loader).await;
        assert_eq!(service.request_count("a"), 1);

        service.insert("a", "recovered");
        loader.get_or_create_scope(ScopeKey::Id(id("a")), true, false);
        settle(&mut loader).await;
        assert_eq!(loader.scope(handle).unwrap().state(), ScopeState::Loaded);

        let events = events.lock().unwrap();
        assert!(matches!(events[0], LoaderEvent::ScopeCreated { .. }));
        assert!(matches!(events[1], LoaderEvent::ScopeFailed { .. }));
        assert!(matches!(events[2], LoaderEvent::ScopeLoaded { .. }));
    }

    #[tokio::test]
    async fn test_set_ids_reconciles() {
        let mut loader = loader(Arc::new(StaticFetchService::new()));
        loader.set_ids(["a", "b", "c"]);
        loader.set_ids(["c", "d"]);
        assert_eq!(loader.ids(), &[id("c"), id("d")]);
        assert_eq!(loader.stats().scopes, 2);
        assert!(loader.find_scope(&ScopeKey::Id(id("a"))).is_none());
    }

    #[tokio::test]
    async fn test_dispose_unsubscribes_before_teardown() {
        let mut loader = loader(Arc::new(StaticFetchService::new()));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        loader.add_id("a");
        loader.subscribe(Box::new(move |e: &LoaderEvent| sink.lock().unwrap().push(e.clone())));

        assert!(loader.dispose());
        assert!(!loader.dispose());
        assert!(events.lock().unwrap().is_empty());
        assert!(loader.add_id("b").is_none());
        assert_eq!(loader.stats().scopes, 0);
    }
}
