//! Loader driven by camera grids.

use std::collections::HashSet;

use super::{LoadContext, Loader, LoaderCore};
use crate::fetch::PayloadDecoder;
use crate::grid::CameraGrid2D;
use crate::scope::{GridKey, ScopeKey, ScopeState};

/// Outcome of one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Tiles in the new desired set.
    pub desired: usize,
    /// Scopes created.
    pub created: usize,
    /// Scopes released.
    pub released: usize,
    /// Failed or interrupted scopes restarted.
    pub reloaded: usize,
}

/// Loads one scope per tile covered by the enabled grids of a set of
/// camera grids.
#[derive(Debug)]
pub struct GridIndexLoader<D: PayloadDecoder> {
    core: LoaderCore<D>,
    desired: HashSet<GridKey>,
    /// Desired keys, nearest cascade first.
    ordered: Vec<GridKey>,
}

impl<D: PayloadDecoder> GridIndexLoader<D> {
    /// Create a loader with an empty desired set.
    pub fn new(name: impl Into<String>, context: LoadContext, decoder: D) -> Self {
        Self {
            core: LoaderCore::new(name, context, decoder),
            desired: HashSet::new(),
            ordered: Vec::new(),
        }
    }

    /// Desired tiles, highest-detail cascade first.
    pub fn desired_keys(&self) -> &[GridKey] {
        &self.ordered
    }

    /// Whether a tile is in the desired set.
    pub fn is_tile_desired(&self, key: &GridKey) -> bool {
        self.desired.contains(key)
    }

    /// Recompute the desired set from the enabled cells of `grids`.
    ///
    /// Scopes that left the set are released unless a consumer holds them.
    /// New tiles get scopes, created in cascade order so the most detailed
    /// tiles dispatch first. Failed or interrupted scopes that stay desired
    /// are reloaded.
    pub fn on_grid_changed(&mut self, grids: &[&CameraGrid2D]) -> ReconcileSummary {
        if !self.core.is_live() {
            return ReconcileSummary::default();
        }

        let mut ranked: Vec<(u32, GridKey)> = grids
            .iter()
            .flat_map(|camera| camera.grids())
            .filter(|grid| grid.is_enabled())
            .flat_map(|grid| {
                let rank = grid.cascade().unwrap_or(u32::MAX);
                grid.keys().map(move |key| (rank, key))
            })
            .collect();
        ranked.sort_by_key(|(rank, _)| *rank);

        let mut desired = HashSet::with_capacity(ranked.len());
        let ordered: Vec<GridKey> = ranked
            .into_iter()
            .filter_map(|(_, key)| desired.insert(key).then_some(key))
            .collect();
        self.desired = desired;

        let mut summary = ReconcileSummary {
            desired: ordered.len(),
            released: self.collect_unreferenced(),
            ..Default::default()
        };

        for key in &ordered {
            let scope_key = ScopeKey::Grid(*key);
            match self.core.find_scope(&scope_key) {
                None => {
                    if self
                        .core
                        .get_or_create_scope(scope_key, false, true)
                        .is_some()
                    {
                        summary.created += 1;
                    }
                }
                Some(handle) => {
                    let retry = matches!(
                        self.core.scope_state(handle),
                        Some(ScopeState::Failed | ScopeState::Interrupted)
                    );
                    if retry && self.core.start_load(handle, true) {
                        summary.reloaded += 1;
                    }
                }
            }
        }
        self.ordered = ordered;

        tracing::debug!(
            loader = %self.core.id(),
            desired = summary.desired,
            created = summary.created,
            released = summary.released,
            reloaded = summary.reloaded,
            "Grid reconciled"
        );
        summary
    }
}

impl<D: PayloadDecoder> Loader for GridIndexLoader<D> {
    type Decoder = D;

    fn core(&self) -> &LoaderCore<D> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LoaderCore<D> {
        &mut self.core
    }

    fn is_desired(&self, key: &ScopeKey) -> bool {
        key.as_grid().is_some_and(|key| self.desired.contains(key))
    }
}
