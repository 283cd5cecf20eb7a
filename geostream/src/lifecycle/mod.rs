//! Disposal and pooling primitive shared by scopes and operations.
//!
//! Every pooled entity embeds a [`Lifecycle`]:
//!
//! ```text
//! Instantiated ──initialize──► Initialized ──dispose──► Disposing ──► Disposed
//!       ▲                                                               │
//!       └──────────── initialize ◄── Pooled ◄──────── recycle ──────────┘
//! ```
//!
//! Asynchronous continuations capture a [`GenerationGuard`] and re-check it
//! with [`Lifecycle::is_current`] before touching the entity. Recycling bumps
//! the generation, so a guard taken before disposal never matches again.

mod pool;

pub use pool::{Pool, PoolStats, Recycle, DEFAULT_POOL_CAPACITY};

use std::fmt;

/// Lifecycle state of a disposable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// Constructed, not yet initialized.
    #[default]
    Instantiated,
    /// Active.
    Initialized,
    /// Teardown in progress.
    Disposing,
    /// Torn down; accessors return `None`.
    Disposed,
    /// Disposed and reset, waiting in a free list for reuse.
    Pooled,
}

impl LifecycleState {
    /// Whether the entity may be read or mutated.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Instantiated | Self::Initialized)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Instantiated => "instantiated",
            Self::Initialized => "initialized",
            Self::Disposing => "disposing",
            Self::Disposed => "disposed",
            Self::Pooled => "pooled",
        };
        f.write_str(s)
    }
}

/// Identity token captured by asynchronous continuations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationGuard {
    generation: u64,
}

impl GenerationGuard {
    /// Generation this guard was taken at.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Lifecycle state plus generation counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lifecycle {
    state: LifecycleState,
    generation: u64,
}

impl Lifecycle {
    /// A fresh lifecycle in the `Instantiated` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Current generation; bumped on every recycle.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the entity may be read or mutated.
    pub fn is_live(&self) -> bool {
        self.state.is_live()
    }

    /// Whether the entity has been disposed (or pooled).
    pub fn is_disposed(&self) -> bool {
        !self.is_live()
    }

    /// Move `Instantiated` or `Pooled` to `Initialized`.
    ///
    /// Returns `false` (and changes nothing) from any other state.
    pub fn initialize(&mut self) -> bool {
        match self.state {
            LifecycleState::Instantiated | LifecycleState::Pooled => {
                self.state = LifecycleState::Initialized;
                true
            }
            _ => false,
        }
    }

    /// Dispose, running `teardown` while the state reads `Disposing`.
    ///
    /// Idempotent: only the first call on a live entity runs `teardown` and
    /// returns `true`.
    pub fn dispose_with<F: FnOnce()>(&mut self, teardown: F) -> bool {
        if !self.is_live() {
            return false;
        }
        self.state = LifecycleState::Disposing;
        teardown();
        self.state = LifecycleState::Disposed;
        true
    }

    /// Dispose with no extra teardown. See [`Lifecycle::dispose_with`].
    pub fn dispose(&mut self) -> bool {
        self.dispose_with(|| {})
    }

    /// Enter the `Disposing` state. Pair with [`Lifecycle::finish_dispose`]
    /// when teardown needs `&mut` access to the owner.
    ///
    /// Returns `false` if the entity was not live.
    pub fn begin_dispose(&mut self) -> bool {
        if !self.is_live() {
            return false;
        }
        self.state = LifecycleState::Disposing;
        true
    }

    /// Complete a disposal started with [`Lifecycle::begin_dispose`].
    pub fn finish_dispose(&mut self) {
        if self.state == LifecycleState::Disposing {
            self.state = LifecycleState::Disposed;
        }
    }

    /// Move to `Pooled` and invalidate every outstanding guard.
    pub fn recycle(&mut self) {
        self.state = LifecycleState::Pooled;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Capture an identity token for a continuation.
    pub fn guard(&self) -> GenerationGuard {
        GenerationGuard {
            generation: self.generation,
        }
    }

    /// Whether a continuation holding `guard` may still mutate the entity.
    pub fn is_current(&self, guard: GenerationGuard) -> bool {
        self.is_live() && self.generation == guard.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_lifecycle_is_instantiated() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Instantiated);
        assert!(lifecycle.is_live());
        assert_eq!(lifecycle.generation(), 0);
    }

    #[test]
    fn test_initialize_transitions() {
        let mut lifecycle = Lifecycle::new();
        assert!(lifecycle.initialize());
        assert_eq!(lifecycle.state(), LifecycleState::Initialized);
        assert!(!lifecycle.initialize(), "already initialized");
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.initialize();
        let mut teardowns = 0;
        assert!(lifecycle.dispose_with(|| teardowns += 1));
        assert!(!lifecycle.dispose_with(|| teardowns += 1));
        assert!(!lifecycle.dispose());
        assert_eq!(teardowns, 1);
        assert_eq!(lifecycle.state(), LifecycleState::Disposed);
    }

    #[test]
    fn test_begin_finish_dispose() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.initialize();
        assert!(lifecycle.begin_dispose());
        assert_eq!(lifecycle.state(), LifecycleState::Disposing);
        assert!(!lifecycle.begin_dispose());
        lifecycle.finish_dispose();
        assert_eq!(lifecycle.state(), LifecycleState::Disposed);
    }

    #[test]
    fn test_guard_goes_stale_on_dispose() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.initialize();
        let guard = lifecycle.guard();
        assert!(lifecycle.is_current(guard));
        lifecycle.dispose();
        assert!(!lifecycle.is_current(guard));
    }

    #[test]
    fn test_guard_stays_stale_after_reuse() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.initialize();
        let guard = lifecycle.guard();
        lifecycle.dispose();
        lifecycle.recycle();
        assert_eq!(lifecycle.state(), LifecycleState::Pooled);
        assert!(lifecycle.initialize());
        assert!(!lifecycle.is_current(guard));
        assert!(lifecycle.is_current(lifecycle.guard()));
    }

    #[test]
    fn test_disposed_cannot_initialize() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.dispose();
        assert!(!lifecycle.initialize());
    }
}
