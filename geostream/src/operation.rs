//! Per-request load state machine.
//!
//! ```text
//! None ──delay──► Interval ──execute──► Loading ──complete──► Loaded
//!   │                                      │                  Failed
//!   └──────────────execute────────────────►┘                  Interrupted
//! ```
//!
//! An operation wraps one fetch-and-parse attempt. The single result callback
//! is taken out of the operation before it runs, so it fires at most once
//! even if `complete` and `dispose` race on the owning tick.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::error::{LoadError, UsageError};
use crate::lifecycle::Lifecycle;

/// Identifier of an operation, unique within its loader.
pub type OperationId = u64;

/// Loading state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadingState {
    /// Created, not started.
    #[default]
    None,
    /// Waiting for a dispatch delay to elapse.
    Interval,
    /// Fetch in flight.
    Loading,
    /// Payload available.
    Loaded,
    /// Fetch or parse failed.
    Failed,
    /// Superseded or torn down before finishing.
    Interrupted,
}

impl LoadingState {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Loaded | Self::Failed | Self::Interrupted)
    }
}

impl fmt::Display for LoadingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Interval => "interval",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// Raw result handed to [`LoadOperation::complete`].
#[derive(Debug)]
pub struct LoadResult<P> {
    /// Decoded payload, if any.
    pub payload: Option<Arc<P>>,
    /// Failure, if any. Takes precedence over `interrupted`.
    pub error: Option<LoadError>,
    /// Whether the attempt was cut short.
    pub interrupted: bool,
}

impl<P> LoadResult<P> {
    /// A successful result.
    pub fn loaded(payload: Arc<P>) -> Self {
        Self {
            payload: Some(payload),
            error: None,
            interrupted: false,
        }
    }

    /// A failed result.
    pub fn failed(error: LoadError) -> Self {
        Self {
            payload: None,
            error: Some(error),
            interrupted: false,
        }
    }

    /// An interrupted result.
    pub fn interrupted() -> Self {
        Self {
            payload: None,
            error: None,
            interrupted: true,
        }
    }
}

impl<P> From<Result<Arc<P>, LoadError>> for LoadResult<P> {
    fn from(result: Result<Arc<P>, LoadError>) -> Self {
        match result {
            Ok(payload) => Self::loaded(payload),
            Err(LoadError::Interrupted) => Self::interrupted(),
            Err(e) => Self::failed(e),
        }
    }
}

/// What the result callback receives.
#[derive(Debug)]
pub struct LoadOutcome<P> {
    /// Operation that produced this outcome.
    pub operation: OperationId,
    /// Terminal state reached.
    pub state: LoadingState,
    /// `state == Loaded`.
    pub success: bool,
    /// Shared payload on success.
    pub payload: Option<Arc<P>>,
    /// Failure on `Failed`.
    pub error: Option<LoadError>,
}

impl<P> LoadOutcome<P> {
    /// Whether the operation ended interrupted.
    pub fn is_interrupted(&self) -> bool {
        self.state == LoadingState::Interrupted
    }
}

/// Single-shot result callback.
pub type LoadCallback<P> = Box<dyn FnOnce(LoadOutcome<P>) + Send>;

/// One fetch-and-parse attempt.
pub struct LoadOperation<P> {
    id: OperationId,
    label: String,
    lifecycle: Lifecycle,
    state: LoadingState,
    not_before: Option<Instant>,
    callback: Option<LoadCallback<P>>,
    cancel: CancellationToken,
}

impl<P> fmt::Debug for LoadOperation<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOperation")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("state", &self.state)
            .field("not_before", &self.not_before)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl<P> LoadOperation<P> {
    /// Create an operation in the `None` state.
    ///
    /// `label` identifies the scope in log output.
    pub fn new(id: OperationId, label: impl Into<String>) -> Self {
        let mut lifecycle = Lifecycle::new();
        lifecycle.initialize();
        Self {
            id,
            label: label.into(),
            lifecycle,
            state: LoadingState::None,
            not_before: None,
            callback: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Operation identifier.
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> LoadingState {
        self.state
    }

    /// Whether the operation reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Earliest dispatch time set by [`LoadOperation::delay`].
    pub fn not_before(&self) -> Option<Instant> {
        self.not_before
    }

    /// Token cancelled when the operation is disposed.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Hold the operation in `Interval` until `until`.
    ///
    /// Only valid before `execute`; returns `false` otherwise.
    pub fn delay(&mut self, until: Instant) -> bool {
        match self.state {
            LoadingState::None | LoadingState::Interval => {
                self.state = LoadingState::Interval;
                self.not_before = Some(until);
                true
            }
            _ => false,
        }
    }

    /// Whether the operation may be executed at `now`.
    pub fn is_ready(&self, now: Instant) -> bool {
        match self.state {
            LoadingState::None => true,
            LoadingState::Interval => self.not_before.map_or(true, |t| t <= now),
            _ => false,
        }
    }

    /// Store the result callback and enter `Loading`.
    ///
    /// Executing twice is a usage error: the call is rejected, logged and
    /// leaves the operation untouched.
    pub fn execute(&mut self, callback: LoadCallback<P>) -> Result<&mut Self, UsageError> {
        match self.state {
            LoadingState::None | LoadingState::Interval => {
                self.callback = Some(callback);
                self.state = LoadingState::Loading;
                self.not_before = None;
                Ok(self)
            }
            state => {
                tracing::error!(
                    operation = self.id,
                    scope = %self.label,
                    state = %state,
                    "Load operation executed twice"
                );
                Err(UsageError::AlreadyExecuted)
            }
        }
    }

    /// Move to a terminal state and fire the callback.
    ///
    /// An error wins over `interrupted`. Returns `false` if the operation was
    /// already terminal.
    pub fn complete(&mut self, result: LoadResult<P>) -> bool {
        if self.state.is_terminal() {
            return false;
        }

        let state = if result.error.is_some() {
            LoadingState::Failed
        } else if result.interrupted {
            LoadingState::Interrupted
        } else {
            LoadingState::Loaded
        };
        self.state = state;

        match &result.error {
            Some(error) if error.is_benign() => {
                tracing::debug!(operation = self.id, scope = %self.label, error = %error, "Load failed");
            }
            Some(error) => {
                tracing::warn!(operation = self.id, scope = %self.label, error = %error, "Load failed");
            }
            None if state == LoadingState::Interrupted => {
                tracing::debug!(operation = self.id, scope = %self.label, "Load interrupted");
            }
            None => {
                tracing::trace!(operation = self.id, scope = %self.label, "Load complete");
            }
        }

        // Taken before invocation so the callback can never run twice.
        if let Some(callback) = self.callback.take() {
            callback(LoadOutcome {
                operation: self.id,
                state,
                success: state == LoadingState::Loaded,
                payload: if state == LoadingState::Loaded {
                    result.payload
                } else {
                    None
                },
                error: result.error,
            });
        }
        true
    }

    /// Interrupt an unfinished operation and cancel its worker.
    ///
    /// Idempotent. A pending callback fires exactly once with `Interrupted`.
    pub fn dispose(&mut self) -> bool {
        if !self.lifecycle.begin_dispose() {
            return false;
        }
        if !self.state.is_terminal() {
            self.complete(LoadResult::interrupted());
        }
        self.cancel.cancel();
        self.callback = None;
        self.lifecycle.finish_dispose();
        true
    }

    /// Whether `dispose` has run.
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }
}

impl<P> Drop for LoadOperation<P> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, ParseError};
    use std::sync::Mutex;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<LoadOutcome<String>>>>;

    fn recorder() -> (Log, LoadCallback<String>) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let callback: LoadCallback<String> = Box::new(move |outcome| {
            sink.lock().unwrap().push(outcome);
        });
        (log, callback)
    }

    #[test]
    fn test_execute_enters_loading() {
        let mut op = LoadOperation::<String>::new(1, "tile");
        let (_, callback) = recorder();
        op.execute(callback).unwrap();
        assert_eq!(op.state(), LoadingState::Loading);
    }

    #[test]
    fn test_execute_then_dispose_fires_single_interrupted_callback() {
        let mut op = LoadOperation::<String>::new(1, "tile");
        let token = op.cancellation_token();
        let (log, callback) = recorder();
        op.execute(callback).unwrap();

        assert!(op.dispose());
        assert!(!op.dispose());
        drop(op);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].is_interrupted());
        assert!(!log[0].success);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_double_execute_is_rejected() {
        let mut op = LoadOperation::<String>::new(1, "tile");
        let (log, first) = recorder();
        let (other_log, second) = recorder();
        op.execute(first).unwrap();
        let err = op.execute(second).unwrap_err();
        assert_eq!(err, UsageError::AlreadyExecuted);
        assert_eq!(op.state(), LoadingState::Loading);

        op.complete(LoadResult::loaded(Arc::new("payload".to_string())));
        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(other_log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_complete_fires_once() {
        let mut op = LoadOperation::<String>::new(1, "tile");
        let (log, callback) = recorder();
        op.execute(callback).unwrap();
        assert!(op.complete(LoadResult::loaded(Arc::new("a".to_string()))));
        assert!(!op.complete(LoadResult::loaded(Arc::new("b".to_string()))));
        assert!(!op.complete(LoadResult::interrupted()));

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].success);
        assert_eq!(log[0].payload.as_deref(), Some(&"a".to_string()));
    }

    #[test]
    fn test_error_wins_over_interrupted() {
        let mut op = LoadOperation::<String>::new(1, "tile");
        let (log, callback) = recorder();
        op.execute(callback).unwrap();
        op.complete(LoadResult {
            payload: None,
            error: Some(LoadError::Fetch(FetchError::Timeout)),
            interrupted: true,
        });
        assert_eq!(op.state(), LoadingState::Failed);
        let log = log.lock().unwrap();
        assert_eq!(log[0].error, Some(LoadError::Fetch(FetchError::Timeout)));
    }

    #[test]
    fn test_parse_failure() {
        let mut op = LoadOperation::<String>::new(1, "tile");
        let (log, callback) = recorder();
        op.execute(callback).unwrap();
        op.complete(Err::<Arc<String>, _>(LoadError::from(ParseError::new("eof"))).into());
        assert_eq!(op.state(), LoadingState::Failed);
        assert!(log.lock().unwrap()[0].payload.is_none());
    }

    #[test]
    fn test_delay_and_ready() {
        let now = Instant::now();
        let mut op = LoadOperation::<String>::new(1, "tile");
        assert!(op.is_ready(now));
        assert!(op.delay(now + Duration::from_millis(50)));
        assert_eq!(op.state(), LoadingState::Interval);
        assert!(!op.is_ready(now));
        assert!(op.is_ready(now + Duration::from_millis(50)));

        let (_, callback) = recorder();
        op.execute(callback).unwrap();
        assert!(!op.delay(now));
        assert!(!op.is_ready(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_dispose_before_execute_has_no_callback() {
        let mut op = LoadOperation::<String>::new(1, "tile");
        op.dispose();
        assert_eq!(op.state(), LoadingState::Interrupted);
        assert!(op.is_disposed());
        let (log, callback) = recorder();
        assert!(op.execute(callback).is_err());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_drop_interrupts_pending_operation() {
        let (log, callback) = recorder();
        {
            let mut op = LoadOperation::<String>::new(9, "tile");
            op.execute(callback).unwrap();
        }
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].operation, 9);
        assert!(log[0].is_interrupted());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Step {
            Execute,
            Loaded,
            Failed,
            Interrupt,
            Dispose,
        }

        fn step() -> impl Strategy<Value = Step> {
            prop_oneof![
                Just(Step::Execute),
                Just(Step::Loaded),
                Just(Step::Failed),
                Just(Step::Interrupt),
                Just(Step::Dispose),
            ]
        }

        proptest! {
            #[test]
            fn test_callback_fires_at_most_once(steps in prop::collection::vec(step(), 0..12)) {
                let log: Log = Arc::new(Mutex::new(Vec::new()));
                let mut op = LoadOperation::<String>::new(1, "tile");
                let mut executed = false;

                for s in &steps {
                    match s {
                        Step::Execute => {
                            let sink = Arc::clone(&log);
                            let result = op.execute(Box::new(move |o| sink.lock().unwrap().push(o)));
                            executed |= result.is_ok();
                        }
                        Step::Loaded => { op.complete(LoadResult::loaded(Arc::new(String::new()))); }
                        Step::Failed => { op.complete(LoadResult::failed(LoadError::Other("boom".into()))); }
                        Step::Interrupt => { op.complete(LoadResult::interrupted()); }
                        Step::Dispose => { op.dispose(); }
                    }
                }
                op.dispose();

                let fired = log.lock().unwrap().len();
                prop_assert!(fired <= 1);
                prop_assert_eq!(fired, usize::from(executed));
            }
        }
    }
}
