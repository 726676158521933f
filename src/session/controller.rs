//! Session Controller
//!
//! Reconciles the identity service's two asynchronous sources of truth,
//! the one-shot bootstrap fetch and the live change stream, into a single
//! monotonically-resolving answer to "who is signed in, and is that answer
//! final yet".
//!
//! The two sources may resolve in either order, and the stream may speak
//! before the fetch returns. The reconciliation rules:
//! - whichever signal arrives first makes the controller ready
//! - every stream event overwrites the current session
//! - a bootstrap result that lands after the stream has spoken is stale
//!   and is discarded
//! - a failed bootstrap with no stream event degrades to "signed out"
//!   rather than leaving consumers on a loading screen forever
//!
//! Consumers are notified synchronously on the task that applied the
//! transition; the controller is meant to be driven from one logical
//! thread (a UI event loop), and provides no cross-thread ordering beyond
//! the monotonic `ready` flag.

use dashmap::DashMap;
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

use super::state::{ControllerPhase, SessionState};
use crate::api::ApiResult;
use crate::identity::{ChangeSubscription, IdentityService, Session};

/// Consumer callback invoked synchronously on every state transition
pub type StateHandler = Arc<dyn Fn(&SessionState) + Send + Sync>;

/// Owns the process-wide session state and mediates between the identity
/// service and consumers
///
/// One controller per root scope; plain value, no implicit singleton, so
/// many instances can coexist in tests. Disposal happens explicitly via
/// [`SessionController::dispose`] or implicitly on drop.
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    identity: Arc<dyn IdentityService>,
    core: Mutex<ControllerCore>,
    /// Registered consumer callbacks
    consumers: Arc<DashMap<u64, StateHandler>>,
    next_consumer_id: AtomicU64,
}

#[derive(Default)]
struct ControllerCore {
    phase: ControllerPhase,
    session: Option<Session>,
    disposed: bool,
    /// Last snapshot delivered to consumers, kept to suppress no-op
    /// notifications
    last_notified: Option<SessionState>,
    change_subscription: Option<ChangeSubscription>,
    bootstrap: Option<JoinHandle<()>>,
}

impl ControllerCore {
    /// Snapshot for notification, or `None` when nothing effectively changed
    fn state_if_changed(&mut self) -> Option<SessionState> {
        let state = SessionState {
            session: self.session.clone(),
            ready: self.phase.is_ready(),
        };
        if self.last_notified.as_ref() == Some(&state) {
            return None;
        }
        self.last_notified = Some(state.clone());
        Some(state)
    }
}

impl SessionController {
    /// Create a controller for the given identity service
    ///
    /// The controller is inert until [`SessionController::initialize`] runs.
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                identity,
                core: Mutex::new(ControllerCore::default()),
                consumers: Arc::new(DashMap::new()),
                next_consumer_id: AtomicU64::new(1),
            }),
        }
    }

    /// Start reconciliation: open the change-stream subscription and kick
    /// off the bootstrap fetch
    ///
    /// Returns immediately; resolution happens via callbacks. Must be
    /// called from within a Tokio runtime (the bootstrap fetch runs as a
    /// spawned task), and exactly once per instance; a second call is a
    /// caller error that trips a debug assertion and is otherwise ignored.
    pub fn initialize(&self) {
        {
            let mut core = self.inner.core.lock();
            debug_assert!(!core.disposed, "initialize called on a disposed controller");
            debug_assert_eq!(
                core.phase,
                ControllerPhase::Uninitialized,
                "initialize called twice"
            );
            if core.disposed || core.phase != ControllerPhase::Uninitialized {
                error!("Ignoring initialize on a controller that is already {}", core.phase);
                return;
            }
            core.phase = ControllerPhase::AwaitingFirstSignal;
        }

        // Subscribe before fetching: no ordering is assumed between the two
        // sources, but subscribing first means no change event can fall into
        // a gap. Both continuations hold only a weak reference, so a dropped
        // controller cannot be kept alive (or mutated) by late callbacks.
        let weak = Arc::downgrade(&self.inner);
        let subscription = self
            .inner
            .identity
            .subscribe_changes(Arc::new(move |session| {
                if let Some(inner) = weak.upgrade() {
                    inner.apply_stream_event(session);
                }
            }));

        let weak = Arc::downgrade(&self.inner);
        let identity = Arc::clone(&self.inner.identity);
        let bootstrap = tokio::spawn(async move {
            let result = identity.fetch_current_session().await;
            if let Some(inner) = weak.upgrade() {
                inner.apply_bootstrap(result);
            }
        });

        let mut core = self.inner.core.lock();
        if core.disposed {
            // Disposed in the window between the phase flip and here; tear
            // the fresh resources straight down.
            drop(core);
            subscription.unsubscribe();
            bootstrap.abort();
            return;
        }
        core.change_subscription = Some(subscription);
        core.bootstrap = Some(bootstrap);
        debug!("Session controller initialized");
    }

    /// Snapshot of the current `(session, ready)` pair
    pub fn state(&self) -> SessionState {
        let core = self.inner.core.lock();
        SessionState {
            session: core.session.clone(),
            ready: core.phase.is_ready(),
        }
    }

    /// Register a consumer callback for state transitions
    ///
    /// The handler runs synchronously on whichever task applies a
    /// transition, including the `ready` flip. The returned handle
    /// deregisters it; calling `unsubscribe` more than once is a no-op.
    pub fn on_state_change(
        &self,
        handler: impl Fn(&SessionState) + Send + Sync + 'static,
    ) -> StateSubscription {
        let id = self.inner.next_consumer_id.fetch_add(1, Ordering::SeqCst);
        self.inner.consumers.insert(id, Arc::new(handler));
        StateSubscription {
            consumers: Arc::downgrade(&self.inner.consumers),
            id,
        }
    }

    /// Tear down the identity subscription and silence the controller
    ///
    /// Idempotent, and safe to call even if `initialize` never ran. A
    /// bootstrap result or stream event that arrives after disposal is
    /// ignored: no state mutation, no consumer notification.
    pub fn dispose(&self) {
        let (subscription, bootstrap) = {
            let mut core = self.inner.core.lock();
            if core.disposed {
                return;
            }
            core.disposed = true;
            (core.change_subscription.take(), core.bootstrap.take())
        };

        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        if let Some(bootstrap) = bootstrap {
            bootstrap.abort();
        }
        self.inner.consumers.clear();
        debug!("Session controller disposed");
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("SessionController")
            .field("phase", &core.phase)
            .field("signed_in", &core.session.is_some())
            .field("disposed", &core.disposed)
            .finish()
    }
}

impl ControllerInner {
    /// A change event pushed by the identity service
    ///
    /// Unconditionally overwrites the current session; the stream is the
    /// ordered source of truth once it has spoken.
    fn apply_stream_event(&self, session: Option<Session>) {
        let state = {
            let mut core = self.core.lock();
            if core.disposed {
                debug!("Ignoring session change delivered after disposal");
                return;
            }
            core.session = session;
            core.phase = ControllerPhase::Ready;
            core.state_if_changed()
        };
        if let Some(state) = state {
            self.notify(&state);
        }
    }

    /// The bootstrap fetch's resolution
    fn apply_bootstrap(&self, result: ApiResult<Option<Session>>) {
        let state = {
            let mut core = self.core.lock();
            if core.disposed {
                return;
            }
            if core.phase.is_ready() {
                // The stream won the race; the fetch was only ever a
                // bootstrap for the quiet case and its result is stale now.
                debug!("Discarding bootstrap result that arrived after a stream event");
                return;
            }
            match result {
                Ok(session) => core.session = session,
                Err(e) => {
                    // A failed bootstrap means "no session", not a permanent
                    // loading state.
                    warn!("Session bootstrap failed: {}; treating as signed out", e);
                    core.session = None;
                }
            }
            core.phase = ControllerPhase::Ready;
            core.state_if_changed()
        };
        if let Some(state) = state {
            self.notify(&state);
        }
    }

    fn notify(&self, state: &SessionState) {
        // Handlers are cloned out first so one that re-enters the
        // controller (reading state, unsubscribing) cannot deadlock
        // against the registry.
        let handlers: Vec<StateHandler> = self.consumers.iter().map(|e| e.value().clone()).collect();
        for handler in handlers {
            handler(state);
        }
    }
}

/// Handle that deregisters a consumer callback
pub struct StateSubscription {
    consumers: Weak<DashMap<u64, StateHandler>>,
    id: u64,
}

impl StateSubscription {
    /// Deregister the handler; no-op after the first call
    pub fn unsubscribe(&self) {
        if let Some(consumers) = self.consumers.upgrade() {
            consumers.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::identity::{ChangeHandler, Credentials, User};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use uuid::Uuid;

    /// Identity double whose bootstrap resolution and stream emissions are
    /// entirely under test control.
    struct FakeIdentity {
        handlers: Arc<DashMap<u64, ChangeHandler>>,
        next_id: AtomicU64,
        fetch_gate: Mutex<Option<oneshot::Receiver<ApiResult<Option<Session>>>>>,
    }

    impl FakeIdentity {
        /// The returned sender resolves the bootstrap fetch on demand.
        fn gated() -> (Arc<Self>, oneshot::Sender<ApiResult<Option<Session>>>) {
            let _ = env_logger::builder().is_test(true).try_init();
            let (tx, rx) = oneshot::channel();
            let fake = Arc::new(Self {
                handlers: Arc::new(DashMap::new()),
                next_id: AtomicU64::new(1),
                fetch_gate: Mutex::new(Some(rx)),
            });
            (fake, tx)
        }

        /// Push a change event to every live subscriber, synchronously.
        fn emit(&self, session: Option<Session>) {
            let handlers: Vec<ChangeHandler> =
                self.handlers.iter().map(|e| e.value().clone()).collect();
            for handler in handlers {
                handler(session.clone());
            }
        }

        fn subscriber_count(&self) -> usize {
            self.handlers.len()
        }
    }

    #[async_trait]
    impl IdentityService for FakeIdentity {
        async fn fetch_current_session(&self) -> ApiResult<Option<Session>> {
            let gate = self.fetch_gate.lock().take();
            match gate {
                Some(rx) => rx.await.unwrap_or(Ok(None)),
                None => Ok(None),
            }
        }

        fn subscribe_changes(&self, handler: ChangeHandler) -> ChangeSubscription {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.handlers.insert(id, handler);
            let handlers = Arc::clone(&self.handlers);
            ChangeSubscription::new(move || {
                handlers.remove(&id);
            })
        }

        async fn sign_in_with_password(&self, _credentials: &Credentials) -> ApiResult<Session> {
            Err(ApiError::Internal("not wired in fake".to_string()))
        }

        async fn sign_up(&self, _credentials: &Credentials) -> ApiResult<Session> {
            Err(ApiError::Internal("not wired in fake".to_string()))
        }

        async fn sign_out(&self) -> ApiResult<()> {
            Ok(())
        }
    }

    fn session(token: &str) -> Session {
        Session {
            access_token: token.to_string(),
            token_type: "bearer".to_string(),
            refresh_token: None,
            expires_at: None,
            user: User {
                id: Uuid::new_v4(),
                email: Some(format!("{}@example.com", token)),
                user_metadata: serde_json::Value::Null,
                created_at: None,
            },
        }
    }

    /// Counts notifications and records every snapshot delivered.
    struct Recorder {
        count: Arc<AtomicUsize>,
        states: Arc<Mutex<Vec<SessionState>>>,
    }

    impl Recorder {
        fn attach(controller: &SessionController) -> (Self, StateSubscription) {
            let count = Arc::new(AtomicUsize::new(0));
            let states = Arc::new(Mutex::new(Vec::new()));
            let (c, s) = (count.clone(), states.clone());
            let subscription = controller.on_state_change(move |state| {
                c.fetch_add(1, Ordering::SeqCst);
                s.lock().push(state.clone());
            });
            (Self { count, states }, subscription)
        }

        fn notifications(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached within timeout");
    }

    /// Let any already-scheduled continuation run.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    #[tokio::test]
    async fn test_bootstrap_resolves_first() {
        let (identity, fetch) = FakeIdentity::gated();
        let controller = SessionController::new(identity);
        let (recorder, _sub) = Recorder::attach(&controller);

        controller.initialize();
        assert!(!controller.state().ready);

        fetch.send(Ok(Some(session("u1")))).unwrap();
        wait_until(|| controller.state().ready).await;

        let state = controller.state();
        assert_eq!(
            state.session.as_ref().map(|s| s.access_token.as_str()),
            Some("u1")
        );
        assert!(state.is_authenticated());
        assert_eq!(recorder.notifications(), 1);
    }

    #[tokio::test]
    async fn test_stream_event_beats_bootstrap() {
        let (identity, fetch) = FakeIdentity::gated();
        let controller = SessionController::new(Arc::clone(&identity) as Arc<dyn IdentityService>);
        let (recorder, _sub) = Recorder::attach(&controller);

        controller.initialize();

        // The stream speaks first: ready flips at this very moment.
        identity.emit(None);
        assert!(controller.state().ready);
        assert!(controller.state().is_anonymous());
        assert_eq!(recorder.notifications(), 1);

        // The fetch resolves afterwards with a session; it lost the race
        // and must not overwrite the stream's answer.
        fetch.send(Ok(Some(session("u1")))).unwrap();
        settle().await;

        assert!(controller.state().session.is_none());
        assert_eq!(recorder.notifications(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_failure_degrades_to_signed_out() {
        let (identity, fetch) = FakeIdentity::gated();
        let controller = SessionController::new(identity);
        let (recorder, _sub) = Recorder::attach(&controller);

        controller.initialize();
        fetch
            .send(Err(ApiError::ConnectionFailed("refused".to_string())))
            .unwrap();

        wait_until(|| controller.state().ready).await;
        let state = controller.state();
        assert!(state.is_anonymous());
        assert_eq!(recorder.notifications(), 1);
    }

    #[tokio::test]
    async fn test_multiple_stream_events_then_stale_bootstrap() {
        let (identity, fetch) = FakeIdentity::gated();
        let controller = SessionController::new(Arc::clone(&identity) as Arc<dyn IdentityService>);
        let (recorder, _sub) = Recorder::attach(&controller);

        controller.initialize();
        identity.emit(Some(session("u1")));
        identity.emit(Some(session("u2")));
        assert_eq!(recorder.notifications(), 2);

        fetch.send(Ok(Some(session("u3")))).unwrap();
        settle().await;

        let state = controller.state();
        assert_eq!(
            state.session.as_ref().map(|s| s.access_token.as_str()),
            Some("u2")
        );
        assert_eq!(recorder.notifications(), 2);
        let recorded = recorder.states.lock();
        assert_eq!(recorded.len(), 2);
        assert!(recorded.iter().all(|s| s.ready));
    }

    #[tokio::test]
    async fn test_duplicate_stream_event_not_renotified() {
        let (identity, _fetch) = FakeIdentity::gated();
        let controller = SessionController::new(Arc::clone(&identity) as Arc<dyn IdentityService>);
        let (recorder, _sub) = Recorder::attach(&controller);

        controller.initialize();
        identity.emit(None);
        identity.emit(None);

        assert_eq!(recorder.notifications(), 1);
    }

    #[tokio::test]
    async fn test_ready_is_monotonic() {
        let (identity, fetch) = FakeIdentity::gated();
        let controller = SessionController::new(Arc::clone(&identity) as Arc<dyn IdentityService>);

        controller.initialize();
        identity.emit(Some(session("u1")));
        assert!(controller.state().ready);

        // A late failing bootstrap must neither un-ready the controller
        // nor clear the session the stream reported.
        fetch
            .send(Err(ApiError::ConnectionFailed("refused".to_string())))
            .unwrap();
        settle().await;

        let state = controller.state();
        assert!(state.ready);
        assert_eq!(
            state.session.as_ref().map(|s| s.access_token.as_str()),
            Some("u1")
        );
    }

    #[tokio::test]
    async fn test_dispose_silences_late_bootstrap() {
        let (identity, fetch) = FakeIdentity::gated();
        let controller = SessionController::new(Arc::clone(&identity) as Arc<dyn IdentityService>);
        let (recorder, _sub) = Recorder::attach(&controller);

        controller.initialize();
        controller.dispose();

        // The stream subscription is torn down exactly once at disposal.
        assert_eq!(identity.subscriber_count(), 0);

        let _ = fetch.send(Ok(Some(session("u1"))));
        identity.emit(Some(session("u2")));
        settle().await;

        let state = controller.state();
        assert!(!state.ready);
        assert!(state.session.is_none());
        assert_eq!(recorder.notifications(), 0);
    }

    #[tokio::test]
    async fn test_dispose_idempotent_and_safe_before_initialize() {
        let (identity, _fetch) = FakeIdentity::gated();
        let controller = SessionController::new(identity);

        // Never initialized: both calls are no-ops.
        controller.dispose();
        controller.dispose();
        assert!(!controller.state().ready);
    }

    #[tokio::test]
    async fn test_drop_releases_stream_subscription() {
        let (identity, _fetch) = FakeIdentity::gated();
        {
            let controller =
                SessionController::new(Arc::clone(&identity) as Arc<dyn IdentityService>);
            controller.initialize();
            assert_eq!(identity.subscriber_count(), 1);
        }
        assert_eq!(identity.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_idempotent() {
        let (identity, _fetch) = FakeIdentity::gated();
        let controller = SessionController::new(Arc::clone(&identity) as Arc<dyn IdentityService>);
        let (recorder, subscription) = Recorder::attach(&controller);

        controller.initialize();
        subscription.unsubscribe();
        subscription.unsubscribe();

        identity.emit(Some(session("u1")));
        assert_eq!(recorder.notifications(), 0);
    }

    #[tokio::test]
    async fn test_second_initialize_is_rejected() {
        let (identity, fetch) = FakeIdentity::gated();
        let controller = SessionController::new(Arc::clone(&identity) as Arc<dyn IdentityService>);

        controller.initialize();
        fetch.send(Ok(None)).unwrap();
        wait_until(|| controller.state().ready).await;

        // Release builds log and ignore; state must be untouched. (Debug
        // builds would assert, so exercise the release path only there.)
        if !cfg!(debug_assertions) {
            controller.initialize();
            assert!(controller.state().ready);
            assert_eq!(identity.subscriber_count(), 1);
        }
    }
}
