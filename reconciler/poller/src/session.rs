use crate::{metrics::PollerMetrics, observer::Observer};
use ahash::AHashMap as HashMap;
use console_reconciler_core::{Classify, FetchResource, Outcome, Tracked};
use parking_lot::Mutex;
use std::{
    cell::Cell,
    fmt,
    sync::{Arc, Weak},
};
use tokio::{sync::Notify, time};

pub(crate) type Sessions = Arc<Mutex<HashMap<SessionId, Arc<Session>>>>;

/// Identifies a polling session within its [`ResourcePoller`](crate::ResourcePoller).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Polling,
    Settled(Outcome),
    Cancelled,

    /// The resource was already terminal when tracking began, so no timer was
    /// ever started.
    NeverStarted,
}

#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) id: SessionId,

    // Never held while observer code runs.
    state: Mutex<SessionState>,

    // Held by the polling task while it notifies the observer, so that
    // `cancel` can wait for an in-progress notification to complete.
    notifying: Mutex<()>,
    last_status: Mutex<Option<String>>,
    cancel: Notify,
}

thread_local! {
    // Set while any session's observer is being notified on this thread.
    static NOTIFYING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running observer code until dropped.
struct Notifying(bool);

/// Drives a single session's ticks.
pub(crate) struct Task<R: Tracked, F, C, O> {
    pub(crate) session: Arc<Session>,
    pub(crate) id: R::Id,
    pub(crate) interval: time::Duration,
    pub(crate) fetch: F,
    pub(crate) classify: C,
    pub(crate) observer: O,
    pub(crate) metrics: PollerMetrics,
}

/// Removes a session from its poller's arena once its task completes.
pub(crate) struct Deregister {
    pub(crate) sessions: Weak<Mutex<HashMap<SessionId, Arc<Session>>>>,
    pub(crate) id: SessionId,
    pub(crate) metrics: PollerMetrics,
}

// === impl SessionId ===

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// === impl Session ===

impl Session {
    pub(crate) fn new(id: SessionId, state: SessionState) -> Self {
        Self {
            id,
            state: Mutex::new(state),
            notifying: Mutex::new(()),
            last_status: Mutex::new(None),
            cancel: Notify::new(),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub(crate) fn last_status(&self) -> Option<String> {
        self.last_status.lock().clone()
    }

    /// Stops the session if it is still polling. Idempotent.
    ///
    /// Once this returns, the observer is not notified again. When called
    /// from within an observer callback (of this or any other session), a
    /// notification already running on another thread may still complete
    /// after this returns; no further notification starts.
    pub(crate) fn cancel(&self) {
        {
            let mut state = self.state.lock();
            if *state == SessionState::Polling {
                *state = SessionState::Cancelled;
                tracing::debug!(session = %self.id, "Cancelled");
            }
        }
        // Wakes the task if it is waiting for a tick. If it is mid-fetch, the
        // stored permit is consumed on its next wait.
        self.cancel.notify_one();

        // Waiting from inside a callback could deadlock against a session
        // that is cancelling us from its own callback.
        if !NOTIFYING.with(Cell::get) {
            drop(self.notifying.lock());
        }
    }

    /// Moves a polling session to `next`, returning false if it was
    /// cancelled.
    fn transition(&self, next: SessionState) -> bool {
        let mut state = self.state.lock();
        if *state != SessionState::Polling {
            return false;
        }
        *state = next;
        true
    }

    pub(crate) fn record_status<S: fmt::Display + ?Sized>(&self, status: Option<&S>) {
        let status = status.map(|s| s.to_string());
        let mut last = self.last_status.lock();
        if *last != status {
            tracing::debug!(
                status = status.as_deref().unwrap_or("<none>"),
                "Observed status"
            );
            *last = status;
        }
    }
}

// === impl Task ===

impl<R, F, C, O> Task<R, F, C, O>
where
    R: Tracked,
    F: FetchResource<R>,
    C: Classify<R::Status>,
    O: Observer<R>,
{
    pub(crate) async fn run(self, _deregister: Deregister) {
        let Self {
            session,
            id,
            interval,
            fetch,
            classify,
            mut observer,
            metrics,
        } = self;

        // Like a repeating timer, the first tick fires one period after start.
        let mut ticks = time::interval_at(time::Instant::now() + interval, interval);
        ticks.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = session.cancel.notified() => return,
                _ = ticks.tick() => {}
            }
            if session.state() != SessionState::Polling {
                return;
            }

            metrics.tick();
            tracing::trace!("Fetching");
            let fetched = fetch.fetch(&id).await;

            // Held while notifying the observer so that a concurrent cancel
            // cannot return until the notification completes. The state is
            // re-checked under it so that no notification starts after a
            // cancel.
            let _notifying = session.notifying.lock();
            if session.state() != SessionState::Polling {
                tracing::debug!("Discarding fetch result for a cancelled session");
                return;
            }

            let outcome = match fetched {
                Ok(Some(resource)) => {
                    session.record_status(resource.status());
                    match resource.status().and_then(|s| classify.classify(s)) {
                        Some(terminal) => Outcome::from(terminal),
                        None => {
                            let _guard = Notifying::enter();
                            observer.update(resource);
                            continue;
                        }
                    }
                }
                Ok(None) => Outcome::Deleted,
                Err(error) => {
                    metrics.fetch_failed();
                    tracing::debug!(%error, "Fetch failed; waiting for the next tick");
                    let _guard = Notifying::enter();
                    observer.fetch_failed(&error);
                    continue;
                }
            };

            if !session.transition(SessionState::Settled(outcome)) {
                tracing::debug!("Discarding fetch result for a cancelled session");
                return;
            }
            metrics.settled(outcome);
            tracing::info!(%outcome, "Settled");
            let _guard = Notifying::enter();
            observer.settled(outcome);
            return;
        }
    }
}

// === impl Notifying ===

impl Notifying {
    fn enter() -> Self {
        Self(NOTIFYING.with(|n| n.replace(true)))
    }
}

impl Drop for Notifying {
    fn drop(&mut self) {
        NOTIFYING.with(|n| n.set(self.0));
    }
}

// === impl Deregister ===

impl Drop for Deregister {
    fn drop(&mut self) {
        self.metrics.session_stopped();
        if let Some(sessions) = self.sessions.upgrade() {
            sessions.lock().remove(&self.id);
        }
    }
}
