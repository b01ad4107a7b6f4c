//! Polls a console resource until it reaches a terminal state or disappears.
//!
//! A [`ResourcePoller`] owns any number of polling sessions, one per tracked
//! resource. Each session runs on its own task: every tick it fetches the
//! resource, reports non-terminal updates to its [`Observer`], and settles
//! exactly once when the fetched status is terminal or the resource is gone.
//!
//! ```text
//!            start
//!              |
//!   terminal?  v
//! [ NeverStarted ] <--- [ resource ] ---> [ Polling ] --tick--> fetch
//!                                           |   ^                 |
//!                                  cancel   |   +-- non-terminal -+
//!                                           v                     |
//!                                    [ Cancelled ]  [ Settled ] <-+- terminal or deleted
//! ```
//!
//! Sessions are never re-entrant: a tick's fetch completes before the next
//! tick is evaluated, and ticks missed behind a slow fetch are skipped.
//! Cancelling a session does not abort a fetch that is already in flight, but
//! its result is discarded without notifying the observer.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod metrics;
mod observer;
mod session;

#[cfg(test)]
mod tests;

pub use self::{
    metrics::PollerMetrics,
    observer::{Callbacks, Event, Observer},
    session::{SessionId, SessionState},
};
use self::session::{Deregister, Session, Sessions, Task};
use console_reconciler_core::{Classify, FetchResource, Tracked};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{info_span, Instrument};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollConfig {
    interval: Duration,
    notify_if_settled: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("poll interval must be greater than zero")]
pub struct InvalidInterval(());

/// Owns a set of polling sessions.
///
/// Dropping the poller cancels all of its sessions.
#[derive(Debug)]
pub struct ResourcePoller {
    sessions: Sessions,
    next_id: AtomicU64,
    metrics: PollerMetrics,
}

/// A reference to a single polling session.
#[derive(Clone, Debug)]
pub struct PollHandle {
    session: Arc<Session>,
}

// === impl PollConfig ===

impl PollConfig {
    pub fn new(interval: Duration) -> Result<Self, InvalidInterval> {
        if interval.is_zero() {
            return Err(InvalidInterval(()));
        }
        Ok(Self {
            interval,
            notify_if_settled: false,
        })
    }

    pub fn from_millis(interval_ms: u64) -> Result<Self, InvalidInterval> {
        Self::new(Duration::from_millis(interval_ms))
    }

    /// Configures whether a resource that is already terminal when tracking
    /// begins produces an immediate `settled` notification.
    ///
    /// Disabled by default: such resources are never polled and their
    /// observer is never notified.
    pub fn notify_if_settled(mut self, enabled: bool) -> Self {
        self.notify_if_settled = enabled;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

// === impl ResourcePoller ===

impl Default for ResourcePoller {
    fn default() -> Self {
        Self::new(PollerMetrics::default())
    }
}

impl ResourcePoller {
    pub fn new(metrics: PollerMetrics) -> Self {
        Self {
            sessions: Default::default(),
            next_id: AtomicU64::new(0),
            metrics,
        }
    }

    /// Starts tracking `resource`.
    ///
    /// If `classify` already considers the resource's status terminal, no
    /// session task is spawned and the returned handle is
    /// [`SessionState::NeverStarted`]. Otherwise a task is spawned onto the
    /// current tokio runtime that fetches the resource every
    /// `config.interval()`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn start<R, F, C, O>(
        &self,
        resource: R,
        config: &PollConfig,
        fetch: F,
        classify: C,
        observer: O,
    ) -> PollHandle
    where
        R: Tracked,
        F: FetchResource<R>,
        C: Classify<R::Status>,
        O: Observer<R>,
    {
        let id = resource.identity();
        let session_id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        if let Some(terminal) = resource.status().and_then(|s| classify.classify(s)) {
            let session = Arc::new(Session::new(session_id, SessionState::NeverStarted));
            session.record_status(resource.status());
            tracing::debug!(resource = %id, session = %session_id, %terminal, "Already settled; not polling");
            if config.notify_if_settled {
                observer.settled(terminal.into());
            }
            return PollHandle { session };
        }

        let session = Arc::new(Session::new(session_id, SessionState::Polling));
        session.record_status(resource.status());
        self.sessions.lock().insert(session_id, session.clone());
        self.metrics.session_started();

        let span = info_span!("poll", resource = %id, session = %session_id);
        let deregister = Deregister {
            sessions: Arc::downgrade(&self.sessions),
            id: session_id,
            metrics: self.metrics.clone(),
        };
        let task = Task {
            session: session.clone(),
            id,
            interval: config.interval,
            fetch,
            classify,
            observer,
            metrics: self.metrics.clone(),
        };
        tokio::spawn(task.run(deregister).instrument(span));

        PollHandle { session }
    }

    /// Cancels the session referenced by `handle`. Idempotent.
    ///
    /// Equivalent to [`PollHandle::cancel`]: a handle carries its own
    /// session, so this works on handles started by any poller.
    pub fn cancel(&self, handle: &PollHandle) {
        handle.cancel();
    }

    /// Cancels every session this poller is running.
    pub fn cancel_all(&self) {
        let sessions = self.sessions.lock().values().cloned().collect::<Vec<_>>();
        for session in sessions {
            session.cancel();
        }
    }

    /// Returns the number of sessions whose tasks have not yet stopped.
    pub fn active(&self) -> usize {
        self.sessions.lock().len()
    }
}

impl Drop for ResourcePoller {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

// === impl PollHandle ===

impl PollHandle {
    pub fn id(&self) -> SessionId {
        self.session.id
    }

    /// Stops the session. Safe to call repeatedly, and after the session has
    /// already settled.
    pub fn cancel(&self) {
        self.session.cancel();
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Polling
    }

    /// The last status value observed for the resource, for diagnostics.
    pub fn last_status(&self) -> Option<String> {
        self.session.last_status()
    }
}
