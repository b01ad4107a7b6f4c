use super::*;
use console_reconciler_core::{Outcome, ResourceId, TerminalStates};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::{
    collections::VecDeque,
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Barrier, OnceLock,
    },
};
use tokio::{
    sync::{mpsc, oneshot},
    time,
};

const INTERVAL: Duration = Duration::from_millis(100);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Status {
    Pending,
    Success,
    Failure,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Resource {
    id: ResourceId,
    status: Option<Status>,
}

#[derive(Copy, Clone, Debug)]
enum Response {
    Found(Status),
    Deleted,
    Error,
}

/// Replays a fixed sequence of responses, then reports `Pending` forever.
#[derive(Clone, Default)]
struct Script(Arc<Mutex<ScriptState>>);

#[derive(Default)]
struct ScriptState {
    responses: VecDeque<Response>,
    fetched_at: Vec<time::Instant>,
    latency: Duration,
}

#[tokio::test(start_paused = true)]
async fn settles_after_pending_ticks() {
    let _tracing = init_tracing();
    let script = Script::new([
        Response::Found(Status::Pending),
        Response::Found(Status::Pending),
        Response::Found(Status::Success),
    ]);
    let poller = ResourcePoller::default();
    let (tx, rx) = mpsc::unbounded_channel();

    let started = time::Instant::now();
    let handle = poller.start(
        mk_resource(None),
        &config(),
        script.clone(),
        classify(),
        tx,
    );
    assert!(handle.is_active());
    assert_eq!(poller.active(), 1);

    let events = collect(rx).await;
    assert_eq!(
        events,
        vec![
            Event::Updated(mk_resource(Some(Status::Pending))),
            Event::Updated(mk_resource(Some(Status::Pending))),
            Event::Settled(Outcome::Success),
        ]
    );
    assert_eq!(
        script.offsets(started),
        vec![INTERVAL, INTERVAL * 2, INTERVAL * 3],
        "fetches must happen once per interval"
    );

    time::sleep(INTERVAL * 10).await;
    assert_eq!(script.fetches(), 3, "polling must stop once settled");
    assert_eq!(handle.state(), SessionState::Settled(Outcome::Success));
    assert_eq!(handle.last_status().as_deref(), Some("Success"));
    assert_eq!(poller.active(), 0);
}

#[tokio::test(start_paused = true)]
async fn settles_with_failure() {
    let script = Script::new([Response::Found(Status::Failure)]);
    let poller = ResourcePoller::default();
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = poller.start(
        mk_resource(Some(Status::Pending)),
        &config(),
        script.clone(),
        classify(),
        tx,
    );

    assert_eq!(collect(rx).await, vec![Event::Settled(Outcome::Failure)]);
    assert_eq!(handle.state(), SessionState::Settled(Outcome::Failure));
    assert_eq!(script.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_fetch_settles_as_deleted() {
    let script = Script::new([Response::Deleted]);
    let poller = ResourcePoller::default();
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = poller.start(
        mk_resource(Some(Status::Pending)),
        &config(),
        script.clone(),
        classify(),
        tx,
    );

    assert_eq!(collect(rx).await, vec![Event::Settled(Outcome::Deleted)]);
    time::sleep(INTERVAL * 10).await;
    assert_eq!(script.fetches(), 1, "no tick may follow a deletion");
    assert_eq!(handle.state(), SessionState::Settled(Outcome::Deleted));
}

#[tokio::test(start_paused = true)]
async fn already_terminal_resources_are_never_polled() {
    let script = Script::default();
    let poller = ResourcePoller::default();
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = poller.start(
        mk_resource(Some(Status::Success)),
        &config(),
        script.clone(),
        classify(),
        tx,
    );
    assert_eq!(handle.state(), SessionState::NeverStarted);
    assert_eq!(handle.last_status().as_deref(), Some("Success"));
    assert_eq!(poller.active(), 0);

    // The observer is dropped without any notification.
    assert!(collect(rx).await.is_empty());
    time::sleep(INTERVAL * 10).await;
    assert_eq!(script.fetches(), 0);

    // Cancelling a session that never started is harmless.
    handle.cancel();
    assert_eq!(handle.state(), SessionState::NeverStarted);
}

#[tokio::test(start_paused = true)]
async fn already_terminal_resources_may_notify() {
    let script = Script::default();
    let poller = ResourcePoller::default();
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = poller.start(
        mk_resource(Some(Status::Failure)),
        &config().notify_if_settled(true),
        script.clone(),
        classify(),
        tx,
    );

    assert_eq!(handle.state(), SessionState::NeverStarted);
    assert_eq!(collect(rx).await, vec![Event::Settled(Outcome::Failure)]);
    assert_eq!(script.fetches(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_between_ticks() {
    let script = Script::default();
    let poller = ResourcePoller::default();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = poller.start(
        mk_resource(None),
        &config(),
        script.clone(),
        classify(),
        tx,
    );

    assert_eq!(
        rx.recv().await,
        Some(Event::Updated(mk_resource(Some(Status::Pending))))
    );
    poller.cancel(&handle);
    assert_eq!(handle.state(), SessionState::Cancelled);

    assert_eq!(rx.recv().await, None, "observer must be released");
    time::sleep(INTERVAL * 10).await;
    assert_eq!(script.fetches(), 1, "no tick may follow a cancellation");
    assert_eq!(poller.active(), 0);

    handle.cancel();
    assert_eq!(handle.state(), SessionState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn cancel_discards_in_flight_fetch() {
    let script = Script::new([Response::Found(Status::Success)]).with_latency(INTERVAL / 2);
    let poller = ResourcePoller::default();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = poller.start(
        mk_resource(None),
        &config(),
        script.clone(),
        classify(),
        tx,
    );

    // The first tick's fetch is in flight between 100ms and 150ms.
    time::sleep(INTERVAL + INTERVAL / 5).await;
    assert_eq!(script.fetches(), 1);
    handle.cancel();

    assert_eq!(rx.recv().await, None, "the in-flight result must be dropped");
    assert_eq!(handle.state(), SessionState::Cancelled);
    assert_eq!(script.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn fetch_errors_are_retried_on_the_next_tick() {
    let script = Script::new([
        Response::Error,
        Response::Error,
        Response::Found(Status::Success),
    ]);
    let poller = ResourcePoller::default();
    let updates = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let (settled_tx, settled_rx) = oneshot::channel();

    let observer = Callbacks::new(
        {
            let updates = updates.clone();
            move |_: Resource| {
                updates.fetch_add(1, Ordering::SeqCst);
            }
        },
        move |outcome: Outcome| {
            let _ = settled_tx.send(outcome);
        },
    )
    .on_error({
        let errors = errors.clone();
        move |_| {
            errors.fetch_add(1, Ordering::SeqCst);
        }
    });

    let started = time::Instant::now();
    poller.start(
        mk_resource(Some(Status::Pending)),
        &config(),
        script.clone(),
        classify(),
        observer,
    );

    assert_eq!(settled_rx.await, Ok(Outcome::Success));
    assert_eq!(errors.load(Ordering::SeqCst), 2);
    assert_eq!(updates.load(Ordering::SeqCst), 0);
    assert_eq!(
        script.offsets(started),
        vec![INTERVAL, INTERVAL * 2, INTERVAL * 3],
        "errors must not change the polling cadence"
    );
}

#[tokio::test(start_paused = true)]
async fn fetch_errors_are_silent_by_default() {
    let script = Script::new([Response::Error, Response::Found(Status::Success)]);
    let poller = ResourcePoller::default();
    let (tx, rx) = mpsc::unbounded_channel();

    poller.start(
        mk_resource(None),
        &config(),
        script.clone(),
        classify(),
        tx,
    );

    assert_eq!(collect(rx).await, vec![Event::Settled(Outcome::Success)]);
    assert_eq!(script.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_fetches_do_not_overlap() {
    // Each fetch takes longer than the interval.
    let script = Script::new([
        Response::Found(Status::Pending),
        Response::Found(Status::Pending),
        Response::Found(Status::Success),
    ])
    .with_latency(INTERVAL * 3 / 2);
    let poller = ResourcePoller::default();
    let (tx, rx) = mpsc::unbounded_channel();

    let started = time::Instant::now();
    poller.start(
        mk_resource(None),
        &config(),
        script.clone(),
        classify(),
        tx,
    );

    assert_eq!(collect(rx).await.len(), 3);
    let offsets = script.offsets(started);
    assert_eq!(offsets.len(), 3);
    for pair in offsets.windows(2) {
        assert!(
            pair[1] - pair[0] >= INTERVAL * 3 / 2,
            "a fetch started before the previous one completed: {offsets:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn observers_may_cancel_their_own_session() {
    let script = Script::default();
    let poller = ResourcePoller::default();
    let slot = Arc::new(Mutex::new(None::<PollHandle>));
    let (settled_tx, settled_rx) = oneshot::channel();

    let observer = Callbacks::new(
        {
            let slot = slot.clone();
            move |_: Resource| {
                if let Some(handle) = slot.lock().as_ref() {
                    handle.cancel();
                }
            }
        },
        move |outcome: Outcome| {
            let _ = settled_tx.send(outcome);
        },
    );
    let handle = poller.start(
        mk_resource(None),
        &config(),
        script.clone(),
        classify(),
        observer,
    );
    *slot.lock() = Some(handle.clone());

    assert!(settled_rx.await.is_err(), "cancelled sessions never settle");
    assert_eq!(handle.state(), SessionState::Cancelled);
    assert_eq!(script.fetches(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sessions_may_cancel_each_other_from_callbacks() {
    let _tracing = init_tracing();
    let poller = ResourcePoller::default();
    let config = PollConfig::from_millis(10).expect("interval is valid");
    let barrier = Arc::new(Barrier::new(2));
    let slots = [
        Arc::new(OnceLock::<PollHandle>::new()),
        Arc::new(OnceLock::<PollHandle>::new()),
    ];

    let mut handles = Vec::new();
    for i in 0..2 {
        let barrier = barrier.clone();
        let sibling = slots[1 - i].clone();
        let mut first = true;
        let observer = Callbacks::new(
            move |_: Resource| {
                // Both sessions are inside `update` at the same time before
                // touching each other.
                if std::mem::take(&mut first) {
                    barrier.wait();
                }
                if let Some(sibling) = sibling.get() {
                    let _ = sibling.state();
                    sibling.cancel();
                }
            },
            |_: Outcome| {},
        );
        let handle = poller.start(
            mk_resource(None),
            &config,
            Script::default(),
            classify(),
            observer,
        );
        assert!(slots[i].set(handle.clone()).is_ok());
        handles.push(handle);
    }

    let deadline = time::Instant::now() + Duration::from_secs(10);
    while handles.iter().any(PollHandle::is_active) {
        assert!(
            time::Instant::now() < deadline,
            "sessions must cancel each other"
        );
        time::sleep(Duration::from_millis(5)).await;
    }
    for handle in &handles {
        assert_eq!(handle.state(), SessionState::Cancelled);
    }

    // Both tasks stop once woken by their cancellation.
    while poller.active() > 0 {
        assert!(time::Instant::now() < deadline, "sessions must stop");
        time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn handles_may_be_cancelled_through_any_poller() {
    let script = Script::default();
    let poller = ResourcePoller::default();
    let other = ResourcePoller::default();
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = poller.start(
        mk_resource(None),
        &config(),
        script.clone(),
        classify(),
        tx,
    );
    other.cancel(&handle);

    assert_eq!(handle.state(), SessionState::Cancelled);
    assert!(collect(rx).await.is_empty());
    assert_eq!(script.fetches(), 0);
    assert_eq!(poller.active(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_poller_cancels_sessions() {
    let script = Script::default();
    let poller = ResourcePoller::default();
    let (tx0, rx0) = mpsc::unbounded_channel();
    let (tx1, rx1) = mpsc::unbounded_channel();

    let h0 = poller.start(
        mk_resource(None),
        &config(),
        script.clone(),
        classify(),
        tx0,
    );
    let h1 = poller.start(
        Resource {
            id: ResourceId::new("ns-0", "cluster-1"),
            status: None,
        },
        &config(),
        script.clone(),
        classify(),
        tx1,
    );
    assert_ne!(h0.id(), h1.id());
    assert_eq!(poller.active(), 2);

    drop(poller);
    assert_eq!(h0.state(), SessionState::Cancelled);
    assert_eq!(h1.state(), SessionState::Cancelled);
    assert!(collect(rx0).await.is_empty());
    assert!(collect(rx1).await.is_empty());
    assert_eq!(script.fetches(), 0);
}

#[tokio::test(start_paused = true)]
async fn metrics_track_sessions() {
    let mut prom = prometheus_client::registry::Registry::default();
    let poller = ResourcePoller::new(PollerMetrics::register(&mut prom));
    let script = Script::new([
        Response::Error,
        Response::Found(Status::Pending),
        Response::Found(Status::Success),
    ]);
    let (tx, rx) = mpsc::unbounded_channel();

    poller.start(
        mk_resource(None),
        &config(),
        script.clone(),
        classify(),
        tx,
    );
    collect(rx).await;

    let mut text = String::new();
    prometheus_client::encoding::text::encode(&mut text, &prom).expect("metrics must encode");
    for expected in [
        "sessions_started_total 1",
        "sessions_active 0",
        "ticks_total 3",
        "fetch_errors_total 1",
        "settled_total{outcome=\"success\"} 1",
    ] {
        assert!(text.contains(expected), "missing {expected:?} in:\n{text}");
    }
}

#[test]
fn zero_interval_is_rejected() {
    assert!(PollConfig::new(Duration::ZERO).is_err());
    assert!(PollConfig::from_millis(0).is_err());
    assert_eq!(
        PollConfig::from_millis(250).expect("interval is valid").interval(),
        Duration::from_millis(250)
    );
}

// === Helpers ===

fn init_tracing() -> tracing::subscriber::DefaultGuard {
    tracing::subscriber::set_default(
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "console=trace,debug".parse().unwrap()),
            )
            .finish(),
    )
}

fn config() -> PollConfig {
    PollConfig::new(INTERVAL).expect("interval is valid")
}

fn classify() -> TerminalStates<Status> {
    TerminalStates::new([Status::Success], [Status::Failure])
}

fn mk_resource(status: Option<Status>) -> Resource {
    Resource {
        id: ResourceId::new("ns-0", "cluster-0"),
        status,
    }
}

async fn collect(mut rx: mpsc::UnboundedReceiver<Event<Resource>>) -> Vec<Event<Resource>> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Tracked for Resource {
    type Id = ResourceId;
    type Status = Status;

    fn identity(&self) -> ResourceId {
        self.id.clone()
    }

    fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }
}

impl Script {
    fn new(responses: impl IntoIterator<Item = Response>) -> Self {
        Self(Arc::new(Mutex::new(ScriptState {
            responses: responses.into_iter().collect(),
            ..Default::default()
        })))
    }

    fn with_latency(self, latency: Duration) -> Self {
        self.0.lock().latency = latency;
        self
    }

    fn fetches(&self) -> usize {
        self.0.lock().fetched_at.len()
    }

    fn offsets(&self, started: time::Instant) -> Vec<Duration> {
        self.0
            .lock()
            .fetched_at
            .iter()
            .map(|at| at.duration_since(started))
            .collect()
    }
}

#[async_trait::async_trait]
impl FetchResource<Resource> for Script {
    async fn fetch(&self, id: &ResourceId) -> anyhow::Result<Option<Resource>> {
        let (response, latency) = {
            let mut state = self.0.lock();
            state.fetched_at.push(time::Instant::now());
            let response = state
                .responses
                .pop_front()
                .unwrap_or(Response::Found(Status::Pending));
            (response, state.latency)
        };
        if !latency.is_zero() {
            time::sleep(latency).await;
        }
        match response {
            Response::Found(status) => Ok(Some(Resource {
                id: id.clone(),
                status: Some(status),
            })),
            Response::Deleted => Ok(None),
            Response::Error => Err(anyhow::anyhow!("connection reset")),
        }
    }
}
