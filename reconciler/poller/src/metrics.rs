use console_reconciler_core::Outcome;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct PollerMetrics {
    sessions_started: Counter,
    sessions_active: Gauge,
    ticks: Counter,
    fetch_errors: Counter,
    settled: Family<OutcomeLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OutcomeLabels {
    outcome: &'static str,
}

// === impl PollerMetrics ===

impl PollerMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let sessions_started = Counter::default();
        prom.register(
            "sessions_started",
            "Count of polling sessions started",
            sessions_started.clone(),
        );

        let sessions_active = Gauge::default();
        prom.register(
            "sessions_active",
            "Gauge of the number of polling sessions that have not yet stopped",
            sessions_active.clone(),
        );

        let ticks = Counter::default();
        prom.register("ticks", "Count of poll ticks", ticks.clone());

        let fetch_errors = Counter::default();
        prom.register(
            "fetch_errors",
            "Count of poll ticks whose fetch failed",
            fetch_errors.clone(),
        );

        let settled = Family::default();
        prom.register(
            "settled",
            "Count of polling sessions that observed a terminal state",
            settled.clone(),
        );

        Self {
            sessions_started,
            sessions_active,
            ticks,
            fetch_errors,
            settled,
        }
    }

    pub(crate) fn session_started(&self) {
        self.sessions_started.inc();
        self.sessions_active.inc();
    }

    pub(crate) fn session_stopped(&self) {
        self.sessions_active.dec();
    }

    pub(crate) fn tick(&self) {
        self.ticks.inc();
    }

    pub(crate) fn fetch_failed(&self) {
        self.fetch_errors.inc();
    }

    pub(crate) fn settled(&self, outcome: Outcome) {
        self.settled
            .get_or_create(&OutcomeLabels {
                outcome: outcome.as_str(),
            })
            .inc();
    }
}
