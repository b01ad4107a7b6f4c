use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct VerifyMetrics {
    verifications: Family<ResultLabels, Counter>,
    attempts: Counter,
    fetch_errors: Counter,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ResultLabels {
    result: &'static str,
}

// === impl VerifyMetrics ===

impl VerifyMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let verifications = Family::default();
        prom.register(
            "verifications",
            "Count of completed verifications by result",
            verifications.clone(),
        );

        let attempts = Counter::default();
        prom.register(
            "attempts",
            "Count of verification attempts",
            attempts.clone(),
        );

        let fetch_errors = Counter::default();
        prom.register(
            "fetch_errors",
            "Count of verification attempts whose fetch failed",
            fetch_errors.clone(),
        );

        Self {
            verifications,
            attempts,
            fetch_errors,
        }
    }

    pub(crate) fn attempt(&self) {
        self.attempts.inc();
    }

    pub(crate) fn fetch_failed(&self) {
        self.fetch_errors.inc();
    }

    pub(crate) fn verified(&self) {
        self.verifications
            .get_or_create(&ResultLabels { result: "verified" })
            .inc();
    }

    pub(crate) fn exhausted(&self) {
        self.verifications
            .get_or_create(&ResultLabels { result: "exhausted" })
            .inc();
    }
}
