//! Bounded verification of a just-mutated console resource.
//!
//! After a resource is created or updated, the backend validates it
//! asynchronously (e.g. a cloud credential is checked against its provider).
//! [`RetryingVerifier`] re-reads the resource a small, fixed number of times
//! and reports whether it reached its success status. Only success ends the
//! run early: a failure status observed along the way may still flap to
//! success while the backend is provisioning.
//!
//! Verification is best-effort. An [`VerifyOutcome::Exhausted`] run carries
//! the last observed resource so that callers can surface its status details
//! and still proceed without verification.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod metrics;


pub use self::metrics::VerifyMetrics;
use console_reconciler_core::{Classify, FetchResource, Terminal, Tracked};
use tokio::time;
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyConfig {
    max_attempts: u32,
    delay: time::Duration,
}

#[derive(Debug, thiserror::Error)]
#[error("verification requires at least one attempt")]
pub struct InvalidAttempts(());

pub struct RetryingVerifier<C> {
    config: VerifyConfig,
    classify: C,
    metrics: VerifyMetrics,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifyOutcome<R> {
    /// The resource reached its success status.
    Verified { resource: R, attempts: u32 },

    /// Every attempt completed without observing success. `resource` is the
    /// last representation fetched, or the original resource if no fetch
    /// returned one.
    Exhausted { resource: R, attempts: u32 },
}

/// Describes an exhausted verification.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{resource} was not verified after {attempts} attempts")]
pub struct Unverified {
    pub resource: String,
    pub attempts: u32,

    /// Details carried on the resource's status conditions.
    pub details: Vec<String>,
}

// === impl VerifyConfig ===

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            delay: Self::DEFAULT_DELAY,
        }
    }
}

impl VerifyConfig {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_DELAY: time::Duration = time::Duration::from_secs(2);

    pub fn new(max_attempts: u32, delay: time::Duration) -> Result<Self, InvalidAttempts> {
        if max_attempts == 0 {
            return Err(InvalidAttempts(()));
        }
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> time::Duration {
        self.delay
    }
}

// === impl RetryingVerifier ===

impl<C> RetryingVerifier<C> {
    pub fn new(config: VerifyConfig, classify: C) -> Self {
        Self {
            config,
            classify,
            metrics: VerifyMetrics::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: VerifyMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    /// Fetches `resource` until its status is the success value, at most
    /// `max_attempts` times.
    ///
    /// The first attempt is made immediately; each subsequent attempt waits
    /// for the configured delay. Failed and empty fetches count as attempts.
    /// Every wait is a one-shot delay, so nothing remains scheduled once this
    /// returns.
    #[instrument(skip_all, fields(resource = %resource.identity()))]
    pub async fn verify<R, F>(&self, resource: R, fetch: &F) -> VerifyOutcome<R>
    where
        R: Tracked,
        F: FetchResource<R> + ?Sized,
        C: Classify<R::Status>,
    {
        let id = resource.identity();
        let mut last = resource;

        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                time::sleep(self.config.delay).await;
            }

            self.metrics.attempt();
            match fetch.fetch(&id).await {
                Ok(Some(resource)) => {
                    let terminal = resource.status().and_then(|s| self.classify.classify(s));
                    if terminal == Some(Terminal::Success) {
                        self.metrics.verified();
                        tracing::debug!(attempt, "Verified");
                        return VerifyOutcome::Verified {
                            resource,
                            attempts: attempt + 1,
                        };
                    }
                    tracing::debug!(
                        attempt,
                        status = %resource.status().map(ToString::to_string).unwrap_or_default(),
                        "Not yet verified"
                    );
                    last = resource;
                }
                Ok(None) => tracing::debug!(attempt, "Resource not found"),
                Err(error) => {
                    self.metrics.fetch_failed();
                    tracing::debug!(attempt, %error, "Fetch failed");
                }
            }
        }

        self.metrics.exhausted();
        tracing::info!(attempts = self.config.max_attempts, "Verification exhausted");
        VerifyOutcome::Exhausted {
            resource: last,
            attempts: self.config.max_attempts,
        }
    }
}

// === impl VerifyOutcome ===

impl<R> VerifyOutcome<R> {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    pub fn resource(&self) -> &R {
        match self {
            Self::Verified { resource, .. } | Self::Exhausted { resource, .. } => resource,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Verified { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Proceeds with the resource whether or not it was verified.
    pub fn into_resource(self) -> R {
        match self {
            Self::Verified { resource, .. } | Self::Exhausted { resource, .. } => resource,
        }
    }
}

impl<R: Tracked> VerifyOutcome<R> {
    /// Describes an exhausted run, or returns `None` if the resource was
    /// verified.
    pub fn error(&self) -> Option<Unverified> {
        match self {
            Self::Verified { .. } => None,
            Self::Exhausted { resource, attempts } => Some(Unverified {
                resource: resource.identity().to_string(),
                attempts: *attempts,
                details: resource.status_detail(),
            }),
        }
    }
}
