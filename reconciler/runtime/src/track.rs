use crate::{
    core::{FetchResource, Outcome, ResourceId, TerminalStates, Tracked},
    k8s::{self, ApiFetcher, Client, StatusValue},
    poller::{Event, PollConfig, ResourcePoller, SessionState},
    verify::RetryingVerifier,
};
use anyhow::{bail, Result};
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use std::fmt;
use tokio::sync::mpsc;

/// Tracks a single console resource, either by polling it until it settles or
/// by verifying it.
pub(crate) struct Tracker {
    pub(crate) client: Client,
    pub(crate) poller: ResourcePoller,
    pub(crate) poll: PollConfig,

    /// When set, the resource is verified instead of polled.
    pub(crate) verifier: Option<RetryingVerifier<TerminalStates<StatusValue>>>,
}

// === impl Tracker ===

impl Tracker {
    pub(crate) async fn track<K>(&self, id: ResourceId) -> Result<()>
    where
        K: Tracked<Id = ResourceId, Status = StatusValue>,
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
        K: Clone + DeserializeOwned + fmt::Debug,
    {
        let fetch = ApiFetcher::<K>::new(self.client.clone());
        let resource = match fetch.fetch(&id).await? {
            Some(resource) => resource,
            None => bail!("{} {id} not found", K::kind(&())),
        };
        tracing::info!(
            status = %display_status(&resource),
            "Tracking"
        );

        match self.verifier.as_ref() {
            Some(verifier) => {
                let outcome = verifier.verify(resource, &fetch).await;
                match outcome.error() {
                    None => tracing::info!(attempts = outcome.attempts(), "Verified"),
                    Some(error) => tracing::warn!(
                        details = ?error.details,
                        status = %display_status(outcome.resource()),
                        "{error}; continuing without verification"
                    ),
                }
                Ok(())
            }
            None => {
                self.poll_until_settled(resource, fetch).await;
                Ok(())
            }
        }
    }

    async fn poll_until_settled<K>(&self, resource: K, fetch: ApiFetcher<K>)
    where
        K: Tracked<Id = ResourceId, Status = StatusValue>,
        ApiFetcher<K>: FetchResource<K>,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event<K>>();
        let handle = self
            .poller
            .start(resource, &self.poll, fetch, k8s::provisioning(), tx);

        // The channel closes once the session stops.
        let mut settled = false;
        while let Some(event) = rx.recv().await {
            match event {
                Event::Updated(resource) => tracing::info!(
                    status = %display_status(&resource),
                    details = ?resource.status_detail(),
                    "Updated"
                ),
                Event::Settled(outcome) => {
                    settled = true;
                    log_settled(outcome);
                }
            }
        }

        if !settled && handle.state() == SessionState::NeverStarted {
            tracing::info!(
                status = %handle.last_status().unwrap_or_default(),
                "Already settled"
            );
        }
    }
}

fn display_status<K: Tracked>(resource: &K) -> String {
    resource
        .status()
        .map(ToString::to_string)
        .unwrap_or_else(|| "<none>".to_string())
}

fn log_settled(outcome: Outcome) {
    match outcome {
        Outcome::Success => tracing::info!(%outcome, "Settled"),
        Outcome::Failure | Outcome::Deleted => tracing::warn!(%outcome, "Settled"),
    }
}
