use crate::{
    core::ResourceId,
    k8s,
    poller::{PollConfig, PollerMetrics, ResourcePoller},
    track::Tracker,
    verify::{RetryingVerifier, VerifyConfig, VerifyMetrics},
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::{fmt, str::FromStr};
use tokio::time::Duration;
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "console-reconciler",
    about = "Tracks a console resource until it settles"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "console=info,warn",
        env = "CONSOLE_RECONCILER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The delay between fetches while polling.
    #[clap(long, default_value = "5000")]
    interval_ms: u64,

    /// Reports resources that are already settled instead of exiting
    /// silently.
    #[clap(long)]
    notify_if_settled: bool,

    /// Verifies the resource with a bounded number of fetches instead of
    /// polling it until it settles.
    #[clap(long)]
    verify: bool,

    #[clap(long, default_value = "3")]
    verify_attempts: u32,

    #[clap(long, default_value = "2000")]
    verify_delay_ms: u64,

    #[clap(short, long, default_value = "default")]
    namespace: String,

    kind: Kind,

    name: String,
}

/// The console resource families that can be tracked.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    CloudCredential,
    Cluster,
    NamespaceClaim,
    ServiceInstance,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            interval_ms,
            notify_if_settled,
            verify,
            verify_attempts,
            verify_delay_ms,
            namespace,
            kind,
            name,
        } = self;

        let poll = PollConfig::from_millis(interval_ms)?.notify_if_settled(notify_if_settled);
        let verify_config =
            VerifyConfig::new(verify_attempts, Duration::from_millis(verify_delay_ms))?;

        let mut prom = <Registry>::default();
        let poller = ResourcePoller::new(PollerMetrics::register(
            prom.sub_registry_with_prefix("poller"),
        ));
        let verifier = RetryingVerifier::new(verify_config, k8s::provisioning()).with_metrics(
            VerifyMetrics::register(prom.sub_registry_with_prefix("verify")),
        );
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let tracker = Tracker {
            client: runtime.client(),
            poller,
            poll,
            verifier: verify.then_some(verifier),
        };
        let id = ResourceId::new(namespace, name);
        let span = info_span!("track", %kind, resource = %id);
        let tracking = async move {
            match kind {
                Kind::CloudCredential => tracker.track::<k8s::CloudCredential>(id).await,
                Kind::Cluster => tracker.track::<k8s::Cluster>(id).await,
                Kind::NamespaceClaim => tracker.track::<k8s::NamespaceClaim>(id).await,
                Kind::ServiceInstance => tracker.track::<k8s::ServiceInstance>(id).await,
            }
        }
        .instrument(span);

        // Track the resource until it settles or the process is signaled to
        // shut down. Dropping the tracker cancels its polling session.
        tokio::select! {
            res = tracking => res,
            res = runtime.run() => {
                if res.is_err() {
                    bail!("Aborted");
                }
                Ok(())
            }
        }
    }
}

// === impl Kind ===

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CloudCredential => "cloudcredential",
            Self::Cluster => "cluster",
            Self::NamespaceClaim => "namespaceclaim",
            Self::ServiceInstance => "serviceinstance",
        }
    }
}

impl FromStr for Kind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cloudcredential" | "cloudcredentials" | "credential" | "cred" => {
                Ok(Self::CloudCredential)
            }
            "cluster" | "clusters" => Ok(Self::Cluster),
            "namespaceclaim" | "namespaceclaims" | "nsclaim" => Ok(Self::NamespaceClaim),
            "serviceinstance" | "serviceinstances" | "service" | "svc" => {
                Ok(Self::ServiceInstance)
            }
            _ => bail!("unknown resource kind: {s}"),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
