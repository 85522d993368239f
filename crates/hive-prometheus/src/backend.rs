use std::{sync::Arc, time::Duration};

use hive_core::{AgentMetrics, SupervisorAction};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::warn;

/// [`AgentMetrics`] backed by a private Prometheus registry.
///
/// Cheap to clone; clones share the same collectors.
#[derive(Clone)]
pub struct PrometheusMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    passes: IntCounter,
    skipped: IntCounter,
    duration: Histogram,
    actions: IntCounterVec,
    live: IntGauge,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Register the collectors on an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let passes = IntCounter::with_opts(Opts::new(
            "hive_agent_passes_total",
            "Convergence passes completed",
        ))?;
        registry.register(Box::new(passes.clone()))?;

        let skipped = IntCounter::with_opts(Opts::new(
            "hive_agent_passes_skipped_total",
            "Convergence passes skipped because the model was unreadable",
        ))?;
        registry.register(Box::new(skipped.clone()))?;

        let duration = Histogram::with_opts(
            HistogramOpts::new(
                "hive_agent_pass_duration_seconds",
                "Duration of a convergence pass",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(duration.clone()))?;

        let actions = IntCounterVec::new(
            Opts::new(
                "hive_agent_supervisor_actions_total",
                "Supervisor calls issued by the agent",
            ),
            &["action"],
        )?;
        registry.register(Box::new(actions.clone()))?;
        // Export every label from the first scrape on.
        for action in SupervisorAction::ALL {
            actions.with_label_values(&[action.as_str()]);
        }

        let live = IntGauge::with_opts(Opts::new(
            "hive_agent_live_supervisors",
            "Supervisors tracked after the last pass",
        ))?;
        registry.register(Box::new(live.clone()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                passes,
                skipped,
                duration,
                actions,
                live,
            }),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.inner.registry.gather()
    }

    /// Text exposition format, ready to serve on `/metrics`.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        if let Err(e) = encoder.encode(&self.gather(), &mut buf) {
            warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

impl AgentMetrics for PrometheusMetrics {
    fn pass_completed(&self, duration: Duration, live: usize) {
        self.inner.passes.inc();
        self.inner.duration.observe(duration.as_secs_f64());
        self.inner.live.set(i64::try_from(live).unwrap_or(i64::MAX));
    }

    fn pass_skipped(&self) {
        self.inner.skipped.inc();
    }

    fn supervisor_action(&self, action: SupervisorAction) {
        self.inner
            .actions
            .with_label_values(&[action.as_str()])
            .inc();
    }
}
