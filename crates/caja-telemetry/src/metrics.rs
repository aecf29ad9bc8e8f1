use caja_core::events::SessionEvent;
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricError {
    #[error("failed to create metric '{metric_name}': {source}")]
    CreateMetric {
        metric_name: String,
        source: prometheus::Error,
    },
    #[error("failed to register metric '{metric_name}': {source}")]
    RegisterMetric {
        metric_name: String,
        source: prometheus::Error,
    },
    #[error("failed to encode metrics as prometheus text: {0}")]
    Encode(prometheus::Error),
}

/// Counters derived from the pipeline's session events.
#[derive(Clone)]
pub struct ScanMetrics {
    registry: Registry,
    sessions_started: IntCounter,
    codes_detected: IntCounter,
    scan_failures: IntCounter,
    sessions_stopped: IntCounter,
    active_sessions: IntGauge,
}

impl ScanMetrics {
    pub fn new() -> Result<Self, MetricError> {
        let registry = Registry::new();
        let sessions_started = register_counter(
            &registry,
            "caja_sessions_started_total",
            "Scan sessions that reached the scanning phase",
        )?;
        let codes_detected = register_counter(
            &registry,
            "caja_codes_detected_total",
            "Barcodes successfully decoded and reported",
        )?;
        let scan_failures = register_counter(
            &registry,
            "caja_scan_failures_total",
            "Scan sessions that ended in a session-fatal error",
        )?;
        let sessions_stopped = register_counter(
            &registry,
            "caja_sessions_stopped_total",
            "Scan sessions that completed teardown",
        )?;

        let gauge_name = "caja_active_sessions";
        let active_sessions = IntGauge::with_opts(Opts::new(
            gauge_name,
            "Scan sessions currently live",
        ))
        .map_err(|source| MetricError::CreateMetric {
            metric_name: gauge_name.to_string(),
            source,
        })?;
        registry
            .register(Box::new(active_sessions.clone()))
            .map_err(|source| MetricError::RegisterMetric {
                metric_name: gauge_name.to_string(),
                source,
            })?;

        Ok(Self {
            registry,
            sessions_started,
            codes_detected,
            scan_failures,
            sessions_stopped,
            active_sessions,
        })
    }

    /// Folds one session event into the counters.
    pub fn observe(&self, event: &SessionEvent) {
        match event {
            SessionEvent::SessionStarted { .. } => {
                self.sessions_started.inc();
                self.active_sessions.inc();
            }
            SessionEvent::CodeDetected { .. } => self.codes_detected.inc(),
            SessionEvent::SessionFailed { .. } => self.scan_failures.inc(),
            SessionEvent::SessionStopped { .. } => {
                self.sessions_stopped.inc();
                if self.active_sessions.get() > 0 {
                    self.active_sessions.dec();
                }
            }
        }
    }

    pub fn sessions_started(&self) -> u64 {
        self.sessions_started.get()
    }

    pub fn codes_detected(&self) -> u64 {
        self.codes_detected.get()
    }

    pub fn scan_failures(&self) -> u64 {
        self.scan_failures.get()
    }

    pub fn active_sessions(&self) -> i64 {
        self.active_sessions.get()
    }

    /// Renders the registry in prometheus text exposition format.
    pub fn export_text(&self) -> Result<String, MetricError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(MetricError::Encode)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn register_counter(
    registry: &Registry,
    name: &str,
    help: &str,
) -> Result<IntCounter, MetricError> {
    let counter =
        IntCounter::with_opts(Opts::new(name, help)).map_err(|source| MetricError::CreateMetric {
            metric_name: name.to_string(),
            source,
        })?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|source| MetricError::RegisterMetric {
            metric_name: name.to_string(),
            source,
        })?;
    Ok(counter)
}
