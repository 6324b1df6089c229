//! Logging and metrics initialization.
//!
//! Logs go to stdout through a `tracing-subscriber` fmt layer filtered by `RUST_LOG` (default
//! `info`). Metrics are recorded through the `metrics` facade and rendered in the Prometheus text
//! format when `enable_metrics` is set:
//!
//! - `aclgate_auth_attempts_total{handler, outcome}`: identity handler attempts, with `outcome`
//!   one of `success`, `no_match` or `error`
//! - `aclgate_unknown_identifier_type_total{identifier_type}`: role mapping records skipped for
//!   an unrecognised identifier type
//! - `aclgate_acl_lookup_failures_total`: ACL store queries that failed

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize console logging
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}

/// Install the global Prometheus recorder on first call and return its handle.
///
/// Only one recorder can be installed per process, so every caller shares the same handle.
pub fn get_or_install_prometheus_handle() -> anyhow::Result<PrometheusHandle> {
    PROMETHEUS_HANDLE
        .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
        .cloned()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {e}"))
}
