use lazy_static::lazy_static;
use prometheus::{labels, register_gauge, Gauge};
use tracing::{debug, warn};

use crate::status::{CertStatus, RevocationStatus};

lazy_static! {
    static ref CERTSTATUS_REVOCATION_STATUS: Gauge = register_gauge!(
        "certstatus_revocation_status",
        "certificate revocation status (0 good, 1 unknown, 2 server failed, 3 revoked)"
    )
    .unwrap();
}

/// Gauge value for a status.
pub fn status_value(status: &CertStatus) -> f64 {
    match status {
        CertStatus::Good => 0.0,
        CertStatus::Unknown => 1.0,
        CertStatus::ServerFailed => 2.0,
        CertStatus::Revoked { .. } => 3.0,
    }
}

/// Pushes the result of one check to a Prometheus Push Gateway.
///
/// A failed push is logged and otherwise ignored.
/// # Arguments
/// * `status` - result of the check
/// * `prometheus_address` - push gateway base address
pub fn push_status(status: &RevocationStatus, prometheus_address: &str) {
    CERTSTATUS_REVOCATION_STATUS.set(status_value(&status.status));

    let metric_families = prometheus::gather();
    let pushed = prometheus::push_metrics(
        "certstatus",
        labels! {
            "instance".to_owned() => "certstatus".to_owned(),
            "serial".to_owned() => status.serial_number.to_string(),
            "protocol".to_owned() => status.protocol.to_string().to_lowercase(),
        },
        &format!("{}/metrics/job", prometheus_address.trim_end_matches('/')),
        metric_families,
        None,
    );

    match pushed {
        Ok(_) => debug!(address = prometheus_address, "pushed metrics"),
        Err(e) => warn!(address = prometheus_address, error = %e, "failed to push metrics to prometheus"),
    }
}
