//! Metrics export.
//!
//! - `prom` - Prometheus Push Gateway integration

pub mod prom;
