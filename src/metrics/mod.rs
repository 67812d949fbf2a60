//! Prometheus metrics for the push gateway client.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "apns";

lazy_static! {
    /// Number of gateway connections currently alive
    pub static ref CONNECTIONS_ALIVE: IntGauge = register_int_gauge!(
        format!("{}_connections_alive", METRIC_PREFIX),
        "Number of gateway connections currently alive"
    ).unwrap();

    /// Total notifications written to a transport
    pub static ref MESSAGES_SENT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_sent_total", METRIC_PREFIX),
        "Total notifications written to a transport"
    ).unwrap();

    /// Total transport write failures
    pub static ref SEND_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_send_failures_total", METRIC_PREFIX),
        "Total transport write failures"
    ).unwrap();

    /// Total asynchronous error frames received from the gateway
    pub static ref ERROR_FRAMES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_error_frames_total", METRIC_PREFIX),
        "Total asynchronous error frames received from the gateway"
    ).unwrap();

    /// Total feedback records collected
    pub static ref FEEDBACK_RECORDS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_feedback_records_total", METRIC_PREFIX),
        "Total feedback records collected"
    ).unwrap();
}

/// Encode all registered metrics in the Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
