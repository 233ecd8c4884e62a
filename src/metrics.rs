//! Prometheus metrics for the swap bridge
//!
//! Registered in the default registry and exposed on the /metrics endpoint.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge_vec, Counter, CounterVec, Encoder,
    GaugeVec, TextEncoder,
};

lazy_static! {
    // Admin channel
    pub static ref ADMIN_CALLS: CounterVec = register_counter_vec!(
        "swap_bridge_admin_calls_total",
        "Total number of authorized admin calls",
        &["method", "result"]
    ).unwrap();

    pub static ref ADMIN_REJECTIONS: CounterVec = register_counter_vec!(
        "swap_bridge_admin_rejections_total",
        "Total number of failed admin calls by error kind",
        &["kind"]
    ).unwrap();

    // Status queries
    pub static ref SWAP_QUERIES: CounterVec = register_counter_vec!(
        "swap_bridge_swap_queries_total",
        "Total number of swap status queries",
        &["kind"]
    ).unwrap();

    // Stuck transaction recovery
    pub static ref REPLACEMENTS: Counter = register_counter!(
        "swap_bridge_replacements_total",
        "Total number of swap tx replacements queued"
    ).unwrap();

    // Chains
    pub static ref LATEST_HEIGHT: GaugeVec = register_gauge_vec!(
        "swap_bridge_latest_height",
        "Latest block height observed by the height watcher",
        &["chain"]
    ).unwrap();
}

/// Record an admin call that passed the authorization gate
pub fn record_admin_call(method: &str, success: bool) {
    let result = if success { "success" } else { "failure" };
    ADMIN_CALLS.with_label_values(&[method, result]).inc();
}

/// Record a failed admin call
pub fn record_admin_rejection(kind: &str) {
    ADMIN_REJECTIONS.with_label_values(&[kind]).inc();
}

/// Record a status query; `kind` is `result`, `pending` or `missing`
pub fn record_swap_query(kind: &str) {
    SWAP_QUERIES.with_label_values(&[kind]).inc();
}

pub fn record_replacement() {
    REPLACEMENTS.inc();
}

pub fn set_latest_height(chain: &str, height: u64) {
    LATEST_HEIGHT.with_label_values(&[chain]).set(height as f64);
}

/// Encode the default registry in the text exposition format
pub fn encode_text() -> Result<(String, Vec<u8>), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_show_up_in_text_output() {
        record_admin_call("blacklist", true);
        record_admin_rejection("authorization");
        record_swap_query("pending");
        record_replacement();
        set_latest_height("ETHEREUM", 42);

        let (content_type, body) = encode_text().unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(content_type.starts_with("text/plain"));
        assert!(text.contains("swap_bridge_admin_calls_total"));
        assert!(text.contains("swap_bridge_replacements_total"));
        assert!(text.contains("swap_bridge_latest_height{chain=\"ETHEREUM\"} 42"));
    }
}
