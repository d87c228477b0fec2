//! Storage-layer metrics, gated behind the `metrics` feature.
//!
//! Mirrors the describe-once-then-record pattern: a `lazy_static!` block
//! registers every metric name and help text exactly once, and the
//! recording functions are cheap enough to call on every layer operation.

use lazy_static::lazy_static;

lazy_static! {
    static ref DESCRIBE: () = {
        metrics::describe_counter!("cachekit_storage_layer_hits_total", "Storage layer hits by layer id.");
        metrics::describe_counter!("cachekit_storage_layer_misses_total", "Storage layer misses by layer id.");
        metrics::describe_counter!(
            "cachekit_storage_layer_errors_total",
            "Storage layer operation failures by layer id."
        );
        metrics::describe_counter!(
            "cachekit_storage_write_queue_rejected_total",
            "Writes rejected by a full async write queue, by layer id."
        );
        metrics::describe_histogram!(
            "cachekit_storage_layer_op_duration_seconds",
            "Latency of a single storage layer operation, by layer id and op."
        );
    };
}

fn ensure_described() {
    lazy_static::initialize(&DESCRIBE);
}

/// Records a layer hit.
pub fn record_hit(layer_id: &str) {
    ensure_described();
    metrics::counter!("cachekit_storage_layer_hits_total", "layer" => layer_id.to_string()).increment(1);
}

/// Records a layer miss.
pub fn record_miss(layer_id: &str) {
    ensure_described();
    metrics::counter!("cachekit_storage_layer_misses_total", "layer" => layer_id.to_string()).increment(1);
}

/// Records a layer operation failure.
pub fn record_error(layer_id: &str) {
    ensure_described();
    metrics::counter!("cachekit_storage_layer_errors_total", "layer" => layer_id.to_string()).increment(1);
}

/// Records an async write queue rejecting a write for being full.
pub fn record_queue_rejected(layer_id: &str) {
    ensure_described();
    metrics::counter!("cachekit_storage_write_queue_rejected_total", "layer" => layer_id.to_string())
        .increment(1);
}

/// Records the duration of a single layer operation.
pub fn record_op_duration(layer_id: &str, op: &'static str, duration: std::time::Duration) {
    ensure_described();
    metrics::histogram!(
        "cachekit_storage_layer_op_duration_seconds",
        "layer" => layer_id.to_string(),
        "op" => op
    )
    .record(duration.as_secs_f64());
}
