//! Manager-level counters, behind the `metrics` feature.

use lazy_static::lazy_static;

lazy_static! {
    static ref DESCRIBE: () = {
        metrics::describe_counter!("cachekit_manager_hits_total", "Reads served from storage without invoking a factory.");
        metrics::describe_counter!(
            "cachekit_manager_hit_after_wait_total",
            "Reads served by awaiting another in-flight factory call for the same key."
        );
        metrics::describe_counter!("cachekit_manager_misses_total", "Reads that invoked a factory.");
        metrics::describe_counter!("cachekit_manager_errors_total", "Factory invocations that returned an error.");
    };
}

fn ensure_described() {
    lazy_static::initialize(&DESCRIBE);
}

/// A read served directly from storage.
pub fn record_hit(method_id: &str) {
    ensure_described();
    metrics::counter!("cachekit_manager_hits_total", "method" => method_id.to_string()).increment(1);
}

/// A read served by awaiting another in-flight call for the same key.
pub fn record_hit_after_wait(method_id: &str) {
    ensure_described();
    metrics::counter!("cachekit_manager_hit_after_wait_total", "method" => method_id.to_string()).increment(1);
}

/// A read that invoked the factory and wrote the result through.
pub fn record_miss(method_id: &str) {
    ensure_described();
    metrics::counter!("cachekit_manager_misses_total", "method" => method_id.to_string()).increment(1);
}

/// A factory invocation that returned an error.
pub fn record_error(method_id: &str) {
    ensure_described();
    metrics::counter!("cachekit_manager_errors_total", "method" => method_id.to_string()).increment(1);
}
