use lazy_static::lazy_static;
use prometheus::{Counter, Histogram, register_counter, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("page_requests_total", "Total number of generate requests").unwrap();
    pub static ref REQUEST_REJECTED: Counter =
        register_counter!("page_requests_rejected_total", "Requests rejected before generation").unwrap();
    pub static ref GENERATIONS_COMPLETED: Counter =
        register_counter!("page_generations_completed_total", "Streams that ran to completion").unwrap();
    pub static ref GENERATIONS_FAILED: Counter =
        register_counter!("page_generations_failed_total", "Streams that failed or timed out").unwrap();
    pub static ref CACHE_WRITES: Counter =
        register_counter!("page_cache_writes_total", "Generated pages stored").unwrap();
    pub static ref CACHE_WRITE_FAILURES: Counter =
        register_counter!("page_cache_write_failures_total", "Failed page store writes").unwrap();
    pub static ref CACHE_SKIPPED: Counter =
        register_counter!("page_cache_skipped_total", "Generations without a cache key").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "page_request_latency_seconds",
        "Time from request receipt to end of stream in seconds"
    )
    .unwrap();
}
