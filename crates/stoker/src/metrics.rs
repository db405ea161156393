//! Metrics for queue throughput and process liveness.
//!
//! Only the `metrics` facade crate is used here; there is no HTTP surface in
//! this crate to host a Prometheus exporter on. Embedding applications that
//! install their own exporter (e.g. `metrics-exporter-prometheus`) will see
//! these series populate transparently.

use metrics::{counter, describe_counter, describe_gauge, gauge};

pub mod names {
    pub const JOBS_ENQUEUED_TOTAL: &str = "stoker_jobs_enqueued_total";
    pub const JOBS_DEDUP_REJECTED_TOTAL: &str = "stoker_jobs_dedup_rejected_total";
    pub const JOBS_DISPATCHED_TOTAL: &str = "stoker_jobs_dispatched_total";
    pub const JOBS_SUCCEEDED_TOTAL: &str = "stoker_jobs_succeeded_total";
    pub const JOBS_FAILED_TOTAL: &str = "stoker_jobs_failed_total";
    pub const DELAY_PROMOTED_TOTAL: &str = "stoker_delay_promoted_total";

    pub const WORKERS_ACTIVE: &str = "stoker_workers_active";
    pub const MASTER_IS_LEADER: &str = "stoker_master_is_leader";
}

/// Register all metric descriptions. Call once at process start.
pub fn register_metrics() {
    describe_counter!(names::JOBS_ENQUEUED_TOTAL, "Total jobs enqueued by lane");
    describe_counter!(
        names::JOBS_DEDUP_REJECTED_TOTAL,
        "Total unique-mode submissions rejected by dedup"
    );
    describe_counter!(
        names::JOBS_DISPATCHED_TOTAL,
        "Total jobs handed to the dispatcher"
    );
    describe_counter!(names::JOBS_SUCCEEDED_TOTAL, "Total successful dispatches");
    describe_counter!(names::JOBS_FAILED_TOTAL, "Total failed dispatches");
    describe_counter!(
        names::DELAY_PROMOTED_TOTAL,
        "Total delayed jobs promoted to the realtime lane"
    );
    describe_gauge!(names::WORKERS_ACTIVE, "Live watch-hash entries on this host");
    describe_gauge!(
        names::MASTER_IS_LEADER,
        "Whether this process holds the master lock (1) or not (0)"
    );
}

#[derive(Clone, Copy)]
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn job_enqueued(queue: &str, group: &str, lane: &str) {
        counter!(
            names::JOBS_ENQUEUED_TOTAL,
            "queue" => queue.to_string(),
            "group" => group.to_string(),
            "lane" => lane.to_string()
        )
        .increment(1);
    }

    pub fn dedup_rejected(queue: &str) {
        counter!(names::JOBS_DEDUP_REJECTED_TOTAL, "queue" => queue.to_string()).increment(1);
    }

    pub fn dispatched(queue: &str, group: &str) {
        counter!(
            names::JOBS_DISPATCHED_TOTAL,
            "queue" => queue.to_string(),
            "group" => group.to_string()
        )
        .increment(1);
    }

    pub fn succeeded(queue: &str, group: &str) {
        counter!(
            names::JOBS_SUCCEEDED_TOTAL,
            "queue" => queue.to_string(),
            "group" => group.to_string()
        )
        .increment(1);
    }

    pub fn failed(queue: &str, group: &str) {
        counter!(
            names::JOBS_FAILED_TOTAL,
            "queue" => queue.to_string(),
            "group" => group.to_string()
        )
        .increment(1);
    }

    pub fn delay_promoted(queue: &str, count: u64) {
        counter!(names::DELAY_PROMOTED_TOTAL, "queue" => queue.to_string()).increment(count);
    }

    pub fn update_workers(queue: &str, active: u64) {
        gauge!(names::WORKERS_ACTIVE, "queue" => queue.to_string()).set(active as f64);
    }

    pub fn update_leader_status(queue: &str, is_leader: bool) {
        gauge!(names::MASTER_IS_LEADER, "queue" => queue.to_string())
            .set(if is_leader { 1.0 } else { 0.0 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_does_not_panic() {
        register_metrics();
        QueueMetrics::job_enqueued("main", "g", "realtime");
        QueueMetrics::dedup_rejected("main");
        QueueMetrics::dispatched("main", "g");
        QueueMetrics::succeeded("main", "g");
        QueueMetrics::failed("main", "g");
        QueueMetrics::delay_promoted("main", 3);
        QueueMetrics::update_workers("main", 2);
        QueueMetrics::update_leader_status("main", true);
    }
}
