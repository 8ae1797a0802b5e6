//! Metrics collection and aggregate statistics.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::event::EventRecord;
use crate::plan::Plan;
use crate::pool::InstanceUsage;
use crate::request::{Request, RequestStatus};

/// Accumulates per-request outcomes during the run; turned into the immutable
/// [`SimulationResult`] once the scheduler terminates.
pub struct MetricsCollector {
    completed_by_phase: Vec<u64>,
    response_times: Vec<f64>,
    completed: u64,
    truncated: u64,
    dropped: u64,
    blocked: u64,
}

impl MetricsCollector {
    pub fn new(phase_count: usize) -> Self {
        Self {
            completed_by_phase: vec![0; phase_count],
            response_times: Vec::new(),
            completed: 0,
            truncated: 0,
            dropped: 0,
            blocked: 0,
        }
    }

    /// Records a finalized request. Called exactly once per request;
    /// `phase_index` is the phase active at finalization time.
    pub fn record(&mut self, request: &Request, phase_index: usize) {
        debug_assert!(request.is_finalized());
        match request.status {
            RequestStatus::Completed => {
                self.completed += 1;
                self.completed_by_phase[phase_index] += 1;
                self.response_times.push(request.response_time());
            }
            RequestStatus::Truncated => self.truncated += 1,
            RequestStatus::Dropped => self.dropped += 1,
            _ => {}
        }
        if request.blocked {
            self.blocked += 1;
        }
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn truncated(&self) -> u64 {
        self.truncated
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Builds the final result. Response-time statistics cover completed
    /// requests only; cost comes from the plan and is independent of the
    /// served volume.
    pub fn summarize(
        &self,
        records: Vec<Request>,
        instance_usage: Vec<InstanceUsage>,
        plan: &Plan,
        horizon: f64,
        event_log: Option<Vec<EventRecord>>,
    ) -> SimulationResult {
        let mut sorted = self.response_times.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mean_utilization = if instance_usage.is_empty() {
            0.
        } else {
            instance_usage.iter().map(|u| u.utilization).sum::<f64>() / instance_usage.len() as f64
        };

        let throughput_per_phase = plan
            .phases()
            .iter()
            .enumerate()
            .map(|(index, phase)| {
                let duration = (phase.end_time.min(horizon) - phase.start_time).max(0.);
                if duration > 0. {
                    self.completed_by_phase[index] as f64 / duration
                } else {
                    0.
                }
            })
            .collect();

        let stats = SimulationStats {
            requests_injected: records.len() as u64,
            requests_completed: self.completed,
            requests_truncated: self.truncated,
            requests_dropped: self.dropped,
            requests_blocked: self.blocked,
            avg_response_time: if sorted.is_empty() {
                0.
            } else {
                sorted.iter().sum::<f64>() / sorted.len() as f64
            },
            min_response_time: sorted.first().copied().unwrap_or(0.),
            max_response_time: sorted.last().copied().unwrap_or(0.),
            median_response_time: percentile(&sorted, 50.),
            p90_response_time: percentile(&sorted, 90.),
            p95_response_time: percentile(&sorted, 95.),
            total_cost: plan.total_cost(horizon),
            mean_utilization,
            throughput_per_phase,
        };

        SimulationResult {
            stats,
            records,
            instance_usage,
            event_log,
        }
    }
}

/// Percentile with linear interpolation between order statistics.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.;
    }
    let pos = q / 100. * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Aggregate statistics of one simulation run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationStats {
    pub requests_injected: u64,
    pub requests_completed: u64,
    pub requests_truncated: u64,
    pub requests_dropped: u64,
    /// Requests that waited in the global queue under the block policy.
    pub requests_blocked: u64,
    pub avg_response_time: f64,
    pub min_response_time: f64,
    pub max_response_time: f64,
    pub median_response_time: f64,
    pub p90_response_time: f64,
    pub p95_response_time: f64,
    /// Billed infrastructure cost over the simulated horizon.
    pub total_cost: f64,
    pub mean_utilization: f64,
    /// Completed requests per second of each phase.
    pub throughput_per_phase: Vec<f64>,
}

impl Display for SimulationStats {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        writeln!(
            f,
            "Requests: injected: {}. completed: {}. truncated: {}. dropped: {}. blocked: {}.",
            self.requests_injected,
            self.requests_completed,
            self.requests_truncated,
            self.requests_dropped,
            self.requests_blocked
        )?;
        writeln!(
            f,
            "Response time: avg: {:.4} s, min: {:.4} s, max: {:.4} s, median: {:.4} s, p90: {:.4} s, p95: {:.4} s",
            self.avg_response_time,
            self.min_response_time,
            self.max_response_time,
            self.median_response_time,
            self.p90_response_time,
            self.p95_response_time
        )?;
        write!(
            f,
            "Cost: {:.2}. Utilization: {:.2}",
            self.total_cost, self.mean_utilization
        )
    }
}

/// Finalized outcome of a simulation run: the ordered per-request records,
/// the aggregates derived from them and, when requested, the full event
/// trace. Created once at simulation end and immutable afterwards.
#[derive(Clone, Debug, Serialize)]
pub struct SimulationResult {
    pub stats: SimulationStats,
    pub records: Vec<Request>,
    pub instance_usage: Vec<InstanceUsage>,
    pub event_log: Option<Vec<EventRecord>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_between_order_statistics() {
        let data = vec![1., 2., 3., 4.];
        assert_eq!(percentile(&data, 0.), 1.);
        assert_eq!(percentile(&data, 100.), 4.);
        assert_eq!(percentile(&data, 50.), 2.5);
        assert!((percentile(&data, 90.) - 3.7).abs() < 1e-12);
    }

    #[test]
    fn percentile_of_empty_sample_is_zero() {
        assert_eq!(percentile(&[], 95.), 0.);
    }
}
