//! Request model and registry.

use std::ops::{Index, IndexMut};

use serde::Serialize;

use crate::pool::InstanceId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// The request is registered but its arrival time has not been reached.
    NotArrived,
    /// Waiting for an instance, in a type queue or the blocking queue.
    Queued,
    /// Being served by the assigned instance.
    Running,
    /// Served to completion.
    Completed,
    /// Forcibly finalized at a phase boundary or at the horizon.
    Truncated,
    /// Rejected on arrival under the drop policy.
    Dropped,
}

#[derive(Clone, Debug, Serialize)]
pub struct Request {
    pub id: u64,
    pub arrival_time: f64,
    pub phase_at_arrival: usize,
    pub status: RequestStatus,
    pub instance: Option<InstanceId>,
    pub service_start_time: Option<f64>,
    /// Sampled service duration; the request completes normally exactly this
    /// long after its service starts.
    pub service_duration: Option<f64>,
    pub completion_time: Option<f64>,
    /// Set under the block policy when the request waited in the global queue.
    pub blocked: bool,
}

impl Request {
    pub fn response_time(&self) -> f64 {
        self.completion_time.unwrap() - self.arrival_time
    }

    pub fn wait_time(&self) -> f64 {
        self.service_start_time.unwrap() - self.arrival_time
    }

    pub fn is_finalized(&self) -> bool {
        matches!(
            self.status,
            RequestStatus::Completed | RequestStatus::Truncated | RequestStatus::Dropped
        )
    }
}

#[derive(Default)]
pub struct RequestRegistry {
    requests: Vec<Request>,
}

impl RequestRegistry {
    pub fn add_request(&mut self, arrival_time: f64, phase_at_arrival: usize) -> u64 {
        let id = self.requests.len() as u64;
        self.requests.push(Request {
            id,
            arrival_time,
            phase_at_arrival,
            status: RequestStatus::NotArrived,
            instance: None,
            service_start_time: None,
            service_duration: None,
            completion_time: None,
            blocked: false,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn take(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }
}

impl Index<u64> for RequestRegistry {
    type Output = Request;

    fn index(&self, index: u64) -> &Self::Output {
        &self.requests[index as usize]
    }
}

impl IndexMut<u64> for RequestRegistry {
    fn index_mut(&mut self, index: u64) -> &mut Self::Output {
        &mut self.requests[index as usize]
    }
}
