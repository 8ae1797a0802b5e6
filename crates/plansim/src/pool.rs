//! Instance pool: the per-phase fleet, its queues and usage accounting.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::plan::{Phase, Plan};

/// Identity of an instance: the instance type and the index within that
/// type's fleet. Identities are stable across phases, so an instance survives
/// a phase boundary iff the new phase's count for its type exceeds its index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct InstanceId {
    pub type_id: usize,
    pub index: u32,
}

impl Display for InstanceId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}/{}", self.type_id, self.index)
    }
}

/// A live instance in the current phase.
#[derive(Clone, Debug)]
struct Instance {
    capacity: u32,
    in_flight: u32,
    running: Vec<u64>,
}

/// Lifetime accounting for one instance identity, possibly spanning several
/// non-adjacent phases.
#[derive(Clone, Debug, Default)]
struct UsageAccum {
    active_from: f64,
    active_time: f64,
    busy_time: f64,
    live: bool,
}

/// Per-instance usage record in the simulation result.
#[derive(Clone, Debug, Serialize)]
pub struct InstanceUsage {
    pub type_id: usize,
    pub instance_index: u32,
    /// Total time the identity was part of an active fleet.
    pub active_time: f64,
    /// Total time spent serving requests, partial service included.
    pub busy_time: f64,
    pub utilization: f64,
}

pub struct InstancePool {
    instances: BTreeMap<InstanceId, Instance>,
    usage: BTreeMap<InstanceId, UsageAccum>,
    /// One FIFO per instance type, used under the queue policy.
    type_queues: Vec<VecDeque<u64>>,
    /// Global FIFO used under the block policy.
    blocked: VecDeque<u64>,
    /// Whether the current phase fleet has any instances of each type.
    present: Vec<bool>,
}

impl InstancePool {
    pub fn new(type_count: usize) -> Self {
        Self {
            instances: BTreeMap::new(),
            usage: BTreeMap::new(),
            type_queues: vec![VecDeque::new(); type_count],
            blocked: VecDeque::new(),
            present: vec![false; type_count],
        }
    }

    /// Replaces the active fleet with the given phase's fleet. Surviving
    /// identities keep their in-flight requests; requests stranded on removed
    /// instances are returned so the scheduler can truncate them at the
    /// boundary. Queued requests are left in place.
    pub fn apply_phase(&mut self, time: f64, phase: &Phase, plan: &Plan) -> Vec<u64> {
        let mut desired: BTreeMap<InstanceId, u32> = BTreeMap::new();
        for &(type_id, count) in &phase.fleet {
            for index in 0..count {
                desired.insert(InstanceId { type_id, index }, plan.instance_type(type_id).capacity);
            }
        }

        let mut stranded = Vec::new();
        let removed: Vec<InstanceId> = self
            .instances
            .keys()
            .filter(|id| !desired.contains_key(id))
            .copied()
            .collect();
        for id in removed {
            let instance = self.instances.remove(&id).unwrap();
            stranded.extend(instance.running);
            if let Some(usage) = self.usage.get_mut(&id) {
                usage.active_time += time - usage.active_from;
                usage.live = false;
            }
        }

        for (id, capacity) in desired {
            if !self.instances.contains_key(&id) {
                let usage = self.usage.entry(id).or_default();
                usage.active_from = time;
                usage.live = true;
                self.instances.insert(
                    id,
                    Instance {
                        capacity,
                        in_flight: 0,
                        running: Vec::new(),
                    },
                );
            }
        }

        for type_id in 0..self.present.len() {
            self.present[type_id] = phase.fleet.iter().any(|&(t, count)| t == type_id && count > 0);
        }
        stranded
    }

    /// Assigns the request to the least-loaded unsaturated instance of the
    /// active fleet, ties broken by lowest instance identity. Returns `None`
    /// when every instance is saturated.
    pub fn assign(&mut self, request_id: u64) -> Option<InstanceId> {
        let mut best = None;
        let mut best_load = u32::MAX;
        for (&id, instance) in &self.instances {
            if instance.in_flight < instance.capacity && instance.in_flight < best_load {
                best = Some(id);
                best_load = instance.in_flight;
            }
        }
        let id = best?;
        let instance = self.instances.get_mut(&id).unwrap();
        instance.in_flight += 1;
        instance.running.push(request_id);
        Some(id)
    }

    /// Releases the capacity held by a completed or truncated request and
    /// credits the time it was actually served.
    pub fn release(&mut self, instance_id: InstanceId, request_id: u64, busy: f64) {
        if let Some(instance) = self.instances.get_mut(&instance_id) {
            instance.in_flight -= 1;
            instance.running.retain(|&id| id != request_id);
        }
        self.credit_busy(instance_id, busy);
    }

    /// Adds served time to an instance identity, live or retired.
    pub fn credit_busy(&mut self, instance_id: InstanceId, busy: f64) {
        if let Some(usage) = self.usage.get_mut(&instance_id) {
            usage.busy_time += busy;
        }
    }

    /// Parks a saturated arrival in the FIFO of the instance type with the
    /// shortest queue, preferring types present in the current fleet. Returns
    /// the chosen type id.
    pub fn enqueue(&mut self, request_id: u64) -> usize {
        let candidates: Vec<usize> = if self.present.iter().any(|&p| p) {
            (0..self.type_queues.len()).filter(|&t| self.present[t]).collect()
        } else {
            (0..self.type_queues.len()).collect()
        };
        let mut best = candidates[0];
        for &type_id in &candidates {
            if self.type_queues[type_id].len() < self.type_queues[best].len() {
                best = type_id;
            }
        }
        self.type_queues[best].push_back(request_id);
        best
    }

    /// Pops the head of the given type's queue if an unsaturated instance of
    /// that type exists, assigning it to the least-loaded one.
    pub fn pop_queued_assignable(&mut self, type_id: usize) -> Option<(u64, InstanceId)> {
        if self.type_queues[type_id].is_empty() {
            return None;
        }
        let range = InstanceId { type_id, index: 0 }..=InstanceId {
            type_id,
            index: u32::MAX,
        };
        let mut best = None;
        let mut best_load = u32::MAX;
        for (&id, instance) in self.instances.range(range) {
            if instance.in_flight < instance.capacity && instance.in_flight < best_load {
                best = Some(id);
                best_load = instance.in_flight;
            }
        }
        let id = best?;
        let request_id = self.type_queues[type_id].pop_front().unwrap();
        let instance = self.instances.get_mut(&id).unwrap();
        instance.in_flight += 1;
        instance.running.push(request_id);
        Some((request_id, id))
    }

    pub fn push_blocked(&mut self, request_id: u64) {
        self.blocked.push_back(request_id);
    }

    pub fn blocked_front(&self) -> Option<u64> {
        self.blocked.front().copied()
    }

    pub fn pop_blocked(&mut self) -> Option<u64> {
        self.blocked.pop_front()
    }

    /// Removes and returns every request still waiting in a queue.
    pub fn drain_waiting(&mut self) -> Vec<u64> {
        let mut waiting = Vec::new();
        for queue in &mut self.type_queues {
            waiting.extend(queue.drain(..));
        }
        waiting.extend(self.blocked.drain(..));
        waiting
    }

    /// Requests currently being served, in instance identity order.
    pub fn running_requests(&self) -> Vec<u64> {
        let mut running = Vec::new();
        for instance in self.instances.values() {
            running.extend(instance.running.iter().copied());
        }
        running
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.type_queues.iter().map(|q| q.len()).sum::<usize>() + self.blocked.len()
    }

    /// Closes all open activity segments and produces the usage records.
    pub fn finish(&mut self, time: f64) -> Vec<InstanceUsage> {
        for usage in self.usage.values_mut() {
            if usage.live {
                usage.active_time += time - usage.active_from;
                usage.live = false;
            }
        }
        self.usage
            .iter()
            .map(|(id, usage)| InstanceUsage {
                type_id: id.type_id,
                instance_index: id.index,
                active_time: usage.active_time,
                busy_time: usage.busy_time,
                utilization: if usage.active_time > 0. {
                    usage.busy_time / usage.active_time
                } else {
                    0.
                },
            })
            .collect()
    }
}
