//! Simulation events.

use std::cmp::Ordering;

use serde::Serialize;

use crate::pool::InstanceId;

/// The closed set of events driving the simulation. The scheduler matches on
/// this union exhaustively in its dispatch step.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Arrival { request_id: u64 },
    Completion { request_id: u64, instance: InstanceId },
    PhaseChange { phase_index: usize },
}

impl Event {
    /// Dispatch rank at equal times: arrivals before completions before phase
    /// changes.
    fn rank(&self) -> u8 {
        match self {
            Event::Arrival { .. } => 0,
            Event::Completion { .. } => 1,
            Event::PhaseChange { .. } => 2,
        }
    }
}

/// An event together with its scheduled time and insertion sequence number.
#[derive(Clone, Debug)]
pub struct ScheduledEvent {
    pub time: f64,
    pub seq: u64,
    pub event: Event,
}

impl Eq for ScheduledEvent {}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

// The ordering is inverted to make BinaryHeap pop the earliest event.
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.event.rank().cmp(&self.event.rank()))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One line of the ordered event trace kept when `save_event_log` is set.
/// Flat so that external writers can export it as tabular data directly.
#[derive(Clone, Debug, Serialize)]
pub struct EventRecord {
    pub time: f64,
    pub seq: u64,
    pub kind: &'static str,
    pub request_id: Option<u64>,
    pub instance_type: Option<usize>,
    pub instance_index: Option<u32>,
    pub phase_index: Option<usize>,
}

impl EventRecord {
    pub fn new(scheduled: &ScheduledEvent) -> Self {
        let mut record = Self {
            time: scheduled.time,
            seq: scheduled.seq,
            kind: "",
            request_id: None,
            instance_type: None,
            instance_index: None,
            phase_index: None,
        };
        match scheduled.event {
            Event::Arrival { request_id } => {
                record.kind = "arrival";
                record.request_id = Some(request_id);
            }
            Event::Completion { request_id, instance } => {
                record.kind = "completion";
                record.request_id = Some(request_id);
                record.instance_type = Some(instance.type_id);
                record.instance_index = Some(instance.index);
            }
            Event::PhaseChange { phase_index } => {
                record.kind = "phase_change";
                record.phase_index = Some(phase_index);
            }
        }
        record
    }
}
