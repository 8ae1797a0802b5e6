//! Allocation plan model.
//!
//! A plan is the output of an external capacity optimizer: an ordered sequence
//! of phases, each fixing the active instance fleet and the expected arrival
//! rate for a contiguous interval of simulated time. The plan is validated
//! once on load and immutable afterwards.

use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::simulation::EPSILON;

/// Instance type referenced by phase fleets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceType {
    /// Type name, e.g. `m4.large`.
    pub name: String,
    /// Sustained throughput of a single instance, in requests per second.
    /// Used as the rate parameter when sampling service durations.
    pub service_rate: f64,
    /// Billed price of a single instance per second of simulated time,
    /// incurred regardless of utilization.
    pub cost_rate: f64,
    /// Maximum number of requests served concurrently by one instance.
    #[serde(default = "default_capacity")]
    pub capacity: u32,
}

fn default_capacity() -> u32 {
    1
}

/// One fleet entry of a phase, referencing an instance type by name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FleetEntry {
    pub instance_type: String,
    pub count: u32,
}

/// YAML-serializable phase description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub start_time: f64,
    pub end_time: f64,
    /// Mean request arrival rate during this phase, in requests per second.
    pub arrival_rate: f64,
    #[serde(default)]
    pub fleet: Vec<FleetEntry>,
}

/// YAML-serializable plan, the raw shape produced by the external optimizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanSpec {
    pub instance_types: Vec<InstanceType>,
    pub phases: Vec<PhaseSpec>,
}

/// Validated phase with fleet entries resolved to type ids.
#[derive(Clone, Debug)]
pub struct Phase {
    pub start_time: f64,
    /// End of the phase interval, exclusive.
    pub end_time: f64,
    pub arrival_rate: f64,
    /// Pairs of (type id, instance count).
    pub fleet: Vec<(usize, u32)>,
}

impl Phase {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn contains(&self, time: f64) -> bool {
        self.start_time <= time && time < self.end_time
    }
}

/// Validated allocation plan.
#[derive(Clone, Debug)]
pub struct Plan {
    types: Vec<InstanceType>,
    phases: Vec<Phase>,
}

impl Plan {
    /// Reads and validates a plan from a YAML file.
    pub fn from_file(path: &str) -> Result<Self, Error> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::InvalidPlan(format!("can't read plan file {}: {}", path, e)))?;
        let spec: PlanSpec = serde_yaml::from_str(&content)
            .map_err(|e| Error::InvalidPlan(format!("can't parse plan file {}: {}", path, e)))?;
        Self::from_spec(spec)
    }

    /// Validates an in-memory plan description.
    pub fn from_spec(spec: PlanSpec) -> Result<Self, Error> {
        if spec.instance_types.is_empty() {
            return Err(Error::InvalidPlan("no instance types declared".to_string()));
        }
        if spec.phases.is_empty() {
            return Err(Error::InvalidPlan("no phases declared".to_string()));
        }
        for t in &spec.instance_types {
            if t.service_rate <= 0. {
                return Err(Error::InvalidPlan(format!(
                    "instance type {} has non-positive service rate {}",
                    t.name, t.service_rate
                )));
            }
            if t.cost_rate < 0. {
                return Err(Error::InvalidPlan(format!(
                    "instance type {} has negative cost rate {}",
                    t.name, t.cost_rate
                )));
            }
            if t.capacity == 0 {
                return Err(Error::InvalidPlan(format!("instance type {} has zero capacity", t.name)));
            }
            if spec.instance_types.iter().filter(|other| other.name == t.name).count() > 1 {
                return Err(Error::InvalidPlan(format!("duplicate instance type {}", t.name)));
            }
        }

        let mut phases = Vec::with_capacity(spec.phases.len());
        for (index, phase) in spec.phases.iter().enumerate() {
            if index == 0 && phase.start_time.abs() > EPSILON {
                return Err(Error::InvalidPlan(format!(
                    "first phase must start at 0, starts at {}",
                    phase.start_time
                )));
            }
            if index > 0 && (phase.start_time - spec.phases[index - 1].end_time).abs() > EPSILON {
                return Err(Error::InvalidPlan(format!(
                    "phase {} starts at {} but the previous phase ends at {}",
                    index,
                    phase.start_time,
                    spec.phases[index - 1].end_time
                )));
            }
            if phase.end_time <= phase.start_time {
                return Err(Error::InvalidPlan(format!(
                    "phase {} has non-positive duration ({} to {})",
                    index, phase.start_time, phase.end_time
                )));
            }
            if phase.arrival_rate <= 0. {
                return Err(Error::InvalidPlan(format!(
                    "phase {} has non-positive arrival rate {}",
                    index, phase.arrival_rate
                )));
            }
            let mut fleet = Vec::with_capacity(phase.fleet.len());
            for entry in &phase.fleet {
                let type_id = spec
                    .instance_types
                    .iter()
                    .position(|t| t.name == entry.instance_type)
                    .ok_or_else(|| {
                        Error::InvalidPlan(format!(
                            "phase {} references unknown instance type {}",
                            index, entry.instance_type
                        ))
                    })?;
                if fleet.iter().any(|&(id, _)| id == type_id) {
                    return Err(Error::InvalidPlan(format!(
                        "phase {} lists instance type {} twice",
                        index, entry.instance_type
                    )));
                }
                fleet.push((type_id, entry.count));
            }
            phases.push(Phase {
                start_time: phase.start_time,
                end_time: phase.end_time,
                arrival_rate: phase.arrival_rate,
                fleet,
            });
        }

        Ok(Self {
            types: spec.instance_types,
            phases,
        })
    }

    pub fn types(&self) -> &[InstanceType] {
        &self.types
    }

    pub fn instance_type(&self, type_id: usize) -> &InstanceType {
        &self.types[type_id]
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn phase(&self, index: usize) -> &Phase {
        &self.phases[index]
    }

    /// End of the last phase, bounding the simulated time the plan covers.
    pub fn horizon(&self) -> f64 {
        self.phases[self.phases.len() - 1].end_time
    }

    /// Returns the index of the phase whose interval contains `time`.
    pub fn phase_index_at(&self, time: f64) -> Result<usize, Error> {
        let index = self.phases.partition_point(|p| p.end_time <= time);
        if index == self.phases.len() {
            return Err(Error::OutOfHorizon(time));
        }
        Ok(index)
    }

    /// Returns the phase whose interval contains `time`.
    pub fn phase_at(&self, time: f64) -> Result<&Phase, Error> {
        Ok(&self.phases[self.phase_index_at(time)?])
    }

    /// Billed cost of running the planned fleets up to `until`: the sum over
    /// phases of phase duration times the per-second cost of every planned
    /// instance. Independent of how many requests the fleet actually serves.
    pub fn total_cost(&self, until: f64) -> f64 {
        let mut cost = 0.;
        for phase in &self.phases {
            let duration = (phase.end_time.min(until) - phase.start_time).max(0.);
            let rate: f64 = phase
                .fleet
                .iter()
                .map(|&(type_id, count)| count as f64 * self.types[type_id].cost_rate)
                .sum();
            cost += duration * rate;
        }
        cost
    }
}
