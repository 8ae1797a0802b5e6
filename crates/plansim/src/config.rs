//! Simulation configuration.

use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// What happens to an arrival when every instance in the active fleet is
/// saturated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePolicy {
    /// The request waits in an unbounded FIFO queue per instance type and is
    /// retried when an instance of that type completes a request.
    Queue,
    /// The request is rejected immediately and recorded as dropped.
    Drop,
    /// The request waits in a single global FIFO; only its head may take
    /// freed capacity, so later requests cannot overtake it.
    Block,
}

/// Distribution used to sample per-request service durations from the
/// assigned instance's service rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceModel {
    /// Duration ~ Exp(service_rate).
    Exponential,
    /// Duration = 1 / service_rate for every request.
    Deterministic,
}

/// Simulation configuration. Unknown keys in the YAML source are ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Simulated duration in seconds; the plan horizon is used when absent.
    /// May shorten the horizon but never extend it past the plan.
    #[serde(default)]
    pub workload_length: Option<f64>,
    /// Seed of the simulation-wide random number generator.
    #[serde(default = "default_seed")]
    pub random_seed: u64,
    #[serde(default = "default_queue_policy")]
    pub queue_policy: QueuePolicy,
    #[serde(default = "default_service_model")]
    pub service_model: ServiceModel,
    /// Keep the full ordered event trace in the simulation result.
    #[serde(default)]
    pub save_event_log: bool,
}

fn default_seed() -> u64 {
    123
}

fn default_queue_policy() -> QueuePolicy {
    QueuePolicy::Queue
}

fn default_service_model() -> ServiceModel {
    ServiceModel::Exponential
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            workload_length: None,
            random_seed: default_seed(),
            queue_policy: default_queue_policy(),
            service_model: default_service_model(),
            save_event_log: false,
        }
    }
}

impl SimulationConfig {
    /// Reads the configuration from a YAML file, using default values for
    /// absent parameters.
    pub fn from_file(path: &str) -> Result<Self, Error> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("can't read config file {}: {}", path, e)))?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("can't parse config file {}: {}", path, e)))
    }
}
