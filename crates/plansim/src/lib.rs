#![doc = include_str!("../readme.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod experiment;
pub mod log;
pub mod metrics;
pub mod plan;
pub mod pool;
pub mod request;
pub mod simulation;
pub mod workload;

pub use colored;

pub use config::{QueuePolicy, ServiceModel, SimulationConfig};
pub use error::Error;
pub use event::{Event, EventRecord, ScheduledEvent};
pub use metrics::{SimulationResult, SimulationStats};
pub use plan::{FleetEntry, InstanceType, Phase, PhaseSpec, Plan, PlanSpec};
pub use pool::{InstanceId, InstanceUsage};
pub use request::{Request, RequestStatus};
pub use simulation::{Simulation, EPSILON};
