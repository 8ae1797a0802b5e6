//! Simulation engine: clock, event queue and the dispatch loop.
//!
//! The engine is logically single-threaded: all state lives in one
//! [`Simulation`] value, every mutation happens inside the event-processing
//! step, and the only randomness is the simulation-wide seeded generator.
//! Re-running with the same plan, configuration and seed reproduces the
//! result bit for bit. Independent runs (e.g. over several seeds) own
//! independent `Simulation` values and share nothing.

use std::collections::BinaryHeap;

use rand::SeedableRng;
use rand_pcg::Pcg64;

use crate::config::{QueuePolicy, SimulationConfig};
use crate::error::Error;
use crate::event::{Event, EventRecord, ScheduledEvent};
use crate::metrics::{MetricsCollector, SimulationResult};
use crate::plan::Plan;
use crate::pool::{InstanceId, InstancePool};
use crate::request::{RequestRegistry, RequestStatus};
use crate::workload::{sample_service_time, ArrivalStream};
use crate::{log_debug, log_info, log_trace, log_warn};

/// Epsilon to compare simulated times for equality.
pub const EPSILON: f64 = 1e-12;

/// A single simulation run over an allocation plan.
pub struct Simulation {
    clock: f64,
    horizon: f64,
    events: BinaryHeap<ScheduledEvent>,
    event_seq: u64,
    rng: Pcg64,
    plan: Plan,
    config: SimulationConfig,
    pool: InstancePool,
    requests: RequestRegistry,
    metrics: MetricsCollector,
    event_log: Option<Vec<EventRecord>>,
    current_phase: usize,
    result: Option<SimulationResult>,
}

impl Simulation {
    /// Creates a simulation over a validated plan. Fails fast if the
    /// configuration is inconsistent with the plan.
    pub fn new(plan: Plan, config: SimulationConfig) -> Result<Self, Error> {
        let horizon = match config.workload_length {
            Some(length) => {
                if length <= 0. {
                    return Err(Error::InvalidConfig(format!(
                        "workload_length must be positive, got {}",
                        length
                    )));
                }
                if length > plan.horizon() + EPSILON {
                    return Err(Error::InvalidConfig(format!(
                        "workload_length {} exceeds the plan horizon {}",
                        length,
                        plan.horizon()
                    )));
                }
                length
            }
            None => plan.horizon(),
        };
        let pool = InstancePool::new(plan.types().len());
        let metrics = MetricsCollector::new(plan.phases().len());
        let event_log = if config.save_event_log { Some(Vec::new()) } else { None };
        let rng = Pcg64::seed_from_u64(config.random_seed);
        Ok(Self {
            clock: 0.,
            horizon,
            events: BinaryHeap::new(),
            event_seq: 0,
            rng,
            plan,
            config,
            pool,
            requests: RequestRegistry::default(),
            metrics,
            event_log,
            current_phase: 0,
            result: None,
        })
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.clock
    }

    /// Returns the simulated duration of the run.
    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    /// Returns the total number of scheduled events.
    pub fn event_count(&self) -> u64 {
        self.event_seq
    }

    /// Runs the simulation to completion and returns the result. Subsequent
    /// calls return the same result without re-running.
    pub fn run(&mut self) -> &SimulationResult {
        if self.result.is_none() {
            self.execute();
        }
        self.result.as_ref().unwrap()
    }

    /// Runs the simulation and hands over the result.
    pub fn into_result(mut self) -> SimulationResult {
        self.run();
        self.result.unwrap()
    }

    /// Returns the result if the simulation has finished.
    pub fn result(&self) -> Option<&SimulationResult> {
        self.result.as_ref()
    }

    fn execute(&mut self) {
        let stranded = self.pool.apply_phase(0., self.plan.phase(0), &self.plan);
        debug_assert!(stranded.is_empty());
        for index in 1..self.plan.phases().len() {
            let start = self.plan.phase(index).start_time;
            if start < self.horizon {
                self.schedule(start, Event::PhaseChange { phase_index: index });
            }
        }

        // Materialize the arrival stream before the loop: all arrival draws
        // are consumed first, then one service draw per dispatch, keeping the
        // generator consumption order reproducible.
        let arrivals: Vec<f64> = ArrivalStream::new(&self.plan, self.horizon, &mut self.rng).collect();
        for time in arrivals {
            let phase = self.plan.phase_index_at(time).unwrap();
            let request_id = self.requests.add_request(time, phase);
            self.schedule(time, Event::Arrival { request_id });
        }
        log_info!(
            self,
            "generated {} arrivals over a horizon of {:.3} s",
            self.requests.len(),
            self.horizon
        );

        while let Some(scheduled) = self.events.pop() {
            if scheduled.time > self.horizon {
                // only completions can be scheduled past the horizon; the
                // requests they belong to are truncated below
                break;
            }
            if let Event::Completion { request_id, .. } = scheduled.event {
                // stale completion of a request truncated at a phase boundary
                if self.requests[request_id].status != RequestStatus::Running {
                    continue;
                }
            }
            self.clock = scheduled.time;
            if let Some(event_log) = self.event_log.as_mut() {
                event_log.push(EventRecord::new(&scheduled));
            }
            match scheduled.event {
                Event::Arrival { request_id } => self.on_arrival(request_id),
                Event::Completion { request_id, instance } => self.on_completion(request_id, instance),
                Event::PhaseChange { phase_index } => self.on_phase_change(phase_index),
            }
        }
        self.finalize();
    }

    fn schedule(&mut self, time: f64, event: Event) {
        if time < self.clock - EPSILON {
            panic!("event scheduled in the past: {:.3} < {:.3}", time, self.clock);
        }
        self.events.push(ScheduledEvent {
            time,
            seq: self.event_seq,
            event,
        });
        self.event_seq += 1;
    }

    fn on_arrival(&mut self, request_id: u64) {
        if let Some(instance) = self.pool.assign(request_id) {
            self.dispatch(request_id, instance);
            return;
        }
        match self.config.queue_policy {
            QueuePolicy::Queue => {
                self.requests[request_id].status = RequestStatus::Queued;
                let type_id = self.pool.enqueue(request_id);
                log_trace!(self, "request #{} queued for instance type {}", request_id, type_id);
            }
            QueuePolicy::Drop => {
                let request = &mut self.requests[request_id];
                request.status = RequestStatus::Dropped;
                request.completion_time = Some(self.clock);
                self.metrics.record(&self.requests[request_id], self.current_phase);
                log_debug!(self, "request #{} dropped, all instances saturated", request_id);
            }
            QueuePolicy::Block => {
                let request = &mut self.requests[request_id];
                request.status = RequestStatus::Queued;
                request.blocked = true;
                self.pool.push_blocked(request_id);
                log_trace!(self, "request #{} blocked", request_id);
            }
        }
    }

    fn dispatch(&mut self, request_id: u64, instance: InstanceId) {
        let service_rate = self.plan.instance_type(instance.type_id).service_rate;
        let duration = sample_service_time(self.config.service_model, service_rate, &mut self.rng);
        let request = &mut self.requests[request_id];
        request.status = RequestStatus::Running;
        request.instance = Some(instance);
        request.service_start_time = Some(self.clock);
        request.service_duration = Some(duration);
        self.schedule(self.clock + duration, Event::Completion { request_id, instance });
        log_trace!(
            self,
            "request #{} started on instance {} for {:.3} s",
            request_id,
            instance,
            duration
        );
    }

    fn on_completion(&mut self, request_id: u64, instance: InstanceId) {
        let served = {
            let request = &mut self.requests[request_id];
            request.status = RequestStatus::Completed;
            request.completion_time = Some(self.clock);
            request.service_duration.unwrap_or(0.)
        };
        self.pool.release(instance, request_id, served);
        self.metrics.record(&self.requests[request_id], self.current_phase);
        log_trace!(self, "request #{} completed on instance {}", request_id, instance);
        // hand the freed capacity to a waiting request
        match self.config.queue_policy {
            QueuePolicy::Queue => {
                if let Some((next, target)) = self.pool.pop_queued_assignable(instance.type_id) {
                    self.dispatch(next, target);
                }
            }
            QueuePolicy::Block => self.drain_blocked(),
            QueuePolicy::Drop => {}
        }
    }

    fn on_phase_change(&mut self, phase_index: usize) {
        self.current_phase = phase_index;
        let stranded = self.pool.apply_phase(self.clock, self.plan.phase(phase_index), &self.plan);
        let stranded_count = stranded.len();
        for request_id in stranded {
            self.truncate(request_id);
        }
        if stranded_count > 0 {
            log_debug!(
                self,
                "{} in-flight requests truncated at the phase boundary",
                stranded_count
            );
        }
        log_debug!(
            self,
            "entered phase {} with {} instances",
            phase_index,
            self.pool.instance_count()
        );
        // instances provisioned by the new fleet can serve waiting requests
        // right away
        match self.config.queue_policy {
            QueuePolicy::Queue => self.drain_type_queues(),
            QueuePolicy::Block => self.drain_blocked(),
            QueuePolicy::Drop => {}
        }
    }

    // Only the head of the global queue may take freed capacity.
    fn drain_blocked(&mut self) {
        while let Some(head) = self.pool.blocked_front() {
            match self.pool.assign(head) {
                Some(instance) => {
                    self.pool.pop_blocked();
                    self.dispatch(head, instance);
                }
                None => break,
            }
        }
    }

    fn drain_type_queues(&mut self) {
        for type_id in 0..self.plan.types().len() {
            while let Some((request_id, instance)) = self.pool.pop_queued_assignable(type_id) {
                self.dispatch(request_id, instance);
            }
        }
    }

    /// Forcibly finalizes a request at the current time, crediting the
    /// partially served time to its instance.
    fn truncate(&mut self, request_id: u64) {
        let (instance, start) = {
            let request = &mut self.requests[request_id];
            request.status = RequestStatus::Truncated;
            request.completion_time = Some(self.clock);
            (request.instance, request.service_start_time)
        };
        if let (Some(instance), Some(start)) = (instance, start) {
            self.pool.credit_busy(instance, self.clock - start);
        }
        self.metrics.record(&self.requests[request_id], self.current_phase);
    }

    fn finalize(&mut self) {
        self.clock = self.horizon;
        let waiting = self.pool.drain_waiting();
        let running = self.pool.running_requests();
        let unfinished = waiting.len() + running.len();
        for request_id in waiting.into_iter().chain(running) {
            self.truncate(request_id);
        }
        if unfinished > 0 {
            log_debug!(self, "{} unfinished requests truncated at the horizon", unfinished);
        }

        let instance_usage = self.pool.finish(self.horizon);
        let injected = self.requests.len() as u64;
        let finalized = self.metrics.completed() + self.metrics.truncated() + self.metrics.dropped();
        if injected != finalized {
            log_warn!(
                self,
                "{} requests were injected but {} were finalized",
                injected,
                finalized
            );
        }

        let records = self.requests.take();
        let event_log = self.event_log.take();
        let result = self
            .metrics
            .summarize(records, instance_usage, &self.plan, self.horizon, event_log);
        self.result = Some(result);
    }
}
