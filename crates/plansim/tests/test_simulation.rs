use std::collections::HashMap;

use plansim::{
    Error, FleetEntry, InstanceId, InstanceType, PhaseSpec, Plan, PlanSpec, QueuePolicy, RequestStatus, ServiceModel,
    Simulation, SimulationConfig,
};

fn single_phase_plan(arrival_rate: f64, service_rate: f64, capacity: u32, count: u32, horizon: f64) -> Plan {
    Plan::from_spec(PlanSpec {
        instance_types: vec![InstanceType {
            name: "small".to_string(),
            service_rate,
            cost_rate: 0.1,
            capacity,
        }],
        phases: vec![PhaseSpec {
            start_time: 0.,
            end_time: horizon,
            arrival_rate,
            fleet: vec![FleetEntry {
                instance_type: "small".to_string(),
                count,
            }],
        }],
    })
    .unwrap()
}

fn config_with(policy: QueuePolicy, model: ServiceModel, seed: u64) -> SimulationConfig {
    SimulationConfig {
        queue_policy: policy,
        service_model: model,
        random_seed: seed,
        ..Default::default()
    }
}

#[test]
// One instance of capacity 1 at service rate 1/s against 0.5 arrivals per
// second over 100 s: around 50 arrivals, hardly any queueing and essentially
// everything completes within the horizon.
fn light_load_completes_almost_everything() {
    let plan = single_phase_plan(0.5, 1., 1, 1, 100.);
    let config = config_with(QueuePolicy::Queue, ServiceModel::Exponential, 123);
    let mut sim = Simulation::new(plan, config).unwrap();
    let result = sim.run();
    let stats = &result.stats;

    assert!(stats.requests_injected >= 20 && stats.requests_injected <= 90);
    assert_eq!(stats.requests_dropped, 0);
    assert!(stats.requests_truncated <= 15);
    assert!(stats.requests_completed >= stats.requests_injected - 15);
    assert_eq!(
        stats.requests_injected,
        stats.requests_completed + stats.requests_truncated + stats.requests_dropped
    );
    assert!(stats.mean_utilization > 0. && stats.mean_utilization <= 1.);
}

#[test]
// completion_time >= service_start_time >= arrival_time for every completed
// request, and the served interval matches the sampled duration.
fn completed_request_timestamps_are_consistent() {
    let plan = single_phase_plan(2., 1., 2, 2, 50.);
    let config = config_with(QueuePolicy::Queue, ServiceModel::Exponential, 123);
    let mut sim = Simulation::new(plan, config).unwrap();
    let result = sim.run();

    let mut completed = 0;
    for record in &result.records {
        if record.status != RequestStatus::Completed {
            continue;
        }
        completed += 1;
        let start = record.service_start_time.unwrap();
        let end = record.completion_time.unwrap();
        assert!(start >= record.arrival_time);
        assert!(end >= start);
        assert!((end - start - record.service_duration.unwrap()).abs() < 1e-9);
    }
    assert!(completed > 0);
}

#[test]
// Re-running with an identical plan, configuration and seed must reproduce
// the result bit for bit; a different seed must not.
fn identical_runs_are_byte_identical() {
    let run = |seed: u64| {
        let plan = single_phase_plan(2., 1., 2, 2, 100.);
        let config = config_with(QueuePolicy::Queue, ServiceModel::Exponential, seed);
        Simulation::new(plan, config).unwrap().into_result()
    };

    let first = run(123);
    let second = run(123);
    assert_eq!(
        serde_json::to_string(&first.stats).unwrap(),
        serde_json::to_string(&second.stats).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&first.records).unwrap(),
        serde_json::to_string(&second.records).unwrap()
    );

    let other = run(124);
    assert_ne!(
        serde_json::to_string(&first.records).unwrap(),
        serde_json::to_string(&other.records).unwrap()
    );
}

#[test]
fn repeated_run_calls_return_the_cached_result() {
    let plan = single_phase_plan(1., 1., 1, 1, 50.);
    let config = config_with(QueuePolicy::Queue, ServiceModel::Exponential, 5);
    let mut sim = Simulation::new(plan, config).unwrap();
    let first = sim.run().stats.clone();
    let second = sim.run().stats.clone();
    assert_eq!(first, second);
}

#[test]
// Phase 1 (0-50 s) has a single overloaded instance, phase 2 (50-100 s) has
// no fleet at all: whatever is in flight at t=50 is truncated at the
// boundary, nothing arriving after 50 is ever assigned, and every completion
// happened before the boundary.
fn vanishing_fleet_truncates_in_flight_requests() {
    let plan = Plan::from_spec(PlanSpec {
        instance_types: vec![InstanceType {
            name: "small".to_string(),
            service_rate: 0.2,
            cost_rate: 0.1,
            capacity: 1,
        }],
        phases: vec![
            PhaseSpec {
                start_time: 0.,
                end_time: 50.,
                arrival_rate: 1.,
                fleet: vec![FleetEntry {
                    instance_type: "small".to_string(),
                    count: 1,
                }],
            },
            PhaseSpec {
                start_time: 50.,
                end_time: 100.,
                arrival_rate: 1.,
                fleet: vec![],
            },
        ],
    })
    .unwrap();
    let config = config_with(QueuePolicy::Queue, ServiceModel::Deterministic, 123);
    let mut sim = Simulation::new(plan, config).unwrap();
    let result = sim.run();

    assert!(result.stats.requests_truncated > 0);
    let boundary_truncated = result
        .records
        .iter()
        .filter(|r| r.status == RequestStatus::Truncated && r.completion_time == Some(50.))
        .count();
    assert!(boundary_truncated > 0);
    for record in &result.records {
        if record.arrival_time >= 50. {
            assert_eq!(record.instance, None);
            assert_ne!(record.status, RequestStatus::Completed);
        }
        if record.status == RequestStatus::Completed {
            assert!(record.completion_time.unwrap() <= 50.);
        }
        if let Some(start) = record.service_start_time {
            assert!(start < 50.);
        }
    }
}

#[test]
// A single instance with a 100 s service time under the drop policy: the
// first arrival occupies it for the whole run, everything else is dropped,
// and the occupant is truncated at the horizon.
fn drop_policy_rejects_saturated_arrivals() {
    let plan = single_phase_plan(2., 0.01, 1, 1, 50.);
    let config = config_with(QueuePolicy::Drop, ServiceModel::Deterministic, 123);
    let mut sim = Simulation::new(plan, config).unwrap();
    let result = sim.run();
    let stats = &result.stats;

    assert_eq!(stats.requests_completed, 0);
    assert_eq!(stats.requests_truncated, 1);
    assert!(stats.requests_dropped > 0);
    assert_eq!(stats.requests_dropped, stats.requests_injected - 1);
    assert_eq!(
        result.records.iter().filter(|r| r.instance.is_some()).count(),
        1
    );
}

#[test]
// No more than `capacity` requests may ever be served concurrently by one
// instance. Reconstructed from the per-request service intervals with
// half-open [start, end) semantics.
fn instance_capacity_is_never_exceeded() {
    let capacity = 2;
    let plan = single_phase_plan(10., 1., capacity, 3, 20.);
    let config = config_with(QueuePolicy::Queue, ServiceModel::Exponential, 321);
    let mut sim = Simulation::new(plan, config).unwrap();
    let result = sim.run();

    let mut intervals: HashMap<InstanceId, Vec<(f64, f64)>> = HashMap::new();
    for record in &result.records {
        if let (Some(instance), Some(start), Some(end)) =
            (record.instance, record.service_start_time, record.completion_time)
        {
            intervals.entry(instance).or_default().push((start, end));
        }
    }
    assert!(!intervals.is_empty());

    for spans in intervals.values() {
        let mut points = Vec::new();
        for &(start, end) in spans {
            points.push((start, 1i64));
            points.push((end, -1i64));
        }
        // releases take effect before starts at the same instant
        points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let mut in_flight = 0i64;
        for (_, delta) in points {
            in_flight += delta;
            assert!(in_flight <= capacity as i64);
        }
    }
}

#[test]
// Billed cost depends only on the plan and the simulated horizon, not on how
// many requests the fleet serves.
fn cost_is_independent_of_request_volume() {
    let expected = 100. * 2. * 0.1;
    for seed in [1u64, 99] {
        for policy in [QueuePolicy::Queue, QueuePolicy::Drop] {
            let plan = single_phase_plan(5., 1., 1, 2, 100.);
            let config = config_with(policy, ServiceModel::Exponential, seed);
            let result = Simulation::new(plan, config).unwrap().into_result();
            assert!((result.stats.total_cost - expected).abs() < 1e-9);
        }
    }
}

#[test]
// Under the block policy requests leave the global queue strictly in arrival
// order, so with a single instance the service order equals the id order.
fn block_policy_preserves_arrival_order() {
    let plan = single_phase_plan(3., 1., 1, 1, 30.);
    let config = config_with(QueuePolicy::Block, ServiceModel::Deterministic, 123);
    let mut sim = Simulation::new(plan, config).unwrap();
    let result = sim.run();

    assert!(result.stats.requests_blocked > 0);
    let mut served: Vec<_> = result
        .records
        .iter()
        .filter(|r| r.service_start_time.is_some())
        .collect();
    served.sort_by(|a, b| a.service_start_time.unwrap().total_cmp(&b.service_start_time.unwrap()));
    for window in served.windows(2) {
        assert!(window[0].id < window[1].id);
    }
}

#[test]
// The saved event trace is totally ordered by time and accounts for every
// arrival.
fn event_log_is_ordered_and_complete() {
    let plan = single_phase_plan(2., 1., 1, 1, 20.);
    let config = SimulationConfig {
        save_event_log: true,
        random_seed: 123,
        ..Default::default()
    };
    let mut sim = Simulation::new(plan, config).unwrap();
    let result = sim.run();

    let event_log = result.event_log.as_ref().unwrap();
    assert!(!event_log.is_empty());
    for window in event_log.windows(2) {
        assert!(window[0].time <= window[1].time);
    }
    let arrivals = event_log.iter().filter(|e| e.kind == "arrival").count();
    assert_eq!(arrivals as u64, result.stats.requests_injected);
}

#[test]
fn workload_length_shortens_the_horizon() {
    let plan = single_phase_plan(2., 1., 1, 1, 100.);
    let config = SimulationConfig {
        workload_length: Some(10.),
        random_seed: 123,
        ..Default::default()
    };
    let mut sim = Simulation::new(plan, config).unwrap();
    let result = sim.run();

    for record in &result.records {
        assert!(record.arrival_time < 10.);
        if let Some(end) = record.completion_time {
            assert!(end <= 10.);
        }
    }
    // only the first 10 seconds of the fleet are billed
    assert!((result.stats.total_cost - 10. * 0.1).abs() < 1e-9);
}

#[test]
fn invalid_workload_lengths_are_rejected() {
    let plan = single_phase_plan(2., 1., 1, 1, 100.);
    let config = SimulationConfig {
        workload_length: Some(150.),
        ..Default::default()
    };
    assert!(matches!(
        Simulation::new(plan.clone(), config),
        Err(Error::InvalidConfig(_))
    ));

    let config = SimulationConfig {
        workload_length: Some(0.),
        ..Default::default()
    };
    assert!(matches!(Simulation::new(plan, config), Err(Error::InvalidConfig(_))));
}

#[test]
// Growing the fleet mid-run puts queued requests onto the new instances as
// soon as the phase starts.
fn growing_fleet_drains_the_queue_at_the_boundary() {
    let plan = Plan::from_spec(PlanSpec {
        instance_types: vec![InstanceType {
            name: "small".to_string(),
            service_rate: 1.,
            cost_rate: 0.1,
            capacity: 1,
        }],
        phases: vec![
            PhaseSpec {
                start_time: 0.,
                end_time: 20.,
                arrival_rate: 3.,
                fleet: vec![FleetEntry {
                    instance_type: "small".to_string(),
                    count: 1,
                }],
            },
            PhaseSpec {
                start_time: 20.,
                end_time: 60.,
                arrival_rate: 0.1,
                fleet: vec![FleetEntry {
                    instance_type: "small".to_string(),
                    count: 10,
                }],
            },
        ],
    })
    .unwrap();
    let config = config_with(QueuePolicy::Queue, ServiceModel::Deterministic, 123);
    let mut sim = Simulation::new(plan, config).unwrap();
    let result = sim.run();
    let stats = &result.stats;

    // phase 1 is overloaded threefold, phase 2 has ample capacity: the queue
    // built up before t=20 is served right after the boundary
    let started_at_boundary = result
        .records
        .iter()
        .filter(|r| r.service_start_time == Some(20.))
        .count();
    assert!(started_at_boundary > 1);
    assert_eq!(stats.requests_dropped, 0);
    assert!(stats.requests_completed > stats.requests_truncated);
}
