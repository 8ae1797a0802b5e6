use plansim::experiment::run_seeds;
use plansim::{FleetEntry, InstanceType, PhaseSpec, Plan, PlanSpec, Simulation, SimulationConfig};

fn plan() -> Plan {
    Plan::from_spec(PlanSpec {
        instance_types: vec![InstanceType {
            name: "small".to_string(),
            service_rate: 1.,
            cost_rate: 0.1,
            capacity: 1,
        }],
        phases: vec![PhaseSpec {
            start_time: 0.,
            end_time: 50.,
            arrival_rate: 1.,
            fleet: vec![FleetEntry {
                instance_type: "small".to_string(),
                count: 2,
            }],
        }],
    })
    .unwrap()
}

#[test]
// Parallel runs are fully independent and land in seed order: each result
// matches a standalone run with the same seed.
fn parallel_seeds_match_standalone_runs() {
    let plan = plan();
    let config = SimulationConfig::default();
    let seeds = [7u64, 8, 9];
    let results = run_seeds(&plan, &config, &seeds, 2).unwrap();
    assert_eq!(results.len(), seeds.len());

    for (&seed, result) in seeds.iter().zip(&results) {
        let mut standalone_config = config.clone();
        standalone_config.random_seed = seed;
        let standalone = Simulation::new(plan.clone(), standalone_config).unwrap().into_result();
        assert_eq!(
            serde_json::to_string(&standalone.stats).unwrap(),
            serde_json::to_string(&result.stats).unwrap()
        );
    }
}
