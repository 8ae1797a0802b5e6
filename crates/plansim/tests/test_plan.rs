use plansim::{Error, FleetEntry, InstanceType, PhaseSpec, Plan, PlanSpec};

fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

fn base_spec() -> PlanSpec {
    PlanSpec {
        instance_types: vec![
            InstanceType {
                name: "small".to_string(),
                service_rate: 1.,
                cost_rate: 0.1,
                capacity: 1,
            },
            InstanceType {
                name: "large".to_string(),
                service_rate: 4.,
                cost_rate: 0.4,
                capacity: 2,
            },
        ],
        phases: vec![
            PhaseSpec {
                start_time: 0.,
                end_time: 50.,
                arrival_rate: 1.,
                fleet: vec![
                    FleetEntry {
                        instance_type: "small".to_string(),
                        count: 2,
                    },
                    FleetEntry {
                        instance_type: "large".to_string(),
                        count: 1,
                    },
                ],
            },
            PhaseSpec {
                start_time: 50.,
                end_time: 100.,
                arrival_rate: 2.,
                fleet: vec![FleetEntry {
                    instance_type: "small".to_string(),
                    count: 1,
                }],
            },
        ],
    }
}

#[test]
fn valid_plan_resolves_phases_and_fleets() {
    let plan = Plan::from_spec(base_spec()).unwrap();
    assert_eq!(plan.phases().len(), 2);
    assert_eq!(plan.horizon(), 100.);
    assert_eq!(plan.phase(0).fleet, vec![(0, 2), (1, 1)]);
    assert_eq!(plan.phase(1).fleet, vec![(0, 1)]);
}

#[test]
// Phase intervals are end-exclusive: the boundary time belongs to the later
// phase, and the horizon itself is out of range.
fn phase_lookup_honors_interval_bounds() {
    let plan = Plan::from_spec(base_spec()).unwrap();
    assert_eq!(plan.phase_index_at(0.).unwrap(), 0);
    assert_eq!(plan.phase_index_at(49.999).unwrap(), 0);
    assert_eq!(plan.phase_index_at(50.).unwrap(), 1);
    assert!(matches!(plan.phase_index_at(100.), Err(Error::OutOfHorizon(_))));
    assert!(matches!(plan.phase_index_at(250.), Err(Error::OutOfHorizon(_))));
}

#[test]
// Cost is phase duration times the planned fleet's cost rate, summed over
// phases: 50 * (2 * 0.1 + 1 * 0.4) + 50 * (1 * 0.1) = 35.
fn total_cost_follows_the_plan() {
    let plan = Plan::from_spec(base_spec()).unwrap();
    assert!((plan.total_cost(100.) - 35.).abs() < 1e-12);
    // a shortened horizon clips the last phase
    assert!((plan.total_cost(75.) - 32.5).abs() < 1e-12);
    assert!((plan.total_cost(25.) - 15.).abs() < 1e-12);
}

#[test]
fn plan_with_gap_between_phases_is_rejected() {
    let mut spec = base_spec();
    spec.phases[1].start_time = 60.;
    assert!(matches!(Plan::from_spec(spec), Err(Error::InvalidPlan(_))));
}

#[test]
fn plan_with_overlapping_phases_is_rejected() {
    let mut spec = base_spec();
    spec.phases[1].start_time = 40.;
    assert!(matches!(Plan::from_spec(spec), Err(Error::InvalidPlan(_))));
}

#[test]
fn plan_not_starting_at_zero_is_rejected() {
    let mut spec = base_spec();
    spec.phases[0].start_time = 1.;
    assert!(matches!(Plan::from_spec(spec), Err(Error::InvalidPlan(_))));
}

#[test]
fn plan_with_empty_phase_interval_is_rejected() {
    let mut spec = base_spec();
    spec.phases[1].end_time = 50.;
    assert!(matches!(Plan::from_spec(spec), Err(Error::InvalidPlan(_))));
}

#[test]
fn non_positive_rates_are_rejected() {
    let mut spec = base_spec();
    spec.phases[0].arrival_rate = 0.;
    assert!(matches!(Plan::from_spec(spec), Err(Error::InvalidPlan(_))));

    let mut spec = base_spec();
    spec.instance_types[0].service_rate = -1.;
    assert!(matches!(Plan::from_spec(spec), Err(Error::InvalidPlan(_))));

    let mut spec = base_spec();
    spec.instance_types[1].capacity = 0;
    assert!(matches!(Plan::from_spec(spec), Err(Error::InvalidPlan(_))));
}

#[test]
fn fleet_referencing_unknown_type_is_rejected() {
    let mut spec = base_spec();
    spec.phases[0].fleet[0].instance_type = "xlarge".to_string();
    assert!(matches!(Plan::from_spec(spec), Err(Error::InvalidPlan(_))));
}

#[test]
fn empty_plans_are_rejected() {
    let mut spec = base_spec();
    spec.phases.clear();
    assert!(matches!(Plan::from_spec(spec), Err(Error::InvalidPlan(_))));

    let mut spec = base_spec();
    spec.instance_types.clear();
    assert!(matches!(Plan::from_spec(spec), Err(Error::InvalidPlan(_))));
}

#[test]
fn plan_loads_from_yaml_file() {
    let plan = Plan::from_file(&name_wrapper("plan.yaml")).unwrap();
    assert_eq!(plan.types().len(), 2);
    assert_eq!(plan.phases().len(), 2);
    assert_eq!(plan.horizon(), 100.);
    assert_eq!(plan.instance_type(0).name, "m4.large");
    assert_eq!(plan.phase(1).arrival_rate, 4.);
}

#[test]
fn missing_plan_file_is_an_invalid_plan() {
    assert!(matches!(
        Plan::from_file(&name_wrapper("no-such-plan.yaml")),
        Err(Error::InvalidPlan(_))
    ));
}
