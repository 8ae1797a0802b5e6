use std::error::Error;
use std::fs::File;

use clap::Parser;
use serde::Serialize;

use plansim::experiment::run_seeds;
use plansim::request::RequestStatus;
use plansim::{Plan, Simulation, SimulationConfig, SimulationResult};

fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the allocation plan (YAML)
    #[clap(long)]
    plan: String,

    /// Path to the simulation config (YAML); defaults are used if missing
    #[clap(long)]
    config: Option<String>,

    /// Output directory
    #[clap(long, default_value = ".")]
    output_dir: String,

    /// Output file prefix
    #[clap(long, default_value = "sim")]
    output_prefix: String,

    /// Comma-separated seeds to simulate; the configured seed is used if missing
    #[clap(long)]
    seeds: Option<String>,

    /// Number of threads used to run multiple seeds
    #[clap(short, long, default_value_t = std::thread::available_parallelism().unwrap().get())]
    threads: usize,

    /// Save per-request records
    #[clap(long)]
    save_reqs: bool,

    /// Save per-instance utilization
    #[clap(long)]
    save_utils: bool,
}

#[derive(Serialize)]
struct SummaryRow {
    seed: u64,
    requests_injected: u64,
    requests_completed: u64,
    requests_truncated: u64,
    requests_dropped: u64,
    requests_blocked: u64,
    avg_response_time: f64,
    min_response_time: f64,
    max_response_time: f64,
    median_response_time: f64,
    p90_response_time: f64,
    p95_response_time: f64,
    total_cost: f64,
    mean_utilization: f64,
}

#[derive(Serialize)]
struct RequestRow {
    request: u64,
    arrival: f64,
    start: Option<f64>,
    end: Option<f64>,
    instance: Option<String>,
    status: &'static str,
    blocked: bool,
}

#[derive(Serialize)]
struct UtilRow {
    instance: String,
    instance_type: String,
    active_time: f64,
    busy_time: f64,
    utilization: f64,
}

fn status_label(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::NotArrived => "not_arrived",
        RequestStatus::Queued => "queued",
        RequestStatus::Running => "running",
        RequestStatus::Completed => "completed",
        RequestStatus::Truncated => "truncated",
        RequestStatus::Dropped => "dropped",
    }
}

fn parse_seeds(seeds: &str) -> Result<Vec<u64>, Box<dyn Error>> {
    let mut result = Vec::new();
    for part in seeds.split(',') {
        result.push(part.trim().parse::<u64>().map_err(|e| format!("invalid seed {}: {}", part, e))?);
    }
    Ok(result)
}

fn output_path(args: &Args, seed: u64, multi_seed: bool, suffix: &str) -> String {
    if multi_seed {
        format!("{}/{}_s{}_{}.csv", args.output_dir, args.output_prefix, seed, suffix)
    } else {
        format!("{}/{}_{}.csv", args.output_dir, args.output_prefix, suffix)
    }
}

fn save_summary(args: &Args, seeds: &[u64], results: &[SimulationResult]) -> Result<(), Box<dyn Error>> {
    let path = format!("{}/{}.csv", args.output_dir, args.output_prefix);
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    for (&seed, result) in seeds.iter().zip(results) {
        let stats = &result.stats;
        writer.serialize(SummaryRow {
            seed,
            requests_injected: stats.requests_injected,
            requests_completed: stats.requests_completed,
            requests_truncated: stats.requests_truncated,
            requests_dropped: stats.requests_dropped,
            requests_blocked: stats.requests_blocked,
            avg_response_time: stats.avg_response_time,
            min_response_time: stats.min_response_time,
            max_response_time: stats.max_response_time,
            median_response_time: stats.median_response_time,
            p90_response_time: stats.p90_response_time,
            p95_response_time: stats.p95_response_time,
            total_cost: stats.total_cost,
            mean_utilization: stats.mean_utilization,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn save_requests(path: &str, plan: &Plan, result: &SimulationResult) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    for record in &result.records {
        writer.serialize(RequestRow {
            request: record.id,
            arrival: record.arrival_time,
            start: record.service_start_time,
            end: record.completion_time,
            instance: record
                .instance
                .map(|id| format!("{}-{}", plan.instance_type(id.type_id).name, id.index)),
            status: status_label(record.status),
            blocked: record.blocked,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn save_utils(path: &str, plan: &Plan, result: &SimulationResult) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    for usage in &result.instance_usage {
        let type_name = &plan.instance_type(usage.type_id).name;
        writer.serialize(UtilRow {
            instance: format!("{}-{}", type_name, usage.instance_index),
            instance_type: type_name.clone(),
            active_time: usage.active_time,
            busy_time: usage.busy_time,
            utilization: usage.utilization,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn save_events(path: &str, result: &SimulationResult) -> Result<(), Box<dyn Error>> {
    let event_log = match &result.event_log {
        Some(event_log) => event_log,
        None => return Ok(()),
    };
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    for record in event_log {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let plan = Plan::from_file(&args.plan)?;
    let config = match &args.config {
        Some(path) => SimulationConfig::from_file(path)?,
        None => SimulationConfig::default(),
    };
    let seeds = match &args.seeds {
        Some(seeds) => parse_seeds(seeds)?,
        None => vec![config.random_seed],
    };

    let results = if seeds.len() == 1 {
        let mut run_config = config.clone();
        run_config.random_seed = seeds[0];
        vec![Simulation::new(plan.clone(), run_config)?.into_result()]
    } else {
        run_seeds(&plan, &config, &seeds, args.threads)?
    };

    let multi_seed = seeds.len() > 1;
    for (&seed, result) in seeds.iter().zip(&results) {
        println!("Simulation stats for {} (seed {})", args.plan, seed);
        println!("{}", result.stats);
        println!();

        if args.save_reqs {
            save_requests(&output_path(args, seed, multi_seed, "reqs"), &plan, result)?;
        }
        if args.save_utils {
            save_utils(&output_path(args, seed, multi_seed, "utils"), &plan, result)?;
        }
        if config.save_event_log {
            save_events(&output_path(args, seed, multi_seed, "events"), result)?;
        }
    }
    save_summary(args, &seeds, &results)?;
    Ok(())
}

fn main() {
    init_logger();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
