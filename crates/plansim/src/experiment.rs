//! Running multiple seeded simulations in parallel.

use std::sync::mpsc::channel;

use threadpool::ThreadPool;

use crate::config::SimulationConfig;
use crate::error::Error;
use crate::metrics::SimulationResult;
use crate::plan::Plan;
use crate::simulation::Simulation;

/// Runs one independent simulation per seed on `n_workers` worker threads and
/// returns the results in seed order.
///
/// Each run owns its own engine, pool and random source; nothing is shared
/// between workers.
pub fn run_seeds(
    plan: &Plan,
    config: &SimulationConfig,
    seeds: &[u64],
    n_workers: usize,
) -> Result<Vec<SimulationResult>, Error> {
    let pool = ThreadPool::new(n_workers);
    let (tx, rx) = channel();
    for (id, &seed) in seeds.iter().enumerate() {
        let mut run_config = config.clone();
        run_config.random_seed = seed;
        let sim = Simulation::new(plan.clone(), run_config)?;
        let tx = tx.clone();
        pool.execute(move || {
            tx.send((id, sim.into_result())).unwrap();
        });
    }
    let mut results: Vec<_> = rx.iter().take(seeds.len()).collect();
    results.sort_by_key(|r| r.0);
    Ok(results.into_iter().map(|r| r.1).collect())
}
