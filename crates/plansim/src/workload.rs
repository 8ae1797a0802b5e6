//! Workload generation: the synthetic arrival process and service times.

use rand_distr::{Distribution, Exp};
use rand_pcg::Pcg64;

use crate::config::ServiceModel;
use crate::plan::Plan;

/// Lazy stream of request arrival times.
///
/// Inter-arrival intervals are exponential; the rate is taken from the phase
/// containing the previous arrival (phase 0 for the first draw), so a phase's
/// rate takes effect for the next draw rather than retroactively. The stream
/// is finite: a draw landing at or past the horizon ends it without emitting.
/// It is restartable only by constructing a fresh stream over a freshly
/// seeded generator.
pub struct ArrivalStream<'a> {
    plan: &'a Plan,
    horizon: f64,
    rng: &'a mut Pcg64,
    prev: f64,
    exhausted: bool,
}

impl<'a> ArrivalStream<'a> {
    pub fn new(plan: &'a Plan, horizon: f64, rng: &'a mut Pcg64) -> Self {
        Self {
            plan,
            horizon,
            rng,
            prev: 0.,
            exhausted: false,
        }
    }
}

impl Iterator for ArrivalStream<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.exhausted {
            return None;
        }
        let rate = match self.plan.phase_at(self.prev) {
            Ok(phase) => phase.arrival_rate,
            Err(_) => {
                self.exhausted = true;
                return None;
            }
        };
        // rate > 0 is guaranteed by plan validation
        let time = self.prev + Exp::new(rate).unwrap().sample(&mut *self.rng);
        if time >= self.horizon {
            self.exhausted = true;
            return None;
        }
        self.prev = time;
        Some(time)
    }
}

/// Samples the duration of serving one request on an instance with the given
/// service rate.
pub fn sample_service_time(model: ServiceModel, service_rate: f64, rng: &mut Pcg64) -> f64 {
    match model {
        ServiceModel::Exponential => Exp::new(service_rate).unwrap().sample(rng),
        ServiceModel::Deterministic => 1. / service_rate,
    }
}
