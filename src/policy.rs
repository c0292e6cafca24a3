//! Политики внедрения отказов при обработке задач

use super::model::Task;
use std::sync::{Mutex, PoisonError};
use rand::{rngs::StdRng, Rng, SeedableRng};


/// Решает, должна ли обработка задачи завершиться ошибкой.
/// Вызывается после того, как задача отработала свою длительность.
pub trait FailurePolicy: Send + Sync {
    fn should_fail(&self, task: &Task) -> bool;
}

impl<F> FailurePolicy for F
where
    F: Fn(&Task) -> bool + Send + Sync,
{
    fn should_fail(&self, task: &Task) -> bool {
        self(task)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFail;

impl FailurePolicy for NeverFail {
    fn should_fail(&self, _task: &Task) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFail;

impl FailurePolicy for AlwaysFail {
    fn should_fail(&self, _task: &Task) -> bool {
        true
    }
}


/// Отказ с фиксированной вероятностью
pub struct RandomFailure {
    probability: f64,
    rng: Mutex<StdRng>,
}

impl RandomFailure {
    pub fn new(probability: f64) -> Self {
        Self::with_rng(probability, StdRng::from_entropy())
    }

    pub fn seeded(probability: f64, seed: u64) -> Self {
        Self::with_rng(probability, StdRng::seed_from_u64(seed))
    }

    fn with_rng(probability: f64, rng: StdRng) -> Self {
        let probability = if probability.is_nan() { 0.0 } else { probability.clamp(0.0, 1.0) };
        Self {
            probability,
            rng: Mutex::new(rng),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl FailurePolicy for RandomFailure {
    fn should_fail(&self, _task: &Task) -> bool {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_bool(self.probability)
    }
}

impl std::fmt::Debug for RandomFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomFailure")
            .field("probability", &self.probability)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_is_clamped() {
        assert_eq!(RandomFailure::new(1.5).probability(), 1.0);
        assert_eq!(RandomFailure::new(-0.2).probability(), 0.0);
        assert_eq!(RandomFailure::new(f64::NAN).probability(), 0.0);
    }

    #[test]
    fn extremes_are_deterministic() {
        let task = Task::new(1, "p");
        let never = RandomFailure::seeded(0.0, 7);
        let always = RandomFailure::seeded(1.0, 7);
        assert!((0..100).all(|_| !never.should_fail(&task)));
        assert!((0..100).all(|_| always.should_fail(&task)));
    }

    #[test]
    fn seeded_rate_is_roughly_respected() {
        let policy = RandomFailure::seeded(0.1, 42);
        let task = Task::new(1, "p");
        let failures = (0..10_000).filter(|_| policy.should_fail(&task)).count();
        assert!((700..1300).contains(&failures), "failures = {failures}");
    }

    #[test]
    fn closures_are_policies() {
        let odd = |task: &Task| task.id % 2 == 1;
        assert!(odd.should_fail(&Task::new(3, "p")));
        assert!(!odd.should_fail(&Task::new(4, "p")));
    }
}
