//! Política de reintentos con retroceso exponencial.


use std::time::Duration;
use crate::system::domain::System;


/// Parámetros del retroceso exponencial acotado.
///
/// El intento 0 es inmediato; el intento `k` espera
/// `min(initial_delay · backoff_multiplier^k, max_delay)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}


impl RetryPolicy {

    pub fn from_system(system: &System) -> Self {
        Self {
            max_attempts: system.max_retry_attempts,
            initial_delay: Duration::from_millis(system.retry_initial_delay_ms),
            max_delay: Duration::from_secs(system.retry_max_delay_secs),
            backoff_multiplier: system.retry_backoff_multiplier,
        }
    }

    /// Retardo previo al intento `attempt` (1-indexado; el 0 es inmediato).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64;
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let capped = (base * factor).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn default_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn delays_grow_exponentially() {
        let policy = default_policy();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn delays_are_monotonic_and_capped() {
        let policy = default_policy();
        let mut previous = Duration::ZERO;
        for attempt in 1..=20 {
            let delay = policy.delay_for(attempt);
            assert!(delay >= previous);
            assert!(delay <= policy.max_delay);
            previous = delay;
        }
        assert_eq!(policy.delay_for(20), policy.max_delay);
    }

    #[test]
    fn multiplier_of_one_keeps_delay_constant() {
        let policy = RetryPolicy {
            backoff_multiplier: 1.0,
            ..default_policy()
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(9), Duration::from_secs(1));
    }
}
