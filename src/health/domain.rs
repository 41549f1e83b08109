//! Estado de salud de la conexión con el bus remoto.
//!
//! Este módulo implementa la máquina de estados HEALTHY/UNHEALTHY con
//! histéresis: el veredicto sólo cae a no-saludable tras una racha de
//! `max_consecutive_failures` sondas fallidas, y se recupera con la primera
//! sonda exitosa que rompe la racha. El estado vive sólo en memoria y se
//! reconstruye desde cero en cada arranque del proceso.


use serde::Serialize;


/// Instantánea del estado de salud, recalculada en cada sonda.
#[derive(Debug, Clone, Serialize)]
pub struct HealthState {
    pub is_healthy: bool,
    pub consecutive_failures: u32,
    pub last_success_at: Option<i64>,
    pub last_failure_at: Option<i64>,
    pub total_probes: u64,
    pub successful_probes: u64,
}


/// Resumen detallado para los reportes de estado del orquestador.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub is_healthy: bool,
    pub consecutive_failures: u32,
    pub uptime_percentage: f64,
    /// `None` significa "nunca hubo una sonda exitosa".
    pub minutes_since_last_success: Option<i64>,
    pub total_probes: u64,
    pub successful_probes: u64,
}


impl HealthState {

    /// El proceso arranca optimista: saludable hasta que las sondas digan
    /// lo contrario.
    pub fn new() -> Self {
        Self {
            is_healthy: true,
            consecutive_failures: 0,
            last_success_at: None,
            last_failure_at: None,
            total_probes: 0,
            successful_probes: 0,
        }
    }

    /// Registra una sonda exitosa.
    ///
    /// Una sola sonda exitosa rompe la racha de fallos y restaura el
    /// veredicto saludable de inmediato.
    pub fn apply_success(&mut self, now: i64) {
        self.total_probes += 1;
        self.successful_probes += 1;
        self.consecutive_failures = 0;
        self.is_healthy = true;
        self.last_success_at = Some(now);
    }

    /// Registra una sonda fallida.
    ///
    /// El veredicto cae a no-saludable recién cuando la racha alcanza
    /// `max_consecutive_failures`.
    pub fn apply_failure(&mut self, now: i64, max_consecutive_failures: u32) {
        self.total_probes += 1;
        self.consecutive_failures += 1;
        self.last_failure_at = Some(now);
        if self.consecutive_failures >= max_consecutive_failures {
            self.is_healthy = false;
        }
    }

    pub fn uptime_percentage(&self) -> f64 {
        if self.total_probes == 0 {
            return 100.0;
        }
        (self.successful_probes as f64 / self.total_probes as f64) * 100.0
    }

    pub fn report(&self, now: i64) -> HealthReport {
        HealthReport {
            is_healthy: self.is_healthy,
            consecutive_failures: self.consecutive_failures,
            uptime_percentage: self.uptime_percentage(),
            minutes_since_last_success: self.last_success_at
                .map(|at| (now - at).max(0) / 60),
            total_probes: self.total_probes,
            successful_probes: self.successful_probes,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const MAX_FAILURES: u32 = 5;

    #[test]
    fn stays_healthy_below_failure_threshold() {
        let mut state = HealthState::new();
        for _ in 0..MAX_FAILURES - 1 {
            state.apply_failure(100, MAX_FAILURES);
        }
        assert!(state.is_healthy);
        assert_eq!(state.consecutive_failures, MAX_FAILURES - 1);
    }

    #[test]
    fn becomes_unhealthy_at_threshold() {
        let mut state = HealthState::new();
        for _ in 0..MAX_FAILURES {
            state.apply_failure(100, MAX_FAILURES);
        }
        assert!(!state.is_healthy);
        assert_eq!(state.consecutive_failures, MAX_FAILURES);
    }

    #[test]
    fn single_success_restores_health() {
        let mut state = HealthState::new();
        for _ in 0..MAX_FAILURES + 3 {
            state.apply_failure(100, MAX_FAILURES);
        }
        assert!(!state.is_healthy);

        state.apply_failure(200, MAX_FAILURES);
        state.apply_success(300);
        assert!(state.is_healthy);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.last_success_at, Some(300));
    }

    #[test]
    fn uptime_percentage_tracks_probe_history() {
        let mut state = HealthState::new();
        assert_eq!(state.uptime_percentage(), 100.0);

        state.apply_success(10);
        state.apply_failure(20, MAX_FAILURES);
        state.apply_success(30);
        state.apply_failure(40, MAX_FAILURES);

        assert_eq!(state.total_probes, 4);
        assert_eq!(state.successful_probes, 2);
        assert_eq!(state.uptime_percentage(), 50.0);
    }

    #[test]
    fn report_without_success_has_no_minutes() {
        let mut state = HealthState::new();
        state.apply_failure(10, MAX_FAILURES);
        let report = state.report(700);
        assert!(report.minutes_since_last_success.is_none());

        state.apply_success(100);
        let report = state.report(400);
        assert_eq!(report.minutes_since_last_success, Some(5));
    }
}
