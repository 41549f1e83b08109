//! Tipos del orquestador de transmisión: resultado de admisión y
//! contadores de estadísticas.


use std::sync::atomic::{AtomicU64, Ordering};
use serde::Serialize;
use crate::database::domain::StoreStats;
use crate::health::domain::HealthReport;


/// Resultado de la admisión de un mensaje.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// Entregado directamente al bus remoto.
    Delivered,
    /// Retenido localmente (cola offline o camino de reintentos).
    Buffered,
    /// Entrada inválida; sin efectos secundarios.
    Rejected,
}


/// Contadores de transmisión, mutados por llamadores concurrentes.
#[derive(Debug, Default)]
pub struct TransmissionStats {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    offline: AtomicU64,
}


impl TransmissionStats {

    pub fn record_total(&self) {
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_offline(&self) {
        self.offline.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let total = self.total.load(Ordering::SeqCst);
        let succeeded = self.succeeded.load(Ordering::SeqCst);
        StatsSnapshot {
            total,
            succeeded,
            failed: self.failed.load(Ordering::SeqCst),
            offline: self.offline.load(Ordering::SeqCst),
            success_rate: if total == 0 {
                100.0
            } else {
                (succeeded as f64 / total as f64) * 100.0
            },
        }
    }
}


/// Instantánea serializable de los contadores de transmisión.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub offline: u64,
    pub success_rate: f64,
}


/// Reporte de estado completo expuesto a los llamadores.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub transmission: StatsSnapshot,
    pub store: StoreStats,
    pub dead_letter_count: u64,
    pub health: HealthReport,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_derives_success_rate() {
        let stats = TransmissionStats::default();
        assert_eq!(stats.snapshot().success_rate, 100.0);

        for _ in 0..4 {
            stats.record_total();
        }
        stats.record_succeeded();
        stats.record_succeeded();
        stats.record_failed();
        stats.record_offline();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total, 4);
        assert_eq!(snapshot.succeeded, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.offline, 1);
        assert_eq!(snapshot.success_rate, 50.0);
    }
}
