//! Orquestador de transmisión: el único punto de entrada de los productores.
//!
//! Decide el destino de cada lectura según la conectividad y la salud del
//! transporte: envío directo, derivación al motor de reintentos o buffering
//! offline. Los errores del transporte nunca cruzan hacia el productor; la
//! única condición que produce `Rejected` es una entrada inválida.


use chrono::Utc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};
use crate::context::domain::AppContext;
use crate::database::domain::StoreStats;
use crate::health::domain::HealthState;
use crate::health::logic::perform_manual_health_check;
use crate::message::domain::{Message, MessageStatus};
use crate::network::domain::NetworkState;
use crate::orchestrator::domain::{Outcome, StatusReport};
use crate::transport::domain::send_with_timeout;


#[derive(Clone)]
pub struct Orchestrator {
    ctx: AppContext,
    health_tx: watch::Sender<HealthState>,
    network_rx: watch::Receiver<NetworkState>,
    tx_retry: mpsc::Sender<Message>,
}


impl Orchestrator {

    pub fn new(ctx: AppContext,
               health_tx: watch::Sender<HealthState>,
               network_rx: watch::Receiver<NetworkState>,
               tx_retry: mpsc::Sender<Message>) -> Self {
        Self { ctx, health_tx, network_rx, tx_retry }
    }

    /// Admite un mensaje y decide su camino de entrega.
    ///
    /// El llamador se bloquea a lo sumo por un timeout de transporte; nunca
    /// espera una cadena de reintentos completa.
    pub async fn submit(&self, mut message: Message) -> Outcome {

        if !message.is_valid() {
            warn!("Warning: mensaje inválido rechazado en la admisión");
            return Outcome::Rejected;
        }

        self.ctx.stats.record_total();

        let network = *self.network_rx.borrow();
        if !network.available {
            debug!(message_id = %message.id, "Debug: red no disponible, a la cola offline");
            self.ctx.stats.record_offline();
            self.buffer(&mut message).await;
            return Outcome::Buffered;
        }

        let healthy = self.health_tx.borrow().is_healthy;
        if !healthy {
            debug!(message_id = %message.id,
                   "Debug: transporte no saludable, sonda optimista de envío directo");
        }

        let timeout = Duration::from_secs(self.ctx.system.connection_timeout_secs);
        match send_with_timeout(self.ctx.transport.as_ref(), &message, timeout).await {
            Ok(()) => {
                message.status = MessageStatus::Transmitted;
                self.ctx.stats.record_succeeded();
                debug!(message_id = %message.id, "Debug: entrega directa exitosa");
                Outcome::Delivered
            }
            Err(e) => {
                self.ctx.stats.record_failed();
                message.last_error = Some(e.to_string());
                debug!(message_id = %message.id,
                       "Debug: entrega directa fallida, derivando al motor de reintentos: {e}");

                if let Err(send_error) = self.tx_retry.send(message).await {
                    // Canal de reintentos caído: la cola offline es el último recurso.
                    error!("Error: canal de reintentos cerrado, encolando offline");
                    let mut message = send_error.0;
                    self.ctx.stats.record_offline();
                    self.buffer(&mut message).await;
                }
                Outcome::Buffered
            }
        }
    }

    async fn buffer(&self, message: &mut Message) {
        message.status = MessageStatus::Queued;
        if let Err(e) = self.ctx.repo.put(message).await {
            error!(message_id = %message.id,
                   "Error: no se pudo encolar el mensaje offline. {e}");
        }
    }

    /// Drena los registros offline de un sujeto con entregas directas.
    ///
    /// Devuelve `true` si al menos un registro fue entregado; `false` si no
    /// había registros o ninguno pudo entregarse.
    pub async fn retry_failed_transmissions(&self, subject_id: &str) -> bool {

        let records = match self.ctx.repo.get_all_for_subject(subject_id).await {
            Ok(records) => records,
            Err(e) => {
                error!(subject_id, "Error: no se pudo leer la cola offline. {e}");
                return false;
            }
        };

        if records.is_empty() {
            return false;
        }

        let timeout = Duration::from_secs(self.ctx.system.connection_timeout_secs);
        let mut delivered_ids = Vec::new();
        let mut failed_ids = Vec::new();

        for record in records {
            let message = record.clone().into_message();
            match send_with_timeout(self.ctx.transport.as_ref(), &message, timeout).await {
                Ok(()) => delivered_ids.push(record.id),
                Err(e) => {
                    debug!(message_id = %message.id, "Debug: reenvío por sujeto fallido: {e}");
                    failed_ids.push(record.id);
                }
            }
        }

        if let Err(e) = self.ctx.repo.delete_by_ids(&delivered_ids).await {
            error!("Error: no se pudieron borrar los registros entregados. {e}");
        }
        if let Err(e) = self.ctx.repo.increment_retry_count(&failed_ids).await {
            error!("Error: no se pudieron incrementar los contadores de reintento. {e}");
        }

        info!(subject_id, delivered = delivered_ids.len(), failed = failed_ids.len(),
              "Info: reenvío de transmisiones fallidas completado");
        !delivered_ids.is_empty()
    }

    /// Reporte de estado agregado para el operador.
    pub async fn statistics(&self) -> StatusReport {

        let store = match self.ctx.repo.stats(self.ctx.system.max_retry_attempts as i64).await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Error: no se pudieron leer las estadísticas de la cola. {e}");
                StoreStats { total: 0, pending: 0, failed_over_threshold: 0, oldest_timestamp: None }
            }
        };

        StatusReport {
            transmission: self.ctx.stats.snapshot(),
            store,
            dead_letter_count: self.ctx.dead_letters.count(),
            health: self.health_tx.borrow().report(Utc::now().timestamp()),
        }
    }

    /// Sonda de salud fuera del ciclo programado.
    pub async fn manual_health_check(&self) -> bool {
        perform_manual_health_check(&self.health_tx, &self.ctx).await
    }
}


/// Consume las lecturas que empuja la capa de adquisición y las admite una
/// por una. Las tareas de reintento corren aparte: este bucle nunca espera
/// más que un timeout de transporte por mensaje.
#[instrument(name = "run_orchestrator_task", skip(rx, orchestrator))]
pub async fn run_orchestrator(mut rx: mpsc::Receiver<Message>,
                              orchestrator: Orchestrator) {

    info!("Info: orchestrator task creada");

    while let Some(message) = rx.recv().await {
        let outcome = orchestrator.submit(message).await;
        debug!(?outcome, "Debug: mensaje admitido");
    }

    info!("Info: orchestrator task finalizada");
}


/// Publica periódicamente el reporte de estado como snapshot estructurado.
///
/// Es la visibilidad "empujada" hacia el operador: éxito acumulado, tamaño de
/// la cola offline, dead-letters y resumen de salud, sin excepciones de por
/// medio.
pub async fn run_status_reporter(orchestrator: Orchestrator,
                                 mut shutdown: watch::Receiver<bool>) {

    let mut ticker = interval(Duration::from_secs(orchestrator.ctx.system.retry_batch_interval_secs));
    // El primer tick es inmediato; el primer reporte espera un intervalo.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = orchestrator.statistics().await;
                match serde_json::to_string(&report) {
                    Ok(json) => info!(report = %json, "Info: reporte de estado"),
                    Err(e) => error!("Error: no se pudo serializar el reporte de estado. {e}"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}


pub fn start_orchestrator(rx_from_producer: mpsc::Receiver<Message>,
                          orchestrator: Orchestrator,
                          shutdown: watch::Receiver<bool>) {

    info!("Info: iniciando tarea orchestrator");

    let reporter = orchestrator.clone();
    tokio::spawn(async move {
        run_status_reporter(reporter, shutdown).await;
    });

    tokio::spawn(async move {
        run_orchestrator(rx_from_producer, orchestrator).await;
    });
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use crate::test_utils::{mock_context, sample_message, unhealthy_state, MockTransport};

    struct Harness {
        orchestrator: Orchestrator,
        retry_rx: mpsc::Receiver<Message>,
        network_tx: watch::Sender<NetworkState>,
    }

    async fn harness(transport: Arc<MockTransport>, healthy: bool) -> Harness {
        let ctx = mock_context(transport).await;
        let state = if healthy {
            HealthState::new()
        } else {
            unhealthy_state(ctx.system.max_consecutive_failures)
        };
        let (health_tx, _health_rx) = watch::channel(state);
        let (network_tx, network_rx) = watch::channel(NetworkState::initial());
        let (retry_tx, retry_rx) = mpsc::channel(10);

        Harness {
            orchestrator: Orchestrator::new(ctx, health_tx, network_rx, retry_tx),
            retry_rx,
            network_tx,
        }
    }

    #[tokio::test]
    async fn invalid_message_is_rejected_without_side_effects() {
        let transport = Arc::new(MockTransport::new());
        let mut harness = harness(transport.clone(), true).await;

        let mut message = sample_message("");
        message.subject_id = String::new();

        assert_eq!(harness.orchestrator.submit(message).await, Outcome::Rejected);
        assert_eq!(transport.send_calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.orchestrator.ctx.stats.snapshot().total, 0);
        assert_eq!(harness.orchestrator.ctx.repo.count().await.unwrap(), 0);
        assert!(harness.retry_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn network_unavailable_buffers_offline() {
        let transport = Arc::new(MockTransport::new());
        let harness = harness(transport.clone(), true).await;
        harness.network_tx.send(NetworkState::offline()).unwrap();

        let outcome = harness.orchestrator.submit(sample_message("user-1")).await;

        assert_eq!(outcome, Outcome::Buffered);
        assert_eq!(transport.send_calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.orchestrator.ctx.repo.count().await.unwrap(), 1);

        let snapshot = harness.orchestrator.ctx.stats.snapshot();
        assert_eq!(snapshot.total, 1);
        assert_eq!(snapshot.offline, 1);
    }

    #[tokio::test]
    async fn healthy_direct_send_delivers() {
        let transport = Arc::new(MockTransport::new());
        let harness = harness(transport.clone(), true).await;

        let outcome = harness.orchestrator.submit(sample_message("user-1")).await;

        assert_eq!(outcome, Outcome::Delivered);
        assert_eq!(transport.send_calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.orchestrator.ctx.stats.snapshot().succeeded, 1);
    }

    #[tokio::test]
    async fn unhealthy_optimistic_probe_can_deliver() {
        let transport = Arc::new(MockTransport::new());
        let harness = harness(transport.clone(), false).await;

        let outcome = harness.orchestrator.submit(sample_message("user-1")).await;

        assert_eq!(outcome, Outcome::Delivered);
        assert_eq!(transport.send_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_send_hands_off_to_retry_engine() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_sends.store(true, Ordering::SeqCst);
        let mut harness = harness(transport.clone(), true).await;

        let message = sample_message("user-1");
        let message_id = message.id.clone();
        let outcome = harness.orchestrator.submit(message).await;

        assert_eq!(outcome, Outcome::Buffered);
        let handed_off = harness.retry_rx.recv().await.unwrap();
        assert_eq!(handed_off.id, message_id);
        assert!(handed_off.last_error.is_some());
        // Derivado al motor, no encolado directamente.
        assert_eq!(harness.orchestrator.ctx.repo.count().await.unwrap(), 0);
        assert_eq!(harness.orchestrator.ctx.stats.snapshot().failed, 1);
    }

    #[tokio::test]
    async fn concurrent_submits_increment_total_exactly_once_each() {
        let transport = Arc::new(MockTransport::new());
        let harness = harness(transport.clone(), true).await;
        let orchestrator = Arc::new(harness.orchestrator.clone());

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.submit(sample_message("user-1")).await })
        };
        let second = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.submit(sample_message("user-1")).await })
        };

        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(orchestrator.ctx.stats.snapshot().total, 2);
    }

    #[tokio::test]
    async fn retry_failed_transmissions_drains_the_subject() {
        let transport = Arc::new(MockTransport::new());
        let harness = harness(transport.clone(), true).await;
        let repo = &harness.orchestrator.ctx.repo;

        for n in 0..2 {
            let mut queued = sample_message("user-1");
            queued.id = format!("user1-msg-{n}");
            queued.status = MessageStatus::Queued;
            repo.put(&queued).await.unwrap();
        }
        let mut other = sample_message("user-2");
        other.status = MessageStatus::Queued;
        repo.put(&other).await.unwrap();

        assert!(harness.orchestrator.retry_failed_transmissions("user-1").await);

        // Sólo los registros del sujeto se drenan.
        let remaining = repo.get_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].subject_id, "user-2");
    }

    #[tokio::test]
    async fn retry_failed_transmissions_without_records_returns_false() {
        let transport = Arc::new(MockTransport::new());
        let harness = harness(transport.clone(), true).await;

        assert!(!harness.orchestrator.retry_failed_transmissions("user-1").await);

        transport.fail_sends.store(true, Ordering::SeqCst);
        let mut queued = sample_message("user-1");
        queued.status = MessageStatus::Queued;
        harness.orchestrator.ctx.repo.put(&queued).await.unwrap();

        // Con registros pero sin entregas exitosas también es false, y el
        // contador de reintentos del registro avanza.
        assert!(!harness.orchestrator.retry_failed_transmissions("user-1").await);
        let records = harness.orchestrator.ctx.repo.get_all().await.unwrap();
        assert_eq!(records[0].retry_count, 1);
    }

    #[tokio::test]
    async fn statistics_aggregates_all_sources() {
        let transport = Arc::new(MockTransport::new());
        let harness = harness(transport.clone(), true).await;

        harness.orchestrator.submit(sample_message("user-1")).await;
        let report = harness.orchestrator.statistics().await;

        assert_eq!(report.transmission.total, 1);
        assert_eq!(report.transmission.succeeded, 1);
        assert_eq!(report.store.total, 0);
        assert_eq!(report.dead_letter_count, 0);
        assert!(report.health.is_healthy);
    }
}
