//! Motor de reintentos.
//!
//! Dos caminos conviven aquí y se excluyen mutuamente por mensaje:
//! 1. La **cadena por mensaje** (`schedule_retry`): retroceso exponencial
//!    acotado, manejado como una máquina de estados explícita (contador de
//!    intentos + retardo), nunca por recursión.
//! 2. La **reconciliación periódica** (`reconcile_offline_batch`): drena la
//!    cola offline de a lotes cuando el transporte está saludable.
//!
//! La exclusión se garantiza con el guard de mensajes en vuelo (`DashMap`)
//! y con el estado del mensaje como única fuente de verdad: sólo
//! PENDING/QUEUED son elegibles para cualquiera de los dos caminos.


use std::sync::Arc;
use std::time::Duration;
use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, warn};
use crate::context::domain::AppContext;
use crate::health::domain::HealthState;
use crate::message::domain::{Message, MessageStatus};
use crate::retry::domain::RetryPolicy;
use crate::transport::domain::send_with_timeout;


#[derive(Clone)]
pub struct RetryEngine {
    ctx: AppContext,
    policy: RetryPolicy,
    health_rx: watch::Receiver<HealthState>,
    in_flight: Arc<DashMap<String, ()>>,
    shutdown: watch::Receiver<bool>,
}


impl RetryEngine {

    pub fn new(ctx: AppContext,
               health_rx: watch::Receiver<HealthState>,
               shutdown: watch::Receiver<bool>) -> Self {
        let policy = RetryPolicy::from_system(&ctx.system);
        Self {
            ctx,
            policy,
            health_rx,
            in_flight: Arc::new(DashMap::new()),
            shutdown,
        }
    }

    /// Ejecuta la cadena de reintentos de un mensaje hasta su resolución.
    ///
    /// Devuelve `true` si el mensaje terminó entregado. Un mensaje en estado
    /// terminal o con una cadena ya en vuelo no es elegible.
    pub async fn schedule_retry(&self, mut message: Message) -> bool {

        if message.status.is_terminal() {
            warn!(message_id = %message.id, status = message.status.as_str(),
                  "Warning: mensaje en estado terminal, cadena descartada");
            return false;
        }

        if self.in_flight.insert(message.id.clone(), ()).is_some() {
            debug!(message_id = %message.id, "Debug: cadena ya en vuelo para el mensaje");
            return false;
        }

        let delivered = self.run_chain(&mut message).await;
        self.in_flight.remove(&message.id);
        delivered
    }

    async fn run_chain(&self, message: &mut Message) -> bool {

        let timeout = Duration::from_secs(self.ctx.system.connection_timeout_secs);

        // Intento 0: inmediato.
        match send_with_timeout(self.ctx.transport.as_ref(), message, timeout).await {
            Ok(()) => {
                message.status = MessageStatus::Transmitted;
                debug!(message_id = %message.id, "Debug: entregado en el intento inmediato");
                return true;
            }
            Err(e) => {
                message.last_error = Some(e.to_string());
            }
        }

        let mut shutdown = self.shutdown.clone();

        for attempt in 1..self.policy.max_attempts {
            // Re-chequeo de salud antes de esperar: si el transporte sigue
            // caído, encolar offline en lugar de agotar el retardo.
            if !self.health_rx.borrow().is_healthy {
                message.status = MessageStatus::Queued;
                match self.ctx.repo.put(message).await {
                    Ok(()) => {
                        info!(message_id = %message.id,
                              "Info: transporte no saludable, mensaje encolado offline");
                    }
                    Err(e) => {
                        error!(message_id = %message.id,
                               "Error: no se pudo encolar el mensaje offline. {e}");
                    }
                }
                return false;
            }

            let delay = self.policy.delay_for(attempt);
            tokio::select! {
                _ = sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(message_id = %message.id,
                               "Debug: apagado durante la espera de reintento");
                        return false;
                    }
                }
            }

            message.retry_count = attempt;
            match send_with_timeout(self.ctx.transport.as_ref(), message, timeout).await {
                Ok(()) => {
                    message.status = MessageStatus::Transmitted;
                    info!(message_id = %message.id, attempt,
                          "Info: entregado tras reintento");
                    return true;
                }
                Err(e) => {
                    debug!(message_id = %message.id, attempt,
                           "Debug: reintento fallido: {e}");
                    message.last_error = Some(e.to_string());
                }
            }
        }

        // Presupuesto agotado: promoción a dead-letter, la cadena termina acá.
        message.status = MessageStatus::Failed;
        let reason = match &message.last_error {
            Some(e) => format!("reintentos agotados: {e}"),
            None => "reintentos agotados".to_string(),
        };
        self.ctx.dead_letters.dead_letter(message, &reason).await;
        false
    }

    /// Drena la cola offline en un lote.
    ///
    /// Con el transporte no saludable el ciclo se omite entero. El fallo de
    /// un registro nunca aborta el procesamiento del resto: los entregados se
    /// borran en lote, los fallidos incrementan su contador, y los que
    /// agotaron el presupuesto se purgan hacia dead-letter.
    pub async fn reconcile_offline_batch(&self) {

        if !self.health_rx.borrow().is_healthy {
            info!("Info: reconciliación omitida, transporte no saludable");
            return;
        }

        let records = match self.ctx.repo.get_all().await {
            Ok(records) => records,
            Err(e) => {
                error!("Error: no se pudo leer la cola offline. {e}");
                return;
            }
        };

        if records.is_empty() {
            debug!("Debug: cola offline vacía, nada que reconciliar");
            return;
        }

        let timeout = Duration::from_secs(self.ctx.system.connection_timeout_secs);
        let mut delivered_ids = Vec::new();
        let mut failed_ids = Vec::new();

        for record in records {
            // Exclusión mutua con las cadenas por mensaje.
            if self.in_flight.contains_key(&record.message_id) {
                continue;
            }

            let message = record.clone().into_message();
            if message.status.is_terminal() {
                continue;
            }

            match send_with_timeout(self.ctx.transport.as_ref(), &message, timeout).await {
                Ok(()) => delivered_ids.push(record.id),
                Err(e) => {
                    debug!(message_id = %message.id, "Debug: entrega offline fallida: {e}");
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

        match self.ctx.repo.purge_exceeding(self.policy.max_attempts as i64).await {
            Ok(purged) => {
                for record in purged {
                    let message = record.into_message();
                    self.ctx.dead_letters.dead_letter(&message, "reintentos agotados").await;
                }
            }
            Err(e) => {
                error!("Error: no se pudo purgar los registros agotados. {e}");
            }
        }

        info!(delivered = delivered_ids.len(), failed = failed_ids.len(),
              "Info: reconciliación de la cola offline completada");
    }
}


/// Consume los mensajes que el orquestador deriva al camino de reintentos y
/// lanza una cadena independiente por cada uno.
pub async fn run_retry_worker(mut rx: mpsc::Receiver<Message>,
                              engine: RetryEngine) {

    info!("Info: retry worker task creada");

    while let Some(message) = rx.recv().await {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine.schedule_retry(message).await;
        });
    }

    info!("Info: retry worker task finalizada");
}


/// Ciclo periódico de reconciliación de la cola offline.
pub async fn run_retry_reconciler(engine: RetryEngine) {

    info!("Info: retry reconciler task creada");

    let mut ticker = interval(Duration::from_secs(engine.ctx.system.retry_batch_interval_secs));
    let mut shutdown = engine.shutdown.clone();

    // El primer tick de `interval` es inmediato; se consume para que la
    // primera reconciliación espere un intervalo completo.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                engine.reconcile_offline_batch().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Info: retry reconciler task finalizada");
}


pub fn start_retry_engine(rx_from_orchestrator: mpsc::Receiver<Message>,
                          engine: RetryEngine) {

    info!("Info: iniciando motor de reintentos");

    let worker_engine = engine.clone();
    tokio::spawn(async move {
        run_retry_worker(rx_from_orchestrator, worker_engine).await;
    });

    tokio::spawn(async move {
        run_retry_reconciler(engine).await;
    });
}
