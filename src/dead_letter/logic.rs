//! Manejo de mensajes permanentemente fallidos (Dead-Letter).
//!
//! Un mensaje que agotó su presupuesto de reintentos se registra aquí para
//! inspección del operador y nunca se vuelve a entregar automáticamente.
//! El manejador jamás propaga errores: registrar el fallo de un fallo no
//! puede tumbar el pipeline.


use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use chrono::Utc;
use tracing::{error, info, warn};
use crate::database::repository::Repository;
use crate::message::domain::{Message, MessageStatus};
use crate::system::domain::System;
use crate::transport::domain::{send_with_timeout, Transport};


pub struct DeadLetterHandler {
    repo: Repository,
    transport: Arc<dyn Transport>,
    count: AtomicU64,
    alert_every: u64,
    max_retry_attempts: u32,
    send_timeout: Duration,
}


impl DeadLetterHandler {

    pub fn new(repo: Repository,
               transport: Arc<dyn Transport>,
               system: &System) -> Self {
        Self {
            repo,
            transport,
            count: AtomicU64::new(0),
            alert_every: system.dead_letter_alert_every.max(1),
            max_retry_attempts: system.max_retry_attempts,
            send_timeout: Duration::from_secs(system.connection_timeout_secs),
        }
    }

    /// Registra la copia marcada de un mensaje que agotó sus reintentos.
    ///
    /// Idempotente por `message_id`; un mensaje ya registrado no vuelve a
    /// contarse ni a reenviarse. El reenvío al canal de monitoreo es
    /// best-effort sobre el mismo transporte: su fallo se registra y se
    /// descarta, nunca se reintenta.
    pub async fn dead_letter(&self, message: &Message, reason: &str) {

        let mut marked = message.clone();
        marked.status = MessageStatus::DeadLettered;
        marked.retry_count = self.max_retry_attempts;
        marked.last_error = Some(reason.to_string());

        match self.repo.insert_dead_letter(&marked, reason, Utc::now().timestamp()).await {
            Ok(true) => {
                let total = self.count.fetch_add(1, Ordering::SeqCst) + 1;
                info!(message_id = %marked.id, reason, "Info: mensaje enviado a dead-letter");

                if total % self.alert_every == 0 {
                    warn!(dead_letter_count = total,
                          "Warning: umbral de alerta de dead-letter alcanzado");
                }

                if let Err(e) = send_with_timeout(self.transport.as_ref(),
                                                  &marked,
                                                  self.send_timeout).await {
                    warn!(message_id = %marked.id,
                          "Warning: reenvío de dead-letter al monitoreo descartado: {e}");
                }
            }
            Ok(false) => {}
            Err(e) => {
                error!(message_id = %marked.id,
                       "Error: no se pudo persistir el dead-letter. {e}");
            }
        }
    }

    /// Total de dead-letters registrados por este proceso.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use crate::test_utils::{mock_context, sample_message, MockTransport};

    #[tokio::test]
    async fn records_and_counts_dead_letters() {
        let transport = Arc::new(MockTransport::new());
        let ctx = mock_context(transport.clone()).await;
        let msg = sample_message("user-1");

        ctx.dead_letters.dead_letter(&msg, "reintentos agotados").await;

        assert_eq!(ctx.dead_letters.count(), 1);
        assert_eq!(ctx.repo.count_dead_letters().await.unwrap(), 1);
        // Reenvío best-effort al canal de monitoreo.
        assert_eq!(transport.send_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dead_letter_is_idempotent_per_message() {
        let transport = Arc::new(MockTransport::new());
        let ctx = mock_context(transport.clone()).await;
        let msg = sample_message("user-1");

        ctx.dead_letters.dead_letter(&msg, "reintentos agotados").await;
        ctx.dead_letters.dead_letter(&msg, "reintentos agotados").await;

        assert_eq!(ctx.dead_letters.count(), 1);
        assert_eq!(ctx.repo.count_dead_letters().await.unwrap(), 1);
        assert_eq!(transport.send_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn forward_failure_is_swallowed() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_sends.store(true, Ordering::SeqCst);
        let ctx = mock_context(transport.clone()).await;
        let msg = sample_message("user-1");

        // No debe entrar en pánico ni propagar nada.
        ctx.dead_letters.dead_letter(&msg, "reintentos agotados").await;

        assert_eq!(ctx.dead_letters.count(), 1);
        assert_eq!(ctx.repo.count_dead_letters().await.unwrap(), 1);
    }
}
