//! Utilidades compartidas por los tests: transporte simulado, contexto en
//! memoria y fixtures de mensajes.


use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use async_trait::async_trait;
use crate::context::domain::AppContext;
use crate::database::repository::Repository;
use crate::dead_letter::logic::DeadLetterHandler;
use crate::health::domain::HealthState;
use crate::message::domain::{Message, ReadingKind};
use crate::orchestrator::domain::TransmissionStats;
use crate::system::domain::System;
use crate::transport::domain::{Transport, TransportError};


/// Transporte simulado con fallos conmutables y contadores de llamadas.
pub struct MockTransport {
    pub fail_sends: AtomicBool,
    pub fail_probes: AtomicBool,
    pub send_calls: AtomicU32,
    pub probe_calls: AtomicU32,
    /// Falla sólo los envíos de este `message_id` (fallo parcial de lote).
    pub fail_send_for: Mutex<Option<String>>,
}


impl MockTransport {
    pub fn new() -> Self {
        Self {
            fail_sends: AtomicBool::new(false),
            fail_probes: AtomicBool::new(false),
            send_calls: AtomicU32::new(0),
            probe_calls: AtomicU32::new(0),
            fail_send_for: Mutex::new(None),
        }
    }
}


#[async_trait]
impl Transport for MockTransport {

    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("mock: envío fallido".to_string()));
        }
        if let Some(target) = self.fail_send_for.lock().unwrap().as_ref() {
            if *target == message.id {
                return Err(TransportError::Connection("mock: envío fallido".to_string()));
            }
        }
        Ok(())
    }

    async fn probe(&self) -> Result<(), TransportError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_probes.load(Ordering::SeqCst) {
            return Err(TransportError::Timeout);
        }
        Ok(())
    }
}


/// Configuración chica y rápida para tests: reintentos sin retardo y
/// capacidades reducidas.
pub fn test_system() -> System {
    System {
        offline_db_url: "sqlite::memory:".to_string(),
        db_pool_size: 1,
        edge_endpoint: "http://localhost:0".to_string(),
        connection_timeout_secs: 5,
        health_check_interval_secs: 1,
        max_consecutive_failures: 3,
        retry_initial_delay_ms: 0,
        retry_backoff_multiplier: 2.0,
        retry_max_delay_secs: 1,
        max_retry_attempts: 3,
        retry_batch_interval_secs: 1,
        max_offline_records: 100,
        eviction_batch: 10,
        dead_letter_alert_every: 10,
        environment: "test".to_string(),
        rust_log: "debug".to_string(),
    }
}


/// Contexto completo sobre una base en memoria y el transporte simulado.
pub async fn mock_context(transport: Arc<MockTransport>) -> AppContext {
    let system = Arc::new(test_system());
    let repo = Repository::new(&system.offline_db_url,
                               system.db_pool_size,
                               system.max_offline_records,
                               system.eviction_batch)
        .await
        .expect("repo en memoria");

    let transport: Arc<dyn Transport> = transport;
    let dead_letters = Arc::new(
        DeadLetterHandler::new(repo.clone(), transport.clone(), &system)
    );

    AppContext {
        repo,
        system,
        transport,
        stats: Arc::new(TransmissionStats::default()),
        dead_letters,
    }
}


pub fn sample_message(subject_id: &str) -> Message {
    Message::new(subject_id, ReadingKind::HeartRate, 72.0, "bpm", "watch-7")
}


/// Estado de salud ya caído: racha completa de sondas fallidas.
pub fn unhealthy_state(max_consecutive_failures: u32) -> HealthState {
    let mut state = HealthState::new();
    for _ in 0..max_consecutive_failures {
        state.apply_failure(0, max_consecutive_failures);
    }
    state
}
