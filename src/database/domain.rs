//! Estructuras de dominio para la persistencia de la cola offline.
//!
//! Este módulo define la forma persistida de un mensaje mientras no fue
//! entregado (`OfflineRecord`) y las estadísticas agregadas de la cola.
//! La clave primaria autoincremental de cada registro define el orden FIFO.


use serde::Serialize;
use sqlx::FromRow;
use crate::message::domain::{Message, MessageStatus, ReadingKind};


/// Forma persistida de un `Message` dentro de la cola offline.
///
/// Proyección plana del mensaje más la clave FIFO (`id`) y el instante de
/// encolado. Los códigos de tipo y estado se guardan como texto estable.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OfflineRecord {
    pub id: i64,
    pub message_id: String,
    pub subject_id: String,
    pub kind: String,
    pub value: f64,
    pub unit: String,
    pub captured_at: i64,
    pub source_device_id: String,
    pub retry_count: i64,
    pub status: String,
    pub last_error: Option<String>,
    pub enqueued_at: i64,
}


impl OfflineRecord {

    /// Reconstruye el mensaje original a partir del registro persistido.
    pub fn into_message(self) -> Message {
        Message {
            id: self.message_id,
            subject_id: self.subject_id,
            kind: ReadingKind::parse(&self.kind),
            value: self.value,
            unit: self.unit,
            captured_at: self.captured_at,
            source_device_id: self.source_device_id,
            retry_count: self.retry_count.max(0) as u32,
            status: MessageStatus::parse(&self.status),
            last_error: self.last_error,
        }
    }
}


/// Estadísticas agregadas de la cola offline.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total: i64,
    pub pending: i64,
    pub failed_over_threshold: i64,
    pub oldest_timestamp: Option<i64>,
}
