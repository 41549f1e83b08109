//! Dominio de Mensajería y Modelos de Datos.
//!
//! Este módulo define la unidad de telemetría que viaja por todo el pipeline
//! de entrega (`Message`), junto con su tipo de lectura y su estado de ciclo
//! de vida. El estado es la única fuente de verdad para decidir qué camino
//! (envío directo, reintento o cola offline) puede tomar cada mensaje.


use chrono::Utc;
use serde::{Serialize, Deserialize};
use uuid::Uuid;


/// Tipo de lectura producido por la capa de sensores.
///
/// El tipo se resuelve una sola vez al momento de la creación del mensaje;
/// ningún componente aguas abajo inspecciona el payload para deducirlo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReadingKind {
    HeartRate,
    Spo2,
    SkinTemperature,
    Steps,
    Generic,
}


impl ReadingKind {

    /// Código estable usado para persistencia y para el protocolo de salida.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingKind::HeartRate => "heart_rate",
            ReadingKind::Spo2 => "spo2",
            ReadingKind::SkinTemperature => "skin_temperature",
            ReadingKind::Steps => "steps",
            ReadingKind::Generic => "generic",
        }
    }

    /// Reconstruye el tipo desde su código persistido.
    ///
    /// Un código desconocido degrada a `Generic` en lugar de descartar el
    /// registro: la entrega importa más que la clasificación.
    pub fn parse(code: &str) -> Self {
        match code {
            "heart_rate" => ReadingKind::HeartRate,
            "spo2" => ReadingKind::Spo2,
            "skin_temperature" => ReadingKind::SkinTemperature,
            "steps" => ReadingKind::Steps,
            _ => ReadingKind::Generic,
        }
    }
}


/// Estado de entrega de un mensaje.
///
/// Las transiciones son monótonas: `Transmitted` y `DeadLettered` son
/// terminales y ningún componente puede sacar a un mensaje de ellas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Pending,
    Queued,
    Transmitted,
    Failed,
    DeadLettered,
}


impl MessageStatus {

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "PENDING",
            MessageStatus::Queued => "QUEUED",
            MessageStatus::Transmitted => "TRANSMITTED",
            MessageStatus::Failed => "FAILED",
            MessageStatus::DeadLettered => "DEAD_LETTERED",
        }
    }

    pub fn parse(code: &str) -> Self {
        match code {
            "QUEUED" => MessageStatus::Queued,
            "TRANSMITTED" => MessageStatus::Transmitted,
            "FAILED" => MessageStatus::Failed,
            "DEAD_LETTERED" => MessageStatus::DeadLettered,
            _ => MessageStatus::Pending,
        }
    }

    /// Un mensaje en estado terminal no es elegible para ningún camino de
    /// entrega (ni cadena de reintentos ni reconciliación de la cola).
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Transmitted | MessageStatus::DeadLettered)
    }
}


/// Unidad de telemetría a entregar al bus remoto.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub subject_id: String,
    pub kind: ReadingKind,
    pub value: f64,
    pub unit: String,
    pub captured_at: i64,
    pub source_device_id: String,
    pub retry_count: u32,
    pub status: MessageStatus,
    pub last_error: Option<String>,
}


impl Message {

    /// Crea un mensaje nuevo listo para ser admitido por el orquestador.
    pub fn new(subject_id: &str,
               kind: ReadingKind,
               value: f64,
               unit: &str,
               source_device_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject_id: subject_id.to_string(),
            kind,
            value,
            unit: unit.to_string(),
            captured_at: Utc::now().timestamp(),
            source_device_id: source_device_id.to_string(),
            retry_count: 0,
            status: MessageStatus::Pending,
            last_error: None,
        }
    }

    /// Validación de admisión: identificador y sujeto no vacíos.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty() && !self.subject_id.trim().is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_roundtrip() {
        for kind in [ReadingKind::HeartRate, ReadingKind::Spo2,
                     ReadingKind::SkinTemperature, ReadingKind::Steps,
                     ReadingKind::Generic] {
            assert_eq!(ReadingKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_kind_degrades_to_generic() {
        assert_eq!(ReadingKind::parse("barometric"), ReadingKind::Generic);
    }

    #[test]
    fn terminal_states() {
        assert!(MessageStatus::Transmitted.is_terminal());
        assert!(MessageStatus::DeadLettered.is_terminal());
        assert!(!MessageStatus::Pending.is_terminal());
        assert!(!MessageStatus::Queued.is_terminal());
        assert!(!MessageStatus::Failed.is_terminal());
    }

    #[test]
    fn new_message_is_valid_and_pending() {
        let msg = Message::new("user-1", ReadingKind::HeartRate, 72.0, "bpm", "watch-7");
        assert!(msg.is_valid());
        assert_eq!(msg.status, MessageStatus::Pending);
        assert_eq!(msg.retry_count, 0);
        assert!(msg.last_error.is_none());
    }

    #[test]
    fn empty_subject_is_invalid() {
        let mut msg = Message::new("  ", ReadingKind::Steps, 10.0, "steps", "watch-7");
        assert!(!msg.is_valid());
        msg.subject_id = "user-1".to_string();
        msg.id = String::new();
        assert!(!msg.is_valid());
    }
}
