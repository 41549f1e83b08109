//! Interfaz hacia el bus de mensajes remoto.
//!
//! El pipeline de entrega nunca conoce el cliente concreto: todo envío y toda
//! sonda de vida pasan por el trait `Transport`. El cliente real (HTTP en
//! `logic.rs`) se inyecta vía `AppContext`; los tests inyectan un mock.


use std::time::Duration;
use async_trait::async_trait;
use thiserror::Error;
use crate::message::domain::Message;


/// Errores operativos del transporte.
///
/// Todos se consideran recuperables aguas arriba (reintento, buffering o
/// dead-letter); ninguno cruza la llamada de `submit` del productor.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("tiempo de espera agotado")]
    Timeout,
    #[error("fallo de conexión: {0}")]
    Connection(String),
    #[error("rechazado por el bus: {0}")]
    Rejected(String),
}


/// Colaborador externo: cliente del bus de mensajes.
///
/// El transporte aplica su propio protocolo de cable y serialización.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Entrega un mensaje al bus remoto.
    async fn send(&self, message: &Message) -> Result<(), TransportError>;

    /// Sonda de vida liviana contra el bus remoto.
    async fn probe(&self) -> Result<(), TransportError>;
}


/// Envío acotado en el tiempo.
///
/// Ningún llamador debe bloquearse más allá del timeout de conexión
/// configurado, aun si la implementación concreta no respeta el suyo.
pub async fn send_with_timeout(transport: &dyn Transport,
                               message: &Message,
                               timeout: Duration) -> Result<(), TransportError> {

    match tokio::time::timeout(timeout, transport.send(message)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}


/// Sonda acotada en el tiempo. Un timeout cuenta como sonda fallida.
pub async fn probe_with_timeout(transport: &dyn Transport,
                                timeout: Duration) -> Result<(), TransportError> {

    match tokio::time::timeout(timeout, transport.probe()).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}
