use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use crate::message::domain::Message;
use crate::system::domain::System;
use super::domain::{Transport, TransportError};


/// Cliente HTTP hacia el endpoint de ingesta del Edge.
///
/// `send` publica la lectura en `POST {base}/telemetry`; `probe` consulta
/// `GET {base}/health`. El timeout del cliente replica el timeout de
/// conexión global del sistema.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}


impl HttpTransport {
    pub fn new(system: &System) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(system.connection_timeout_secs))
            .connect_timeout(Duration::from_secs(system.connection_timeout_secs))
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: system.edge_endpoint.clone(),
        })
    }

    fn map_error(e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_status() {
            TransportError::Rejected(e.to_string())
        } else {
            TransportError::Connection(e.to_string())
        }
    }
}


#[async_trait]
impl Transport for HttpTransport {

    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        let url = format!("{}/telemetry", self.base_url);
        let response = self.client
            .post(&url)
            .json(message)
            .send()
            .await
            .map_err(Self::map_error)?;

        response.error_for_status().map_err(Self::map_error)?;
        Ok(())
    }

    async fn probe(&self) -> Result<(), TransportError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_error)?;

        response.error_for_status().map_err(Self::map_error)?;
        Ok(())
    }
}
