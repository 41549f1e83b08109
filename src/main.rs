use std::sync::Arc;
use tracing::{error, info};
use crate::channels::domain::Channels;
use crate::config::shutdown::GRACE_PERIOD;
use crate::context::domain::AppContext;
use crate::health::logic::start_health_monitor;
use crate::network::logic::start_network_monitor;
use crate::orchestrator::logic::{start_orchestrator, Orchestrator};
use crate::retry::logic::{start_retry_engine, RetryEngine};
use crate::system::domain::{init_tracing, System};

mod channels;
mod config;
mod context;
mod database;
mod dead_letter;
mod health;
mod message;
mod network;
mod orchestrator;
mod retry;
mod system;
mod transport;

#[cfg(test)]
mod test_utils;


#[tokio::main]
async fn main() {

    let system = Arc::new(System::new().expect("configuración inválida"));

    init_tracing(&system);

    let channels = Channels::new();
    let app_context = AppContext::new(system).await;

    start_network_monitor(channels.network_state_tx,
                          channels.network_from_platform);

    start_health_monitor(channels.health_state_tx.clone(),
                         app_context.clone(),
                         channels.shutdown_rx.clone());

    let retry_engine = RetryEngine::new(app_context.clone(),
                                        channels.health_state_rx.clone(),
                                        channels.shutdown_rx.clone());
    start_retry_engine(channels.retry_from_orchestrator, retry_engine);

    let orchestrator = Orchestrator::new(app_context.clone(),
                                         channels.health_state_tx,
                                         channels.network_state_rx,
                                         channels.orchestrator_to_retry);
    start_orchestrator(channels.orchestrator_from_producer,
                       orchestrator,
                       channels.shutdown_rx);

    // Extremos entregados a los colaboradores externos: la capa de
    // adquisición empuja lecturas y la plataforma empuja estado de red.
    let _producer_tx = channels.producer_to_orchestrator;
    let _platform_tx = channels.platform_to_network;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Error: no se pudo escuchar la señal de apagado. {e}");
    }

    info!("Info: señal de apagado recibida, cancelando tareas");
    let _ = channels.shutdown_tx.send(true);

    // Espera acotada: los envíos en vuelo terminan o expiran solos.
    tokio::time::sleep(GRACE_PERIOD).await;
    info!("Info: servicio finalizado");
}
