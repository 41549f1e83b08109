use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use super::domain::NetworkState;


/// Consume las actualizaciones de conectividad que empuja la capa de
/// plataforma y publica sólo los cambios reales en el canal watch, para que
/// orquestador y motor de reintentos lean instantáneas sin sondear.
pub async fn run_network_monitor(tx_state: watch::Sender<NetworkState>,
                                 mut rx_platform: mpsc::Receiver<NetworkState>) {

    info!("Info: network monitor task creada");

    while let Some(update) = rx_platform.recv().await {
        let changed = tx_state.send_if_modified(|current| {
            if *current != update {
                *current = update;
                true
            } else {
                false
            }
        });

        if changed {
            info!(available = update.available,
                  kind = ?update.kind,
                  metered = update.metered,
                  "Info: cambio de conectividad");
        } else {
            debug!("Debug: actualización de red sin cambios");
        }
    }

    info!("Info: network monitor task finalizada");
}


pub fn start_network_monitor(tx_state: watch::Sender<NetworkState>,
                             rx_platform: mpsc::Receiver<NetworkState>) {

    tokio::spawn(async move {
        run_network_monitor(tx_state, rx_platform).await;
    });
}
