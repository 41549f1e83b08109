use tokio::sync::{mpsc, watch};
use crate::config::channels::{NETWORK_CAPACITY, SUBMIT_CAPACITY};
use crate::health::domain::HealthState;
use crate::message::domain::Message;
use crate::network::domain::NetworkState;


pub struct Channels {
    pub producer_to_orchestrator: mpsc::Sender<Message>,
    pub orchestrator_from_producer: mpsc::Receiver<Message>,

    pub orchestrator_to_retry: mpsc::Sender<Message>,
    pub retry_from_orchestrator: mpsc::Receiver<Message>,

    pub platform_to_network: mpsc::Sender<NetworkState>,
    pub network_from_platform: mpsc::Receiver<NetworkState>,

    pub health_state_tx: watch::Sender<HealthState>,
    pub health_state_rx: watch::Receiver<HealthState>,

    pub network_state_tx: watch::Sender<NetworkState>,
    pub network_state_rx: watch::Receiver<NetworkState>,

    pub shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}


impl Channels {
    pub fn new() -> Channels {
        let (p_to_o, o_from_p) = mpsc::channel::<Message>(SUBMIT_CAPACITY);
        let (o_to_r, r_from_o) = mpsc::channel::<Message>(SUBMIT_CAPACITY);
        let (pl_to_n, n_from_pl) = mpsc::channel::<NetworkState>(NETWORK_CAPACITY);
        let (health_tx, health_rx) = watch::channel(HealthState::new());
        let (network_tx, network_rx) = watch::channel(NetworkState::initial());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            producer_to_orchestrator: p_to_o,
            orchestrator_from_producer: o_from_p,
            orchestrator_to_retry: o_to_r,
            retry_from_orchestrator: r_from_o,
            platform_to_network: pl_to_n,
            network_from_platform: n_from_pl,
            health_state_tx: health_tx,
            health_state_rx: health_rx,
            network_state_tx: network_tx,
            network_state_rx: network_rx,
            shutdown_tx,
            shutdown_rx,
        }
    }
}
