//! Lógica de monitoreo de salud del transporte.
//!
//! Este módulo ejecuta la sonda periódica contra el bus remoto y mantiene la
//! instantánea `HealthState` publicada en un canal watch.
//!
//! # Arquitectura de Actores
//! La tarea corre en su propio ciclo de intervalo, independiente del
//! orquestador y del motor de reintentos:
//! 1. En cada tick lanza una sonda acotada por el timeout de conexión.
//! 2. Aplica el resultado a la máquina de estados con histéresis.
//! 3. Publica la instantánea; los suscriptores leen sin hacer I/O.
//!
//! Las excepciones de la sonda cuentan como fallos; la tarea nunca propaga
//! errores, sólo registra.


use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use crate::context::domain::AppContext;
use crate::health::domain::HealthState;
use crate::transport::domain::probe_with_timeout;


/// Ejecuta el bucle principal de sondas de salud.
///
/// La primera sonda corre inmediatamente al crear la tarea; las siguientes
/// cada `health_check_interval_secs`. El bucle termina cuando se señala el
/// apagado del proceso.
pub async fn run_health_monitor(tx_state: watch::Sender<HealthState>,
                                app_context: AppContext,
                                mut shutdown: watch::Receiver<bool>) {

    info!("Info: health monitor task creada");

    let mut ticker = interval(Duration::from_secs(app_context.system.health_check_interval_secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                probe_once(&tx_state, &app_context).await;
            }
            changed = shutdown.changed() => {
                // El cierre del canal de apagado equivale a la señal.
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Info: health monitor task finalizada");
}


/// Fuerza una sonda fuera del ciclo programado.
///
/// Registra su resultado en el estado compartido y devuelve el booleano de
/// esta sonda puntual, sin alterar la cadencia del intervalo.
pub async fn perform_manual_health_check(tx_state: &watch::Sender<HealthState>,
                                         app_context: &AppContext) -> bool {
    probe_once(tx_state, app_context).await
}


async fn probe_once(tx_state: &watch::Sender<HealthState>,
                    app_context: &AppContext) -> bool {

    let timeout = Duration::from_secs(app_context.system.connection_timeout_secs);
    let max_failures = app_context.system.max_consecutive_failures;

    let healthy_before = tx_state.borrow().is_healthy;
    let ok = probe_with_timeout(app_context.transport.as_ref(), timeout).await.is_ok();
    let now = Utc::now().timestamp();

    tx_state.send_modify(|state| {
        if ok {
            state.apply_success(now);
        } else {
            state.apply_failure(now, max_failures);
        }
    });

    let snapshot = tx_state.borrow().clone();
    if snapshot.is_healthy != healthy_before {
        if snapshot.is_healthy {
            info!(uptime = snapshot.uptime_percentage(),
                  "Info: conexión recuperada, veredicto saludable");
        } else {
            warn!(consecutive_failures = snapshot.consecutive_failures,
                  "Warning: racha de sondas fallidas, veredicto no saludable");
        }
    } else {
        debug!(ok, consecutive_failures = snapshot.consecutive_failures,
               "Debug: sonda de salud aplicada");
    }

    ok
}


pub fn start_health_monitor(tx_state: watch::Sender<HealthState>,
                            app_context: AppContext,
                            shutdown: watch::Receiver<bool>) {

    info!("Info: iniciando tarea health monitor");
    tokio::spawn(async move {
        run_health_monitor(tx_state, app_context, shutdown).await;
    });
}
