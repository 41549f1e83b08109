//! Definición del Contexto de Aplicación (Shared State).
//!
//! Este módulo implementa el patrón de **Estado Compartido** para aplicaciones
//! asíncronas. El `AppContext` actúa como un contenedor de "Inyección de
//! Dependencias" manual, agrupando los recursos que deben ser accesibles por
//! múltiples tareas concurrentes (cola offline, transporte, configuración,
//! contadores, dead-letter). No hay estado global ambiente: todo componente
//! recibe el contexto en su construcción.


use std::sync::Arc;
use crate::database::repository::Repository;
use crate::dead_letter::logic::DeadLetterHandler;
use crate::orchestrator::domain::TransmissionStats;
use crate::system::domain::System;
use crate::transport::domain::Transport;
use crate::transport::logic::HttpTransport;


#[derive(Clone)]
pub struct AppContext {
    pub repo: Repository,
    pub system: Arc<System>,
    pub transport: Arc<dyn Transport>,
    pub stats: Arc<TransmissionStats>,
    pub dead_letters: Arc<DeadLetterHandler>,
}


impl AppContext {

    /// Construye el contexto de producción.
    ///
    /// La inicialización del repositorio reintenta hasta que el
    /// almacenamiento local esté disponible; un cliente HTTP mal configurado
    /// es un error de arranque y entra en pánico, igual que la configuración.
    pub async fn new(system: Arc<System>) -> Self {
        let repo = Repository::create_repository(&system.offline_db_url,
                                                 system.db_pool_size,
                                                 system.max_offline_records,
                                                 system.eviction_batch).await;

        let transport: Arc<dyn Transport> = Arc::new(
            HttpTransport::new(&system).expect("no se pudo construir el cliente HTTP")
        );

        let stats = Arc::new(TransmissionStats::default());
        let dead_letters = Arc::new(
            DeadLetterHandler::new(repo.clone(), transport.clone(), &system)
        );

        Self { repo, system, transport, stats, dead_letters }
    }
}
