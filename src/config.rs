/// Constantes de configuración para la base de datos local.
pub mod sqlite {
    use tokio::time::Duration;

    pub const WAIT_FOR: Duration = Duration::from_secs(5);
}

/// Capacidades de los canales internos.
pub mod channels {
    pub const SUBMIT_CAPACITY: usize = 200;
    pub const NETWORK_CAPACITY: usize = 10;
}

/// Espera máxima de apagado antes de abandonar las tareas pendientes.
pub mod shutdown {
    use tokio::time::Duration;

    pub const GRACE_PERIOD: Duration = Duration::from_secs(2);
}
