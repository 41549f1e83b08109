//! Módulo de configuración central y gestión del entorno de ejecución.
//!
//! Este módulo actúa como la fuente única de verdad para la configuración de
//! la aplicación. Se encarga de leer las variables de entorno, establecer
//! valores por defecto seguros y proveer las estructuras necesarias para
//! iniciar los subsistemas (cola offline, transporte, monitores, logging).
//!
//! # Funcionalidades Principales
//! * **Carga de Configuración:** Lee de `.env` en desarrollo y variables de sistema en producción.
//! * **Observabilidad:** Configura `tracing_subscriber` para logs estructurados o legibles.
//! * **Superficie de Configuración:** Todos los umbrales del pipeline de entrega.
//!


use std::env;
use tracing_subscriber::{fmt, EnvFilter};


/// Representa la configuración global del sistema y el estado del entorno.
///
/// Esta estructura centraliza todas las variables de entorno y configuraciones
/// necesarias para iniciar los servicios (cola offline, transporte, monitores).
///
#[derive(Debug)]
pub struct System {
    /// URL de conexión a la base SQLite de la cola offline
    /// (ej. `sqlite://telemetry_offline.db?mode=rwc`).
    pub offline_db_url: String,

    /// Tamaño máximo del pool de conexiones a la base de datos.
    /// Por defecto: `5`.
    pub db_pool_size: u32,

    /// Endpoint HTTP del Edge/bus de mensajes (ej. `https://edge.local:8443`).
    pub edge_endpoint: String,

    /// Timeout de conexión y de envío hacia el transporte, en segundos.
    /// Por defecto: `10`.
    pub connection_timeout_secs: u64,

    /// Intervalo entre sondas de salud, en segundos.
    /// Por defecto: `30`.
    pub health_check_interval_secs: u64,

    /// Sondas fallidas consecutivas necesarias para el veredicto no saludable.
    /// Por defecto: `5`.
    pub max_consecutive_failures: u32,

    /// Retardo inicial del retroceso exponencial, en milisegundos.
    /// Por defecto: `1000`.
    pub retry_initial_delay_ms: u64,

    /// Multiplicador del retroceso exponencial.
    /// Por defecto: `2.0`.
    pub retry_backoff_multiplier: f64,

    /// Tope del retardo entre reintentos, en segundos.
    /// Por defecto: `300`.
    pub retry_max_delay_secs: u64,

    /// Presupuesto de intentos por mensaje antes de dead-letter.
    /// Por defecto: `5`.
    pub max_retry_attempts: u32,

    /// Intervalo del ciclo de reconciliación de la cola offline, en segundos.
    /// Por defecto: `60`.
    pub retry_batch_interval_secs: u64,

    /// Capacidad máxima de la cola offline.
    /// Por defecto: `10000`.
    pub max_offline_records: i64,

    /// Cantidad de registros más viejos desalojados al llegar a capacidad.
    /// Por defecto: `1000`.
    pub eviction_batch: i64,

    /// Cada cuántos dead-letters se emite una alerta estructurada.
    /// Por defecto: `10`.
    pub dead_letter_alert_every: u64,

    /// Entorno de ejecución actual (`development`, `staging`, `production`).
    /// Afecta el formato de logs y la carga de archivos `.env`.
    pub environment: String,

    /// Nivel de detalle de los logs (ej. `info`, `debug`, `warn`).
    /// Se autoconfigura según el `environment` si no se especifica.
    pub rust_log: String,
}


impl System {

    /// Carga la configuración desde las variables de entorno.
    ///
    /// # Comportamiento
    /// * Si `ENVIRONMENT` es "development", intenta cargar un archivo `.env`.
    /// * Si falta alguna variable requerida (como `EDGE_ENDPOINT`), el programa entrará en pánico (`panic`).
    /// * Establece valores por defecto para variables opcionales.
    ///
    /// # Panics
    /// * Si `EDGE_ENDPOINT` no está definida.
    /// * Si las variables numéricas no son números válidos.
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {

        let environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".into());

        if environment == "development" {
            dotenv::dotenv().ok();
        }

        Ok(System {
            offline_db_url: env::var("OFFLINE_DB_URL")
                .unwrap_or("sqlite://telemetry_offline.db?mode=rwc".to_string()),

            db_pool_size: env::var("DB_POOL_SIZE")
                .unwrap_or("5".to_string())
                .parse()
                .expect("DB_POOL_SIZE debe ser un número"),

            edge_endpoint: env::var("EDGE_ENDPOINT")
                .expect("EDGE_ENDPOINT no está configurada"),

            connection_timeout_secs: env::var("CONNECTION_TIMEOUT_SECS")
                .unwrap_or("10".to_string())
                .parse()
                .expect("CONNECTION_TIMEOUT_SECS debe ser un número"),

            health_check_interval_secs: env::var("HEALTH_CHECK_INTERVAL_SECS")
                .unwrap_or("30".to_string())
                .parse()
                .expect("HEALTH_CHECK_INTERVAL_SECS debe ser un número"),

            max_consecutive_failures: env::var("MAX_CONSECUTIVE_FAILURES")
                .unwrap_or("5".to_string())
                .parse()
                .expect("MAX_CONSECUTIVE_FAILURES debe ser un número"),

            retry_initial_delay_ms: env::var("RETRY_INITIAL_DELAY_MS")
                .unwrap_or("1000".to_string())
                .parse()
                .expect("RETRY_INITIAL_DELAY_MS debe ser un número"),

            retry_backoff_multiplier: env::var("RETRY_BACKOFF_MULTIPLIER")
                .unwrap_or("2.0".to_string())
                .parse()
                .expect("RETRY_BACKOFF_MULTIPLIER debe ser un número"),

            retry_max_delay_secs: env::var("RETRY_MAX_DELAY_SECS")
                .unwrap_or("300".to_string())
                .parse()
                .expect("RETRY_MAX_DELAY_SECS debe ser un número"),

            max_retry_attempts: env::var("MAX_RETRY_ATTEMPTS")
                .unwrap_or("5".to_string())
                .parse()
                .expect("MAX_RETRY_ATTEMPTS debe ser un número"),

            retry_batch_interval_secs: env::var("RETRY_BATCH_INTERVAL_SECS")
                .unwrap_or("60".to_string())
                .parse()
                .expect("RETRY_BATCH_INTERVAL_SECS debe ser un número"),

            max_offline_records: env::var("MAX_OFFLINE_RECORDS")
                .unwrap_or("10000".to_string())
                .parse()
                .expect("MAX_OFFLINE_RECORDS debe ser un número"),

            eviction_batch: env::var("EVICTION_BATCH")
                .unwrap_or("1000".to_string())
                .parse()
                .expect("EVICTION_BATCH debe ser un número"),

            dead_letter_alert_every: env::var("DEAD_LETTER_ALERT_EVERY")
                .unwrap_or("10".to_string())
                .parse()
                .expect("DEAD_LETTER_ALERT_EVERY debe ser un número"),

            rust_log: env::var("RUST_LOG")
                .unwrap_or_else(|_| {
                    match environment.as_str() {
                        "development" => "debug".to_string(),
                        "staging" => "info".to_string(),
                        _ => "warn".to_string(),
                    }
                }),

            environment,
        })
    }
}


/// Inicializa el sistema de trazabilidad y logs (Tracing).
///
/// Configura el formato de salida basándose en el entorno:
/// * **Production**: Salida JSON (para logs estructurados en la nube).
/// * **Development/Otros**: Salida "Pretty" (colores y formato legible).
///
/// # Argumentos
/// * `system`: Referencia a la configuración cargada para leer el nivel de log (`rust_log`).
pub fn init_tracing(system: &System) {

    let filter = EnvFilter::try_new(&system.rust_log)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter).with_target(false);

    if system.environment == "production" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}
