use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::time::sleep;
use tracing::error;
use crate::config::sqlite::WAIT_FOR;
use crate::database::domain::{OfflineRecord, StoreStats};
use crate::database::tables::dead_letter::{count_dead_letters, create_table_dead_letter, insert_dead_letter};
use crate::database::tables::offline::{count_offline, create_table_offline, delete_offline_by_ids,
                                       increment_offline_retry_count, insert_offline, offline_stats,
                                       purge_offline_exceeding, select_all_offline, select_offline_by_subject};
use crate::message::domain::Message;


/// Frontera de durabilidad del pipeline: cola offline y registro dead-letter.
///
/// Todas las operaciones multi-paso (desalojo+inserción, purga) corren dentro
/// de una transacción sobre el mismo pool, de modo que no haya actualizaciones
/// perdidas entre `increment_retry_count` y `delete_by_ids` para un mismo lote.
#[derive(Clone, Debug)]
pub struct Repository {
    pool: SqlitePool,
    max_records: i64,
    eviction_batch: i64,
}


impl Repository {

    pub async fn new(database_url: &str,
                     pool_size: u32,
                     max_records: i64,
                     eviction_batch: i64) -> Result<Self, sqlx::Error> {
        let pool = create_pool(database_url, pool_size).await?;
        init_schema(&pool).await?;
        Ok(Self { pool, max_records, eviction_batch })
    }

    /// Reintenta la inicialización hasta que el almacenamiento esté listo.
    pub async fn create_repository(database_url: &str,
                                   pool_size: u32,
                                   max_records: i64,
                                   eviction_batch: i64) -> Self {
        loop {
            match Self::new(database_url, pool_size, max_records, eviction_batch).await {
                Ok(repo) => return repo,
                Err(e) => {
                    error!("Error inicializando repo: {:?}", e);
                    sleep(WAIT_FOR).await;
                }
            }
        }
    }

    /// Encola un mensaje, desalojando primero los más viejos si la cola
    /// está en capacidad.
    pub async fn put(&self, message: &Message) -> Result<(), sqlx::Error> {
        insert_offline(&self.pool, message, self.max_records, self.eviction_batch).await
    }

    pub async fn get_all(&self) -> Result<Vec<OfflineRecord>, sqlx::Error> {
        select_all_offline(&self.pool).await
    }

    pub async fn get_all_for_subject(&self, subject_id: &str) -> Result<Vec<OfflineRecord>, sqlx::Error> {
        select_offline_by_subject(&self.pool, subject_id).await
    }

    pub async fn delete_by_ids(&self, ids: &[i64]) -> Result<(), sqlx::Error> {
        delete_offline_by_ids(&self.pool, ids).await
    }

    pub async fn increment_retry_count(&self, ids: &[i64]) -> Result<(), sqlx::Error> {
        increment_offline_retry_count(&self.pool, ids).await
    }

    pub async fn purge_exceeding(&self, max_retries: i64) -> Result<Vec<OfflineRecord>, sqlx::Error> {
        purge_offline_exceeding(&self.pool, max_retries).await
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        count_offline(&self.pool).await
    }

    pub async fn stats(&self, max_retries: i64) -> Result<StoreStats, sqlx::Error> {
        offline_stats(&self.pool, max_retries).await
    }

    pub async fn insert_dead_letter(&self,
                                    message: &Message,
                                    reason: &str,
                                    dead_lettered_at: i64) -> Result<bool, sqlx::Error> {
        insert_dead_letter(&self.pool, message, reason, dead_lettered_at).await
    }

    pub async fn count_dead_letters(&self) -> Result<i64, sqlx::Error> {
        count_dead_letters(&self.pool).await
    }
}


async fn create_pool(database_url: &str, pool_size: u32) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(pool_size)
        .connect(database_url)
        .await?;

    Ok(pool)
}


async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    create_table_offline(pool).await?;
    create_table_dead_letter(pool).await?;
    Ok(())
}
