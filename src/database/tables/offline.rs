use chrono::Utc;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use tracing::warn;
use crate::database::domain::{OfflineRecord, StoreStats};
use crate::message::domain::Message;


pub async fn create_table_offline(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS offline_record (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id         TEXT NOT NULL,
            subject_id         TEXT NOT NULL,
            kind               TEXT NOT NULL,
            value              REAL NOT NULL,
            unit               TEXT NOT NULL,
            captured_at        BIGINT NOT NULL,
            source_device_id   TEXT NOT NULL,
            retry_count        BIGINT NOT NULL DEFAULT 0,
            status             TEXT NOT NULL,
            last_error         TEXT,
            enqueued_at        BIGINT NOT NULL
        );
        "#
    )
        .await?;

    Ok(())
}


/// Inserta un mensaje respetando la capacidad máxima de la cola.
///
/// Si la cola está llena se descartan primero los `eviction_batch` registros
/// más viejos (pérdida de datos explícita y registrada). Conteo, desalojo e
/// inserción ocurren dentro de la misma transacción.
pub async fn insert_offline(pool: &SqlitePool,
                            message: &Message,
                            max_records: i64,
                            eviction_batch: i64) -> Result<(), sqlx::Error> {

    let mut tx = pool.begin().await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM offline_record")
        .fetch_one(&mut *tx)
        .await?;

    if total >= max_records {
        let evicted = sqlx::query(
            "DELETE FROM offline_record WHERE id IN \
             (SELECT id FROM offline_record ORDER BY id ASC LIMIT ?)"
        )
            .bind(eviction_batch)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        warn!(evicted, capacity = max_records,
              "Warning: cola offline llena, registros más viejos descartados");
    }

    sqlx::query(
        "INSERT INTO offline_record (
            message_id, subject_id, kind, value, unit,
            captured_at, source_device_id, retry_count, status,
            last_error, enqueued_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
        .bind(&message.id)
        .bind(&message.subject_id)
        .bind(message.kind.as_str())
        .bind(message.value)
        .bind(&message.unit)
        .bind(message.captured_at)
        .bind(&message.source_device_id)
        .bind(message.retry_count as i64)
        .bind(message.status.as_str())
        .bind(&message.last_error)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}


const RETRYABLE_COLUMNS: &str =
    "id, message_id, subject_id, kind, value, unit, captured_at, \
     source_device_id, retry_count, status, last_error, enqueued_at";


/// Registros aún entregables, los más viejos primero.
pub async fn select_all_offline(pool: &SqlitePool) -> Result<Vec<OfflineRecord>, sqlx::Error> {
    sqlx::query_as::<_, OfflineRecord>(&format!(
        "SELECT {RETRYABLE_COLUMNS} FROM offline_record \
         WHERE status IN ('PENDING', 'QUEUED') ORDER BY id ASC"
    ))
        .fetch_all(pool)
        .await
}


pub async fn select_offline_by_subject(pool: &SqlitePool,
                                       subject_id: &str) -> Result<Vec<OfflineRecord>, sqlx::Error> {
    sqlx::query_as::<_, OfflineRecord>(&format!(
        "SELECT {RETRYABLE_COLUMNS} FROM offline_record \
         WHERE subject_id = ? AND status IN ('PENDING', 'QUEUED') ORDER BY id ASC"
    ))
        .bind(subject_id)
        .fetch_all(pool)
        .await
}


pub async fn delete_offline_by_ids(pool: &SqlitePool,
                                   ids: &[i64]) -> Result<(), sqlx::Error> {

    if ids.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("DELETE FROM offline_record WHERE id IN (");
    let mut separated = query_builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    query_builder.push(")");

    query_builder.build().execute(pool).await?;
    Ok(())
}


pub async fn increment_offline_retry_count(pool: &SqlitePool,
                                           ids: &[i64]) -> Result<(), sqlx::Error> {

    if ids.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("UPDATE offline_record SET retry_count = retry_count + 1 WHERE id IN (");
    let mut separated = query_builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    query_builder.push(")");

    query_builder.build().execute(pool).await?;
    Ok(())
}


/// Extrae (selecciona y borra, en una transacción) los registros que
/// agotaron su presupuesto de reintentos, para su promoción a dead-letter.
pub async fn purge_offline_exceeding(pool: &SqlitePool,
                                     max_retries: i64) -> Result<Vec<OfflineRecord>, sqlx::Error> {

    let mut tx = pool.begin().await?;

    let purged = sqlx::query_as::<_, OfflineRecord>(&format!(
        "SELECT {RETRYABLE_COLUMNS} FROM offline_record WHERE retry_count >= ?"
    ))
        .bind(max_retries)
        .fetch_all(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM offline_record WHERE retry_count >= ?")
        .bind(max_retries)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(purged)
}


pub async fn count_offline(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM offline_record")
        .fetch_one(pool)
        .await
}


pub async fn offline_stats(pool: &SqlitePool,
                           max_retries: i64) -> Result<StoreStats, sqlx::Error> {

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM offline_record")
        .fetch_one(pool)
        .await?;

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM offline_record WHERE status IN ('PENDING', 'QUEUED')"
    )
        .fetch_one(pool)
        .await?;

    let failed_over_threshold: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM offline_record WHERE retry_count >= ?"
    )
        .bind(max_retries)
        .fetch_one(pool)
        .await?;

    let oldest_timestamp: Option<i64> = sqlx::query_scalar(
        "SELECT MIN(enqueued_at) FROM offline_record"
    )
        .fetch_one(pool)
        .await?;

    Ok(StoreStats {
        total,
        pending,
        failed_over_threshold,
        oldest_timestamp,
    })
}
