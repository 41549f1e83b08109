use sqlx::{Executor, SqlitePool};
use crate::message::domain::Message;


pub async fn create_table_dead_letter(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS dead_letter (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id         TEXT NOT NULL UNIQUE,
            subject_id         TEXT NOT NULL,
            kind               TEXT NOT NULL,
            value              REAL NOT NULL,
            unit               TEXT NOT NULL,
            captured_at        BIGINT NOT NULL,
            source_device_id   TEXT NOT NULL,
            retry_count        BIGINT NOT NULL,
            reason             TEXT NOT NULL,
            dead_lettered_at   BIGINT NOT NULL
        );
        "#
    )
        .await?;

    Ok(())
}


/// Registra la copia marcada de un mensaje permanentemente fallido.
///
/// `INSERT OR IGNORE` sobre `message_id` hace la operación idempotente.
/// Devuelve `true` sólo cuando el registro es nuevo.
pub async fn insert_dead_letter(pool: &SqlitePool,
                                message: &Message,
                                reason: &str,
                                dead_lettered_at: i64) -> Result<bool, sqlx::Error> {

    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO dead_letter (
            message_id, subject_id, kind, value, unit,
            captured_at, source_device_id, retry_count, reason, dead_lettered_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
        .bind(&message.id)
        .bind(&message.subject_id)
        .bind(message.kind.as_str())
        .bind(message.value)
        .bind(&message.unit)
        .bind(message.captured_at)
        .bind(&message.source_device_id)
        .bind(message.retry_count as i64)
        .bind(reason)
        .bind(dead_lettered_at)
        .execute(pool)
        .await?
        .rows_affected();

    Ok(inserted > 0)
}


pub async fn count_dead_letters(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM dead_letter")
        .fetch_one(pool)
        .await
}
