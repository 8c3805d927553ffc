use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the schema migrations in order, skipping versions already applied.
///
/// Version 1 holds the challenge-state table; version 2 the course catalog.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    async fn mark_applied(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(version)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: challenge sessions. Value ranges are checked on load, not here,
    // so rows written by older builds still surface as integrity errors.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS challenge_states (
                    user_id INTEGER PRIMARY KEY,
                    mode TEXT NOT NULL,
                    lives_remaining INTEGER NOT NULL,
                    courses_cleared INTEGER NOT NULL,
                    courses_attempted INTEGER NOT NULL,
                    last_result INTEGER NOT NULL,
                    last_updated TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        mark_applied(&mut tx, 1).await?;
        tx.commit().await?;
    }

    // Version 2: course catalog.
    if !is_applied(pool, 2).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS objects (
                    data_id INTEGER PRIMARY KEY,
                    owner INTEGER NOT NULL,
                    size INTEGER NOT NULL CHECK (size >= 0),
                    name TEXT NOT NULL,
                    data_type INTEGER NOT NULL,
                    meta_binary BLOB NOT NULL,
                    permission INTEGER NOT NULL,
                    permission_recipients TEXT NOT NULL DEFAULT '',
                    delete_permission INTEGER NOT NULL,
                    delete_permission_recipients TEXT NOT NULL DEFAULT '',
                    period INTEGER NOT NULL,
                    refer_data_id INTEGER NOT NULL DEFAULT 0,
                    flag INTEGER NOT NULL,
                    tags TEXT NOT NULL DEFAULT '',
                    creation_date TEXT NOT NULL,
                    update_date TEXT NOT NULL,
                    upload_completed INTEGER NOT NULL DEFAULT 0,
                    deleted INTEGER NOT NULL DEFAULT 0,
                    under_review INTEGER NOT NULL DEFAULT 0
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS object_custom_rankings (
                    data_id INTEGER NOT NULL,
                    application_id INTEGER NOT NULL,
                    value INTEGER NOT NULL,
                    PRIMARY KEY (data_id, application_id),
                    FOREIGN KEY (data_id) REFERENCES objects(data_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_rankings_application_value
                    ON object_custom_rankings (application_id, value);
            ",
        )
        .execute(&mut *tx)
        .await?;

        mark_applied(&mut tx, 2).await?;
        tx.commit().await?;
    }

    Ok(())
}
