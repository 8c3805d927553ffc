use chrono::{DateTime, Utc};
use hundred_core::model::{ChallengeState, UserId};

use super::SqliteRepository;
use super::mapping::{map_state_row, read_error, user_id_to_i64, write_error};
use crate::repository::{ChallengeStateRecord, ChallengeStateRepository, StorageError};

#[async_trait::async_trait]
impl ChallengeStateRepository for SqliteRepository {
    async fn save(
        &self,
        user_id: UserId,
        state: &ChallengeState,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO challenge_states (user_id, mode, lives_remaining, courses_cleared, courses_attempted, last_result, last_updated)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id) DO UPDATE SET
                mode = excluded.mode,
                lives_remaining = excluded.lives_remaining,
                courses_cleared = excluded.courses_cleared,
                courses_attempted = excluded.courses_attempted,
                last_result = excluded.last_result,
                last_updated = excluded.last_updated
            ",
        )
        .bind(user_id_to_i64(user_id))
        .bind(state.mode().as_str())
        .bind(i64::from(state.lives_remaining()))
        .bind(i64::from(state.courses_cleared()))
        .bind(i64::from(state.courses_attempted()))
        .bind(state.last_result())
        .bind(saved_at)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }

    async fn load(&self, user_id: UserId) -> Result<Option<ChallengeStateRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, mode, lives_remaining, courses_cleared, courses_attempted, last_result, last_updated
            FROM challenge_states WHERE user_id = ?1
            ",
        )
        .bind(user_id_to_i64(user_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(read_error)?;

        row.as_ref().map(map_state_row).transpose()
    }

    async fn delete(&self, user_id: UserId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM challenge_states WHERE user_id = ?1")
            .bind(user_id_to_i64(user_id))
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<ChallengeStateRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, mode, lives_remaining, courses_cleared, courses_attempted, last_result, last_updated
            FROM challenge_states
            ORDER BY user_id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(read_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(map_state_row(row)?);
        }
        Ok(records)
    }
}
