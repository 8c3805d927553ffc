use hundred_core::model::{ChallengeState, CourseId, GameMode, UserId};
use sqlx::Row;
use sqlx::error::ErrorKind;
use sqlx::sqlite::SqliteRow;

use crate::repository::{ChallengeStateRecord, RankedCourse, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::DataIntegrity(e.to_string())
}

/// Split driver failures into constraint rejections and everything else.
pub(crate) fn write_error(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if !matches!(db.kind(), ErrorKind::Other) => {
            StorageError::Constraint(db.message().to_owned())
        }
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn read_error(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::DataIntegrity(format!("invalid {field}: {v}")))
}

fn u16_from_i64(field: &'static str, v: i64) -> Result<u16, StorageError> {
    u16::try_from(v).map_err(|_| StorageError::DataIntegrity(format!("invalid {field}: {v}")))
}

fn u8_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::DataIntegrity(format!("invalid {field}: {v}")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Constraint(format!("{field} overflow")))
}

fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::DataIntegrity(format!("{field} sign overflow")))
}

pub(crate) fn user_id_to_i64(id: UserId) -> i64 {
    i64::from(id.value())
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(u32_from_i64("user_id", v)?))
}

/// Pid lists are stored as comma-separated decimal text.
pub(crate) fn join_pids(pids: &[u32]) -> String {
    pids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn split_pids(field: &'static str, raw: &str) -> Result<Vec<u32>, StorageError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|part| {
            part.parse::<u32>()
                .map_err(|_| StorageError::DataIntegrity(format!("invalid {field} entry: {part}")))
        })
        .collect()
}

pub(crate) fn join_tags(tags: &[String]) -> String {
    tags.join(",")
}

pub(crate) fn split_tags(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(',').map(str::to_owned).collect()
}

/// Decode a `challenge_states` row. Must read exactly the columns the upsert writes.
pub(crate) fn map_state_row(row: &SqliteRow) -> Result<ChallengeStateRecord, StorageError> {
    let user_id = user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?;

    let mode_str: String = row.try_get("mode").map_err(ser)?;
    let mode: GameMode = mode_str.parse().map_err(ser)?;

    let lives_remaining = u32_from_i64(
        "lives_remaining",
        row.try_get::<i64, _>("lives_remaining").map_err(ser)?,
    )?;
    let courses_cleared = u32_from_i64(
        "courses_cleared",
        row.try_get::<i64, _>("courses_cleared").map_err(ser)?,
    )?;
    let courses_attempted = u32_from_i64(
        "courses_attempted",
        row.try_get::<i64, _>("courses_attempted").map_err(ser)?,
    )?;
    let last_result: bool = row.try_get("last_result").map_err(ser)?;
    let last_updated = row.try_get("last_updated").map_err(ser)?;

    let state = ChallengeState::from_persisted(
        mode,
        lives_remaining,
        courses_cleared,
        courses_attempted,
        last_result,
    )
    .map_err(|e| StorageError::DataIntegrity(format!("user {user_id}: {e}")))?;

    Ok(ChallengeStateRecord {
        user_id,
        state,
        last_updated,
    })
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<RankedCourse, StorageError> {
    let permission_recipients: String = row.try_get("permission_recipients").map_err(ser)?;
    let delete_permission_recipients: String =
        row.try_get("delete_permission_recipients").map_err(ser)?;
    let tags: String = row.try_get("tags").map_err(ser)?;

    Ok(RankedCourse {
        data_id: CourseId::new(u64_from_i64(
            "data_id",
            row.try_get::<i64, _>("data_id").map_err(ser)?,
        )?),
        owner: user_id_from_i64(row.try_get::<i64, _>("owner").map_err(ser)?)?,
        size: u32_from_i64("size", row.try_get::<i64, _>("size").map_err(ser)?)?,
        name: row.try_get("name").map_err(ser)?,
        data_type: u16_from_i64("data_type", row.try_get::<i64, _>("data_type").map_err(ser)?)?,
        meta_binary: row.try_get("meta_binary").map_err(ser)?,
        permission: u8_from_i64("permission", row.try_get::<i64, _>("permission").map_err(ser)?)?,
        permission_recipients: split_pids("permission_recipients", &permission_recipients)?,
        delete_permission: u8_from_i64(
            "delete_permission",
            row.try_get::<i64, _>("delete_permission").map_err(ser)?,
        )?,
        delete_permission_recipients: split_pids(
            "delete_permission_recipients",
            &delete_permission_recipients,
        )?,
        period: u16_from_i64("period", row.try_get::<i64, _>("period").map_err(ser)?)?,
        refer_data_id: u64_from_i64(
            "refer_data_id",
            row.try_get::<i64, _>("refer_data_id").map_err(ser)?,
        )?,
        flag: u32_from_i64("flag", row.try_get::<i64, _>("flag").map_err(ser)?)?,
        tags: split_tags(&tags),
        creation_date: row.try_get("creation_date").map_err(ser)?,
        update_date: row.try_get("update_date").map_err(ser)?,
        ranking_value: row.try_get("value").map_err(ser)?,
    })
}
