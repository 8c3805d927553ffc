use hundred_core::model::FailureRateRange;

use super::SqliteRepository;
use super::mapping::{
    join_pids, join_tags, map_course_row, read_error, u64_to_i64, user_id_to_i64, write_error,
};
use crate::repository::{CourseCatalog, NewCourseRecord, RankedCourse, StorageError};

/// Ranking partition whose value is the course failure rate.
pub const RANKING_APPLICATION_ID: i64 = 0;

const SEARCH_SELECT: &str = "SELECT \
object.data_id, object.owner, object.size, object.name, object.data_type, object.meta_binary, \
object.permission, object.permission_recipients, object.delete_permission, \
object.delete_permission_recipients, object.period, object.refer_data_id, object.flag, \
object.tags, object.creation_date, object.update_date, ranking.value \
FROM objects object \
JOIN object_custom_rankings ranking \
ON object.data_id = ranking.data_id AND \
object.upload_completed = TRUE AND \
object.deleted = FALSE AND \
object.under_review = FALSE AND \
ranking.application_id = ?2";

/// SQL for a random course pick. Binds: `?1` limit, `?2` ranking application,
/// and when `range` is set, `?3`/`?4` as the inclusive failure-rate bounds.
#[must_use]
pub fn random_courses_query(range: Option<FailureRateRange>) -> String {
    let mut query = String::from(SEARCH_SELECT);
    if range.is_some() {
        query.push_str(" WHERE ranking.value BETWEEN ?3 AND ?4");
    }
    query.push_str(" ORDER BY RANDOM() LIMIT ?1");
    query
}

impl SqliteRepository {
    /// Insert a course and its failure-rate ranking.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Constraint` if the data id already exists.
    pub async fn insert_course(&self, record: &NewCourseRecord) -> Result<(), StorageError> {
        let course = &record.course;
        let data_id = u64_to_i64("data_id", course.data_id.value())?;
        let mut tx = self.pool.begin().await.map_err(read_error)?;

        sqlx::query(
            r"
            INSERT INTO objects (
                data_id, owner, size, name, data_type, meta_binary,
                permission, permission_recipients, delete_permission, delete_permission_recipients,
                period, refer_data_id, flag, tags, creation_date, update_date,
                upload_completed, deleted, under_review
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            ",
        )
        .bind(data_id)
        .bind(user_id_to_i64(course.owner))
        .bind(i64::from(course.size))
        .bind(&course.name)
        .bind(i64::from(course.data_type))
        .bind(&course.meta_binary)
        .bind(i64::from(course.permission))
        .bind(join_pids(&course.permission_recipients))
        .bind(i64::from(course.delete_permission))
        .bind(join_pids(&course.delete_permission_recipients))
        .bind(i64::from(course.period))
        .bind(u64_to_i64("refer_data_id", course.refer_data_id)?)
        .bind(i64::from(course.flag))
        .bind(join_tags(&course.tags))
        .bind(course.creation_date)
        .bind(course.update_date)
        .bind(record.upload_completed)
        .bind(record.deleted)
        .bind(record.under_review)
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        sqlx::query(
            r"
            INSERT INTO object_custom_rankings (data_id, application_id, value)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(data_id)
        .bind(RANKING_APPLICATION_ID)
        .bind(course.ranking_value)
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        tx.commit().await.map_err(write_error)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CourseCatalog for SqliteRepository {
    async fn random_courses(
        &self,
        limit: u32,
        range: Option<FailureRateRange>,
    ) -> Result<Vec<RankedCourse>, StorageError> {
        let sql = random_courses_query(range);
        let mut query = sqlx::query(&sql)
            .bind(i64::from(limit))
            .bind(RANKING_APPLICATION_ID);
        if let Some(range) = range {
            query = query.bind(range.min).bind(range.max);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(read_error)?;

        let mut courses = Vec::with_capacity(rows.len());
        for row in &rows {
            courses.push(map_course_row(row)?);
        }
        Ok(courses)
    }
}
