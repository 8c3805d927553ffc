use chrono::Duration;
use hundred_core::model::{
    ChallengeState, CourseId, DifficultyBucket, GameMode, INITIAL_LIVES, UserId,
};
use hundred_core::time::fixed_now;
use storage::repository::{
    ChallengeStateRepository, CourseCatalog, NewCourseRecord, RankedCourse, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn course(id: u64, ranking_value: i64) -> RankedCourse {
    RankedCourse {
        data_id: CourseId::new(id),
        owner: UserId::new(1_000),
        size: 42_516,
        name: format!("Course {id}"),
        data_type: 1,
        meta_binary: vec![0xde, 0xad],
        permission: 0,
        permission_recipients: vec![11, 12],
        delete_permission: 3,
        delete_permission_recipients: Vec::new(),
        period: 64_306,
        refer_data_id: 0,
        flag: 256,
        tags: vec!["castle".into(), "speedrun".into()],
        creation_date: fixed_now(),
        update_date: fixed_now() + Duration::hours(1),
        ranking_value,
    }
}

#[tokio::test]
async fn sqlite_save_then_load_round_trips_every_column() {
    let repo = connect("memdb_state_roundtrip").await;

    let mut state = ChallengeState::new(GameMode::HundredAttempt);
    state.apply_result(false);
    state.apply_result(false);
    state.apply_result(true);

    repo.save(UserId::new(42), &state, fixed_now()).await.unwrap();

    let record = repo.load(UserId::new(42)).await.unwrap().expect("record");
    assert_eq!(record.user_id, UserId::new(42));
    assert_eq!(record.state, state);
    assert_eq!(record.state.lives_remaining(), INITIAL_LIVES - 1);
    assert_eq!(record.state.courses_attempted(), 3);
    assert!(record.state.last_result());
    assert_eq!(record.last_updated, fixed_now());
}

#[tokio::test]
async fn sqlite_save_overwrites_existing_row() {
    let repo = connect("memdb_state_upsert").await;
    let user = UserId::new(9);

    let fresh = ChallengeState::new(GameMode::HundredAttempt);
    repo.save(user, &fresh, fixed_now()).await.unwrap();

    let mut later = fresh;
    later.apply_result(false);
    let later_at = fixed_now() + Duration::minutes(3);
    repo.save(user, &later, later_at).await.unwrap();

    let all = repo.load_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].state, later);
    assert_eq!(all[0].last_updated, later_at);
}

#[tokio::test]
async fn sqlite_load_missing_is_none_and_delete_is_idempotent() {
    let repo = connect("memdb_state_missing").await;
    assert!(repo.load(UserId::new(1)).await.unwrap().is_none());

    repo.delete(UserId::new(1)).await.unwrap();

    let state = ChallengeState::new(GameMode::HundredAttempt);
    repo.save(UserId::new(1), &state, fixed_now()).await.unwrap();
    repo.delete(UserId::new(1)).await.unwrap();
    repo.delete(UserId::new(1)).await.unwrap();
    assert!(repo.load(UserId::new(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_malformed_row_fails_load_and_whole_load_all() {
    let repo = connect("memdb_state_corrupt").await;
    let state = ChallengeState::new(GameMode::HundredAttempt);
    repo.save(UserId::new(1), &state, fixed_now()).await.unwrap();
    repo.save(UserId::new(3), &state, fixed_now()).await.unwrap();

    sqlx::query(
        r"
        INSERT INTO challenge_states (user_id, mode, lives_remaining, courses_cleared, courses_attempted, last_result, last_updated)
        VALUES (2, '100Man', -4, 0, 104, 0, ?1)
        ",
    )
    .bind(fixed_now())
    .execute(repo.pool())
    .await
    .unwrap();

    let err = repo.load(UserId::new(2)).await.unwrap_err();
    assert!(matches!(err, StorageError::DataIntegrity(_)), "{err}");

    let err = repo.load_all().await.unwrap_err();
    assert!(matches!(err, StorageError::DataIntegrity(_)), "{err}");

    assert!(repo.load(UserId::new(1)).await.unwrap().is_some());
}

#[tokio::test]
async fn sqlite_unknown_mode_is_an_integrity_error() {
    let repo = connect("memdb_state_bad_mode").await;
    sqlx::query(
        r"
        INSERT INTO challenge_states (user_id, mode, lives_remaining, courses_cleared, courses_attempted, last_result, last_updated)
        VALUES (5, 'Speedrun', 100, 0, 0, 0, ?1)
        ",
    )
    .bind(fixed_now())
    .execute(repo.pool())
    .await
    .unwrap();

    let err = repo.load(UserId::new(5)).await.unwrap_err();
    assert!(matches!(err, StorageError::DataIntegrity(_)), "{err}");
}

#[tokio::test]
async fn sqlite_save_all_persists_snapshot() {
    let repo = connect("memdb_state_save_all").await;
    let mut lost = ChallengeState::new(GameMode::HundredAttempt);
    for _ in 0..INITIAL_LIVES {
        lost.apply_result(false);
    }
    let snapshot = vec![
        (UserId::new(1), ChallengeState::new(GameMode::HundredAttempt)),
        (UserId::new(2), lost),
    ];

    let saved = repo.save_all(&snapshot, fixed_now()).await.unwrap();
    assert_eq!(saved, 2);

    let all = repo.load_all().await.unwrap();
    let pairs: Vec<_> = all.into_iter().map(|r| (r.user_id, r.state)).collect();
    assert_eq!(pairs, snapshot);
}

#[tokio::test]
async fn sqlite_random_courses_filters_and_limits() {
    let repo = connect("memdb_courses").await;

    repo.insert_course(&NewCourseRecord::published(course(1, 10)))
        .await
        .unwrap();
    repo.insert_course(&NewCourseRecord::published(course(2, 34)))
        .await
        .unwrap();
    repo.insert_course(&NewCourseRecord::published(course(3, 80)))
        .await
        .unwrap();
    let mut deleted = NewCourseRecord::published(course(4, 20));
    deleted.deleted = true;
    repo.insert_course(&deleted).await.unwrap();
    let mut pending = NewCourseRecord::published(course(5, 20));
    pending.upload_completed = false;
    repo.insert_course(&pending).await.unwrap();

    let mut easy: Vec<_> = repo
        .random_courses(25, DifficultyBucket::Easy.range())
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.data_id)
        .collect();
    easy.sort();
    assert_eq!(easy, vec![CourseId::new(1), CourseId::new(2)]);

    let all = repo.random_courses(25, None).await.unwrap();
    assert_eq!(all.len(), 3);

    let limited = repo.random_courses(2, None).await.unwrap();
    assert_eq!(limited.len(), 2);

    let none = repo
        .random_courses(25, DifficultyBucket::SuperExpert.range())
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn sqlite_course_rows_decode_all_fields() {
    let repo = connect("memdb_course_fields").await;
    let expected = course(77, 90);
    repo.insert_course(&NewCourseRecord::published(expected.clone()))
        .await
        .unwrap();

    let found = repo
        .random_courses(1, DifficultyBucket::Expert.range())
        .await
        .unwrap();
    assert_eq!(found, vec![expected]);
}

#[tokio::test]
async fn sqlite_duplicate_course_is_a_constraint_error() {
    let repo = connect("memdb_course_dup").await;
    let record = NewCourseRecord::published(course(1, 10));
    repo.insert_course(&record).await.unwrap();

    let err = repo.insert_course(&record).await.unwrap_err();
    assert!(matches!(err, StorageError::Constraint(_)), "{err}");
}
