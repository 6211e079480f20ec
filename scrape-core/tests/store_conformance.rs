use proptest::prelude::*;

use scrape_core::{
    HockeyStats, JobId, JobKind, JobStatus, JobStore, MemoryStore, OscarAward, RecordBatch,
    ResultStore, ScrapeStore, ScrapeTarget, StoreError, ValidationError,
};

fn team(name: &str, year: i32) -> HockeyStats {
    HockeyStats {
        team_name: name.to_string(),
        year,
        wins: 50,
        losses: 20,
        ot_losses: 12,
        win_pct: Some(0.61),
        gf: Some(280),
        ga: Some(210),
        diff: Some(70),
    }
}

fn award(title: &str, nominations: i32, awards: i32) -> OscarAward {
    OscarAward {
        year: 1997,
        title: title.to_string(),
        nominations,
        awards,
        best_picture: false,
    }
}

/// S1. Bulk insert is all-or-nothing
#[tokio::test]
async fn test_bulk_insert_is_all_or_nothing() {
    let store = MemoryStore::new();
    let job = store.create(JobKind::Oscar).await.unwrap();

    // Arrange: N valid rows followed by one violating awards <= nominations
    let mut rows: Vec<OscarAward> = (0..9).map(|i| award(&format!("Film {i}"), 4, 1)).collect();
    rows.push(award("Titanic", 14, 15));

    // Act
    let err = store
        .bulk_insert(job.id, RecordBatch::Oscar(rows))
        .await
        .unwrap_err();

    // Assert: error names the last row and nothing was written
    match err {
        StoreError::InvalidRecord(record) => {
            assert_eq!(record.index, 9);
            assert!(matches!(record.source, ValidationError::AwardsExceedNominations { .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(store.list_by_job(job.id).await.unwrap().is_empty());
    assert_eq!(store.list_oscar(0, 100).await.unwrap().total, 0);
}

/// S2. Bulk insert for an unknown job fails with NotFound
#[tokio::test]
async fn test_bulk_insert_unknown_job() {
    let store = MemoryStore::new();
    let err = store
        .bulk_insert(JobId::new(42), RecordBatch::Hockey(vec![team("Whalers", 1990)]))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::JobNotFound(JobId::new(42)));
}

/// S3. Jobs list newest first with a total
#[tokio::test]
async fn test_jobs_listed_newest_first() {
    let store = MemoryStore::new();
    for kind in [JobKind::Hockey, JobKind::Oscar, JobKind::All, JobKind::Hockey] {
        store.create(kind).await.unwrap();
    }

    let page = store.list(1, 2).await.unwrap();
    assert_eq!(page.total, 4);
    let ids: Vec<i64> = page.items.iter().map(|j| j.id.get()).collect();
    assert_eq!(ids, vec![3, 2]);

    let beyond = store.list(10, 5).await.unwrap();
    assert_eq!(beyond.total, 4);
    assert!(beyond.items.is_empty());
}

/// S4. Results list most recently inserted first across jobs
#[tokio::test]
async fn test_results_listed_by_insertion_recency() {
    let store = MemoryStore::new();
    let first = store.create(JobKind::Hockey).await.unwrap();
    let second = store.create(JobKind::Hockey).await.unwrap();

    store
        .bulk_insert(first.id, RecordBatch::Hockey(vec![team("Canucks", 1994), team("Rangers", 1994)]))
        .await
        .unwrap();
    store
        .bulk_insert(second.id, RecordBatch::Hockey(vec![team("Devils", 1995)]))
        .await
        .unwrap();

    let page = store.list_hockey(0, 2).await.unwrap();
    assert_eq!(page.total, 3);
    let names: Vec<&str> = page.items.iter().map(|r| r.data.team_name.as_str()).collect();
    assert_eq!(names, vec!["Devils", "Rangers"]);
    assert_eq!(page.items[0].job_id, second.id);

    let by_job = store.list_by_job(first.id).await.unwrap();
    assert_eq!(by_job.hockey.len(), 2);
    assert!(by_job.oscar.is_empty());
}

/// S5. Terminal jobs reject every further transition
#[tokio::test]
async fn test_terminal_jobs_are_frozen() {
    let store = MemoryStore::new();
    let job = store.create(JobKind::Hockey).await.unwrap();
    store.transition(job.id, JobStatus::Running, None).await.unwrap();
    let done = store
        .commit_results(job.id, ScrapeTarget::Hockey, RecordBatch::Hockey(vec![team("Stars", 1999)]))
        .await
        .unwrap()
        .job;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.error_message.is_none());

    for (status, message) in [
        (JobStatus::Running, None),
        (JobStatus::Failed, Some("late failure".to_string())),
        (JobStatus::Pending, None),
    ] {
        let err = store.transition(job.id, status, message).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { from: JobStatus::Completed, .. }));
    }
    assert_eq!(store.get(job.id).await.unwrap(), done);
}

/// S6. Every mutation advances updated_at
#[tokio::test]
async fn test_updated_at_advances() {
    let store = MemoryStore::new();
    let created = store.create(JobKind::Oscar).await.unwrap();
    let running = store.transition(created.id, JobStatus::Running, None).await.unwrap();
    let failed = store.fail(created.id, "site returned 503".into()).await.unwrap();

    assert!(running.updated_at > created.updated_at);
    assert!(failed.updated_at > running.updated_at);
    assert_eq!(failed.created_at, created.created_at);
    assert_eq!(failed.error_message.as_deref(), Some("site returned 503"));
}

/// S7. Dispatch failure edge pending -> failed
#[tokio::test]
async fn test_pending_can_fail_directly() {
    let store = MemoryStore::new();
    let job = store.create(JobKind::All).await.unwrap();
    let failed = store.fail(job.id, "failed to publish message: not connected".into()).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);

    let err = store
        .transition(job.id, JobStatus::Running, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));
}

fn status_strategy() -> impl Strategy<Value = JobStatus> {
    prop_oneof![
        Just(JobStatus::Pending),
        Just(JobStatus::Running),
        Just(JobStatus::Completed),
        Just(JobStatus::Failed),
    ]
}

/// Target status plus whether an error message accompanies the request.
fn step_strategy() -> impl Strategy<Value = (JobStatus, bool)> {
    (status_strategy(), any::<bool>())
}

fn is_allowed_path(observed: &[JobStatus]) -> bool {
    const PATHS: [&[JobStatus]; 3] = [
        &[JobStatus::Pending, JobStatus::Running, JobStatus::Completed],
        &[JobStatus::Pending, JobStatus::Running, JobStatus::Failed],
        &[JobStatus::Pending, JobStatus::Failed],
    ];
    PATHS.iter().any(|path| path.starts_with(observed))
}

proptest! {
    /// Arbitrary transition attempts never break the state machine or the error_message rule.
    #[test]
    fn prop_transitions_follow_state_machine(steps in prop::collection::vec(step_strategy(), 0..12)) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let store = MemoryStore::new();
            let job = store.create(JobKind::Hockey).await.unwrap();
            let mut observed = vec![job.status];

            for (status, with_message) in steps {
                let message = with_message.then(|| format!("{status} requested"));
                if let Ok(job) = store.transition(job.id, status, message).await {
                    observed.push(job.status);
                }
                let current = store.get(job.id).await.unwrap();
                let failed = current.status == JobStatus::Failed;
                let has_message = current.error_message.as_deref().is_some_and(|m| !m.is_empty());
                prop_assert_eq!(failed, has_message);
            }

            prop_assert!(is_allowed_path(&observed), "observed {:?}", observed);
            Ok(())
        })?;
    }
}
