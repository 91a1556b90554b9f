//! Unit tests for the dispatch service

use super::*;
use crate::domain::JobState;
use crate::port::id_provider::mocks::SequentialIdProvider;
use crate::port::job_repository::mocks::InMemoryJobRepository;
use crate::port::time_provider::mocks::FixedTimeProvider;
use crate::port::JobRepository;

fn setup() -> (Arc<InMemoryJobRepository>, DispatchService) {
    let time_provider = Arc::new(FixedTimeProvider::new(10_000));
    let repo = Arc::new(InMemoryJobRepository::new(time_provider.clone()));
    let service = DispatchService::new(
        repo.clone(),
        Arc::new(SequentialIdProvider::new("job")),
        time_provider,
    );
    (repo, service)
}

#[test]
fn test_validate_queue_name_empty() {
    let err = validate_queue_name("").unwrap_err();
    assert!(err.to_string().contains("empty"));
}

#[test]
fn test_validate_queue_name_too_long() {
    let err = validate_queue_name(&"a".repeat(65)).unwrap_err();
    assert!(err.to_string().contains("too long"));
}

#[test]
fn test_validate_queue_name_invalid_chars() {
    let err = validate_queue_name("invalid@queue!").unwrap_err();
    assert!(err.to_string().contains("alphanumeric"));
    assert!(validate_queue_name("probes.replica-lag_1").is_ok());
}

#[tokio::test]
async fn test_submit_single() {
    let (repo, service) = setup();

    let id = service.submit(ProbeTask::write_expect_write()).await.unwrap();

    let job = repo.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Queued);
    assert_eq!(job.queue, DEFAULT_QUEUE);
    assert_eq!(job.job_type.as_str(), ProbeTask::WRITE_EXPECT_WRITE);
    assert_eq!(job.parent_job_id, None);
    assert_eq!(job.chain_group_id, None);
    assert_eq!(job.max_attempts, 1);
}

#[tokio::test]
async fn test_submit_chain_links_members() {
    let (repo, service) = setup();
    let tasks = [
        ProbeTask::read_expect_read(),
        ProbeTask::write_expect_write(),
        ProbeTask::read_expect_write(),
    ];

    let ids = service.submit_chain(&tasks).await.unwrap();
    assert_eq!(ids.len(), 3);

    let first = repo.find_by_id(&ids[0]).await.unwrap().unwrap();
    let group = first.chain_group_id.clone().unwrap();
    let chain = repo.find_chain(&group).await.unwrap();

    assert_eq!(chain.len(), 3);
    assert_eq!(chain[0].parent_job_id, None);
    assert_eq!(chain[1].parent_job_id.as_ref(), Some(&ids[0]));
    assert_eq!(chain[2].parent_job_id.as_ref(), Some(&ids[1]));
    for (i, job) in chain.iter().enumerate() {
        assert_eq!(job.chain_position, Some(i as i64));
        assert_eq!(job.probe_task().unwrap(), tasks[i]);
    }
}

#[tokio::test]
async fn test_submit_empty_chain_is_noop() {
    let (repo, service) = setup();
    let ids = service.submit_chain(&[]).await.unwrap();
    assert!(ids.is_empty());
    assert!(repo.all().is_empty());
}

#[tokio::test]
async fn test_dispatch_plan_counts() {
    let (repo, service) = setup();

    let summary = service
        .dispatch(&DispatchPlan::read_write_read_chain(2, 1, 1))
        .await
        .unwrap();
    assert_eq!(summary, DispatchSummary { jobs: 6, chains: 2 });

    let summary = service.dispatch(&DispatchPlan::writes(0)).await.unwrap();
    assert_eq!(summary, DispatchSummary::default());

    assert_eq!(
        repo.count_by_state(DEFAULT_QUEUE, JobState::Queued)
            .await
            .unwrap(),
        6
    );
}

#[tokio::test]
async fn test_with_queue_and_attempts() {
    let (repo, service) = setup();
    let service = service.with_queue("lag").unwrap().with_max_attempts(0);
    assert_eq!(service.queue(), "lag");

    let id = service.submit(ProbeTask::read_expect_read()).await.unwrap();
    let job = repo.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(job.queue, "lag");
    // Clamped to one execution
    assert_eq!(job.max_attempts, 1);
}

#[tokio::test]
async fn test_with_queue_rejects_bad_name() {
    let (_, service) = setup();
    assert!(service.with_queue("no spaces").is_err());
}
