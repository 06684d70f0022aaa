//! Cross-module workflow scenarios (spec §8 S3).

use std::collections::BTreeMap;
use std::sync::Arc;

use folio_agent::{Agent, AgentType, EchoProcessor};
use folio_coordinator::{AgentDirectory, AgentProfile, Coordinator, WorkflowKind, WorkflowStatus};
use folio_store::{Backend, Environment, NoopCache, PersistentStore, StoreConfig};
use shared_event_bus::MemoryEventBus;

async fn full_directory() -> AgentDirectory {
    let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
    let store = Arc::new(PersistentStore::from_parts(backend, Arc::new(NoopCache)));
    let agents = [
        AgentType::Research,
        AgentType::Submission,
        AgentType::Editorial,
        AgentType::Review,
        AgentType::Quality,
        AgentType::Production,
        AgentType::Analytics,
    ]
    .into_iter()
    .map(|kind| {
        Arc::new(Agent::new(
            kind.label(),
            kind,
            std::collections::BTreeSet::new(),
            Arc::clone(&store),
            Environment::Development,
            Arc::new(EchoProcessor),
        ))
    })
    .collect();
    AgentDirectory::new(agents)
}

#[tokio::test]
async fn low_quality_score_skips_the_acceptance_chain() {
    let directory = full_directory().await;
    let events = Arc::new(MemoryEventBus::new(16));
    let coordinator = Coordinator::new(directory, events, BTreeMap::new());

    let result = coordinator
        .run_workflow(WorkflowKind::ManuscriptProcessing, serde_json::json!({"quality_score": 0.4}))
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::Completed);
    let ran: Vec<_> = result.steps.iter().map(|s| s.action_type.as_str()).collect();
    assert_eq!(ran, vec!["assess_submission", "summarize"]);
}

#[tokio::test]
async fn full_acceptance_chain_runs_every_step() {
    let directory = full_directory().await;
    let events = Arc::new(MemoryEventBus::new(16));
    let coordinator = Coordinator::new(directory, events, BTreeMap::new());

    let result = coordinator
        .run_workflow(
            WorkflowKind::ManuscriptProcessing,
            serde_json::json!({"quality_score": 0.9, "accept": true, "approved": true}),
        )
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::Completed);
    let ran: Vec<_> = result.steps.iter().map(|s| s.action_type.as_str()).collect();
    assert_eq!(ran, vec!["assess_submission", "decide", "assign_reviewers", "validate", "produce", "summarize"]);
}

#[tokio::test]
async fn research_discovery_runs_all_three_steps() {
    let directory = full_directory().await;
    let events = Arc::new(MemoryEventBus::new(16));
    let coordinator = Coordinator::new(directory, events, BTreeMap::new());

    let result = coordinator.run_workflow(WorkflowKind::ResearchDiscovery, serde_json::json!({})).await.unwrap();
    assert_eq!(result.steps.len(), 3);
    assert_eq!(result.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn trigger_fans_out_to_notifications_without_failing_the_workflow() {
    let directory = full_directory().await;
    let events = Arc::new(MemoryEventBus::new(16));
    let mut profiles = BTreeMap::new();
    let mut submission_profile = AgentProfile::default();
    submission_profile.triggers.insert("assess_submission".to_string(), false);
    submission_profile.notifications.insert(AgentType::Editorial);
    profiles.insert(AgentType::Submission, submission_profile);

    let coordinator = Coordinator::new(directory, Arc::clone(&events) as _, profiles);
    let result = coordinator
        .run_workflow(WorkflowKind::ManuscriptProcessing, serde_json::json!({"quality_score": 0.9, "accept": true, "approved": true}))
        .await
        .unwrap();

    assert_eq!(result.status, WorkflowStatus::Completed);
    assert!(events.snapshot().iter().any(|event| event.event_type == "assess_submission.trigger"));
}
