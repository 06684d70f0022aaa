//! The stateful agent worker and its action loop (spec §4.5).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use folio_decision::{AvailableOption, Decision, DecisionContext, DecisionEngine};
use folio_learning::LearningFramework;
use folio_memory::{ExperienceDb, MemorySubsystem};
use folio_store::{Environment, PersistentStore, Priority};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::error::{AgentError, AgentResult};
use crate::process_task::ProcessTask;
use crate::queue::TaskQueue;
use crate::types::{Action, ActionResult, AgentAggregates, AgentHealth, AgentSnapshot, AgentState, AgentType, HealthStatus};

const DEFAULT_RISK_TOLERANCE: f64 = 0.5;
const EXPECTED_NUMERIC_TOLERANCE: f64 = 0.1;
const HISTORICAL_LOOKBACK: u32 = 20;

/// A stateful worker parameterized by an `AgentType` (spec §4.5).
pub struct Agent {
    id: String,
    agent_type: AgentType,
    capabilities: std::collections::BTreeSet<String>,
    memory: MemorySubsystem,
    learning: LearningFramework,
    decision: DecisionEngine,
    processor: Arc<dyn ProcessTask>,
    queue: Mutex<TaskQueue>,
    aggregates: Mutex<AgentAggregates>,
}

impl Agent {
    /// Builds an agent over a shared store, with its own scoped memory, learning,
    /// and decision sub-managers.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        agent_type: AgentType,
        capabilities: std::collections::BTreeSet<String>,
        store: Arc<PersistentStore>,
        environment: Environment,
        processor: Arc<dyn ProcessTask>,
    ) -> Self {
        let id = id.into();
        let memory = MemorySubsystem::new(Arc::clone(&store));
        let learning = LearningFramework::new(ExperienceDb::new(Arc::clone(&store)));
        let decision = DecisionEngine::for_agent(store, id.clone(), environment);
        Self {
            id,
            agent_type,
            capabilities,
            memory,
            learning,
            decision,
            processor,
            queue: Mutex::new(TaskQueue::new()),
            aggregates: Mutex::new(AgentAggregates::default()),
        }
    }

    /// Agent identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Agent type tag.
    #[must_use]
    pub fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    /// Snapshot of the current lifecycle state and aggregates.
    #[must_use]
    pub fn state(&self) -> AgentAggregates {
        self.aggregates.lock().clone()
    }

    /// Current pending-task count, for `get_task_queue_status`-style observers.
    #[must_use]
    pub fn pending_task_count(&self) -> usize {
        self.queue.lock().pending_len()
    }

    /// Enqueues a task, keeping the pending list sorted by priority descending.
    #[must_use]
    pub fn add_task(&self, data: Value, priority: f64) -> String {
        self.queue.lock().add(data, priority)
    }

    /// Pops the highest-priority pending task, wraps it as an `Action`, runs it,
    /// and records the completed task (spec §4.5 "Task queue"). Returns `None`
    /// if the queue is empty. The task's `data` must be an object carrying
    /// `action_type`, `input`, and optionally `expected_output`; a malformed
    /// task surfaces as `Some(Err(AgentError::Validation(..)))`.
    pub async fn process_next(&self) -> Option<AgentResult<ActionResult>> {
        let task = self.queue.lock().pop_next()?;
        let action = match action_from_task_data(&task.data, task.priority) {
            Ok(action) => action,
            Err(err) => {
                self.queue.lock().complete(task, folio_store::TaskStatus::Error, None);
                return Some(Err(err));
            }
        };
        let outcome = self.execute(action).await;
        let (status, result) = match &outcome {
            Ok(action_result) => (
                if action_result.success { folio_store::TaskStatus::Completed } else { folio_store::TaskStatus::Failed },
                Some(action_result.result.clone()),
            ),
            Err(_) => (folio_store::TaskStatus::Error, None),
        };
        self.queue.lock().complete(task, status, result);
        Some(outcome)
    }

    /// Runs the eight-step action lifecycle of spec §4.5.
    pub async fn execute(&self, action: Action) -> AgentResult<ActionResult> {
        self.transition_busy(&action.action_type);
        let importance = f64::from(action.priority.rank()) / 3.0;
        self.memory
            .context
            .store(
                &self.id,
                json!({"event": "action_started", "action_type": action.action_type, "input": action.input}),
                json!({}),
                importance,
                std::collections::BTreeSet::from([action.action_type.clone(), "action_started".to_string()]),
            )
            .await?;

        let available_options = self.build_available_options(&action).await?;
        let context = DecisionContext {
            action_type: action.action_type.clone(),
            input: action.input.clone(),
            available_options,
            required_resources: serde_json::Map::new(),
            estimated_duration: action.estimated_duration,
            quality_score: 1.0,
            risk_tolerance: DEFAULT_RISK_TOLERANCE,
            sticky_value: None,
        };
        let decision = self.decision.make_decision(&context).await?;

        let deadline = Duration::from_secs_f64((action.estimated_duration * 2.0).max(1.0));
        let outcome = tokio::time::timeout(deadline, self.processor.process(&action.input, &decision)).await;

        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                self.record_failure(&action, &err.to_string()).await?;
                return Err(err);
            }
            Err(_) => {
                let message = format!("{} exceeded deadline of {:.1}s", action.action_type, deadline.as_secs_f64());
                self.record_failure(&action, &message).await?;
                return Err(AgentError::Timeout(action.action_type.clone()));
            }
        };

        let success = action.expected_output.as_ref().map_or(true, |expected| matches_expected(expected, &output));
        let metrics = json!({"decision_confidence": decision.confidence});
        self.learning
            .learn(
                &self.id,
                &action.action_type,
                action.input.clone(),
                output.clone(),
                success,
                metrics.clone(),
                action.correlation_id.clone(),
            )
            .await?;

        self.update_aggregates(success);
        self.transition_active();

        info!(agent_id = %self.id, action_type = %action.action_type, success, "action completed");
        Ok(ActionResult {
            success,
            result: output,
            decision_confidence: decision.confidence,
            reasoning: decision.recommendations,
            metrics,
        })
    }

    async fn record_failure(&self, action: &Action, message: &str) -> AgentResult<()> {
        warn!(agent_id = %self.id, action_type = %action.action_type, error = %message, "action failed");
        self.transition_error();
        self.learning
            .learn(
                &self.id,
                &action.action_type,
                action.input.clone(),
                json!({"error": message}),
                false,
                json!({}),
                action.correlation_id.clone(),
            )
            .await?;
        self.update_aggregates(false);
        self.transition_active();
        Ok(())
    }

    async fn build_available_options(&self, action: &Action) -> AgentResult<Vec<AvailableOption>> {
        let mut options = Vec::new();

        let history = self.memory.experiences.list(&self.id, Some(&action.action_type), HISTORICAL_LOOKBACK).await?;
        for record in history.into_iter().filter(|record| record.success) {
            options.push(AvailableOption {
                option_type: "historical".to_string(),
                data: record.output,
                confidence: 0.7,
                quality_score: 1.0,
                risk_score: 0.2,
                efficiency_score: 0.7,
            });
        }

        let context = json!({"action_type": action.action_type, "input": action.input});
        for recommendation in self.learning.recommend(&context) {
            options.push(AvailableOption {
                option_type: "learned".to_string(),
                data: recommendation.action,
                confidence: recommendation.confidence,
                quality_score: 0.8,
                risk_score: 0.3,
                efficiency_score: 0.6,
            });
        }

        options.push(AvailableOption {
            option_type: "default".to_string(),
            data: action.input.clone(),
            confidence: 0.5,
            quality_score: 0.5,
            risk_score: 0.5,
            efficiency_score: 0.5,
        });

        Ok(options)
    }

    fn update_aggregates(&self, success: bool) {
        let mut aggregates = self.aggregates.lock();
        aggregates.total_actions += 1;
        let n = aggregates.total_actions as f64;
        let old_rate = aggregates.success_rate;
        aggregates.success_rate = (old_rate * (n - 1.0) + f64::from(u8::from(success))) / n;
    }

    fn transition_busy(&self, action_type: &str) {
        let mut aggregates = self.aggregates.lock();
        aggregates.state = AgentState::Busy;
        aggregates.current_task = Some(action_type.to_string());
        aggregates.last_activity = Utc::now();
    }

    fn transition_error(&self) {
        let mut aggregates = self.aggregates.lock();
        aggregates.state = AgentState::Error;
        aggregates.last_activity = Utc::now();
    }

    fn transition_active(&self) {
        let mut aggregates = self.aggregates.lock();
        aggregates.state = AgentState::Active;
        aggregates.current_task = None;
        aggregates.last_activity = Utc::now();
    }

    /// `{status, issues}` health summary (SPEC_FULL §B).
    #[must_use]
    pub fn health(&self) -> AgentHealth {
        let aggregates = self.aggregates.lock();
        let mut issues = Vec::new();
        if aggregates.state == AgentState::Error {
            issues.push("last action ended in an unhandled error".to_string());
        }
        if aggregates.total_actions >= 5 && aggregates.success_rate < 0.5 {
            issues.push(format!("success rate {:.2} is below 0.5 over {} actions", aggregates.success_rate, aggregates.total_actions));
        }
        let status = if issues.iter().any(|i| i.contains("unhandled error")) {
            HealthStatus::Unhealthy
        } else if !issues.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        AgentHealth { status, issues }
    }

    /// Serializes `{id, type, capabilities, state, pending, completed}` plus the
    /// learning state blob to `path` (spec §4.5 "Persistence of self").
    pub async fn save(&self, path: impl AsRef<Path>) -> AgentResult<()> {
        let snapshot = {
            let queue = self.queue.lock();
            AgentSnapshot {
                id: self.id.clone(),
                agent_type: self.agent_type,
                capabilities: self.capabilities.clone(),
                aggregates: self.aggregates.lock().clone(),
                pending: queue.pending().to_vec(),
                completed: queue.completed().to_vec(),
                learning_state: self.learning.snapshot(),
            }
        };
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(|err| AgentError::Validation(err.to_string()))?;
        tokio::fs::write(path, bytes).await.map_err(|err| AgentError::Validation(err.to_string()))?;
        Ok(())
    }

    /// Restores state previously written by `save`. Tolerates a missing file
    /// (first run), logging instead of failing.
    pub async fn load(&self, path: impl AsRef<Path>) -> AgentResult<()> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(agent_id = %self.id, path = %path.display(), "no prior snapshot found, starting fresh");
                return Ok(());
            }
            Err(err) => return Err(AgentError::Validation(err.to_string())),
        };
        let snapshot: AgentSnapshot = serde_json::from_slice(&bytes).map_err(|err| {
            error!(agent_id = %self.id, error = %err, "snapshot deserialization failed");
            AgentError::Validation(err.to_string())
        })?;
        *self.aggregates.lock() = snapshot.aggregates;
        *self.queue.lock() = TaskQueue::from_parts(snapshot.pending, snapshot.completed);
        self.learning.restore(snapshot.learning_state);
        Ok(())
    }
}

fn action_from_task_data(data: &Value, priority: f64) -> AgentResult<Action> {
    let action_type = data
        .get("action_type")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::Validation("task data missing 'action_type'".to_string()))?
        .to_string();
    let input = data.get("input").cloned().unwrap_or(Value::Null);
    let expected_output = data.get("expected_output").cloned();
    let estimated_duration = data.get("estimated_duration").and_then(Value::as_f64).unwrap_or(30.0);
    let correlation_id = data.get("correlation_id").and_then(Value::as_str).map(ToString::to_string);
    Ok(Action {
        action_type,
        input,
        expected_output,
        priority: priority_from_fraction(priority),
        estimated_duration,
        correlation_id,
    })
}

fn priority_from_fraction(priority: f64) -> Priority {
    if priority >= 0.875 {
        Priority::Critical
    } else if priority >= 0.625 {
        Priority::High
    } else if priority >= 0.375 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

fn matches_expected(expected: &Value, actual: &Value) -> bool {
    let Value::Object(expected) = expected else {
        return expected == actual;
    };
    let Value::Object(actual) = actual else {
        return false;
    };
    expected.iter().all(|(key, expected_value)| match actual.get(key) {
        Some(actual_value) => values_match(expected_value, actual_value),
        None => false,
    })
}

fn values_match(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(expected), Value::Number(actual)) => {
            let (expected, actual) = (expected.as_f64().unwrap_or(0.0), actual.as_f64().unwrap_or(0.0));
            (expected - actual).abs() <= EXPECTED_NUMERIC_TOLERANCE
        }
        (Value::String(expected), Value::String(actual)) => expected == actual,
        (expected, actual) => expected == actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process_task::EchoProcessor;
    use folio_store::{Backend, NoopCache, StoreConfig};

    async fn agent() -> Agent {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        let store = Arc::new(PersistentStore::from_parts(backend, Arc::new(NoopCache)));
        Agent::new(
            "ag1",
            AgentType::Submission,
            std::collections::BTreeSet::new(),
            store,
            Environment::Development,
            Arc::new(EchoProcessor),
        )
    }

    #[tokio::test]
    async fn execute_without_expected_output_always_succeeds() {
        let agent = agent().await;
        let action = Action {
            action_type: "assess".to_string(),
            input: json!({"x": 1}),
            expected_output: None,
            priority: Priority::Medium,
            estimated_duration: 5.0,
            correlation_id: None,
        };
        let result = agent.execute(action).await.unwrap();
        assert!(result.success);
        assert_eq!(agent.state().total_actions, 1);
        assert_eq!(agent.state().state, AgentState::Active);
    }

    #[tokio::test]
    async fn numeric_tolerance_is_respected() {
        let agent = agent().await;
        let action = Action {
            action_type: "assess".to_string(),
            input: json!({"score": 0.81}),
            expected_output: Some(json!({"score": 0.8})),
            priority: Priority::Medium,
            estimated_duration: 5.0,
            correlation_id: None,
        };
        let result = agent.execute(action).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn missing_expected_key_fails() {
        let agent = agent().await;
        let action = Action {
            action_type: "assess".to_string(),
            input: json!({"other": 1}),
            expected_output: Some(json!({"score": 0.8})),
            priority: Priority::Medium,
            estimated_duration: 5.0,
            correlation_id: None,
        };
        let result = agent.execute(action).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn save_then_load_round_trips_aggregates() {
        let agent = agent().await;
        let action = Action {
            action_type: "assess".to_string(),
            input: json!({}),
            expected_output: None,
            priority: Priority::Low,
            estimated_duration: 5.0,
            correlation_id: None,
        };
        agent.execute(action).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        agent.save(&path).await.unwrap();

        let reloaded = agent().await;
        reloaded.load(&path).await.unwrap();
        assert_eq!(reloaded.state().total_actions, 1);
    }

    #[tokio::test]
    async fn load_tolerates_missing_file() {
        let agent = agent().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        agent.load(&path).await.unwrap();
        assert_eq!(agent.state().total_actions, 0);
    }
}
