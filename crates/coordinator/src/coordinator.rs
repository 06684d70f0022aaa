//! `Coordinator`: directory ownership, fixed-DAG execution, trigger fan-out
//! (spec §4.6).

use std::collections::BTreeMap;
use std::time::Instant;

use folio_agent::{Action, AgentHealth, AgentType, HealthStatus};
use folio_store::{new_id, Priority};
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord};
use tracing::warn;

use crate::directory::AgentDirectory;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::types::{AgentProfile, StepRecord, WorkflowKind, WorkflowResult, WorkflowStatus};
use crate::workflow::{manuscript_processing, publication_production, research_discovery, StepSpec};

/// Owns exactly one agent per type and runs the three fixed workflow DAGs.
pub struct Coordinator {
    directory: AgentDirectory,
    events: std::sync::Arc<dyn EventPublisher>,
    profiles: BTreeMap<AgentType, AgentProfile>,
}

impl Coordinator {
    /// Builds a coordinator over a complete `AgentDirectory`, an event
    /// publisher used for trigger fan-out, and each agent type's declared
    /// `{triggers, notifications, escalations, data_sharing}` profile.
    #[must_use]
    pub fn new(
        directory: AgentDirectory,
        events: std::sync::Arc<dyn EventPublisher>,
        profiles: BTreeMap<AgentType, AgentProfile>,
    ) -> Self {
        Self { directory, events, profiles }
    }

    /// Runs one of the three fixed DAGs, threading a freshly minted
    /// correlation id through every step.
    pub async fn run_workflow(&self, kind: WorkflowKind, data: Value) -> CoordinatorResult<WorkflowResult> {
        let correlation_id = new_id();
        let steps = match kind {
            WorkflowKind::ManuscriptProcessing => manuscript_processing(),
            WorkflowKind::ResearchDiscovery => research_discovery(),
            WorkflowKind::PublicationProduction => publication_production(),
        };

        let mut context = match data {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };

        let mut records = Vec::new();
        let mut total_time = 0.0;
        let mut ok = true;

        for step in steps {
            if !(step.gate)(&context) {
                continue;
            }
            let record = self.run_step(&step, &context, &correlation_id).await?;
            total_time += record.execution_time;
            if record.error.is_some() {
                ok = false;
            }
            if let Some(Value::Object(output)) = &record.result {
                for (key, value) in output {
                    context.insert(key.clone(), value.clone());
                }
            }
            records.push(record);
        }

        Ok(WorkflowResult {
            correlation_id,
            kind,
            status: if ok { WorkflowStatus::Completed } else { WorkflowStatus::Failed },
            steps: records,
            execution_time: total_time,
        })
    }

    async fn run_step(&self, step: &StepSpec, context: &serde_json::Map<String, Value>, correlation_id: &str) -> CoordinatorResult<StepRecord> {
        let agent = self
            .directory
            .get(step.agent_type)
            .ok_or_else(|| CoordinatorError::MissingAgent(step.agent_type.label().to_string()))?;

        let action = Action {
            action_type: step.action_type.to_string(),
            input: Value::Object(context.clone()),
            expected_output: None,
            priority: Priority::Medium,
            estimated_duration: 30.0,
            correlation_id: Some(correlation_id.to_string()),
        };

        let start = Instant::now();
        let outcome = agent.execute(action).await;
        let execution_time = start.elapsed().as_secs_f64();

        let record = match outcome {
            Ok(result) => StepRecord {
                agent_type: step.agent_type,
                action_type: step.action_type.to_string(),
                success: result.success,
                execution_time,
                result: Some(result.result),
                error: None,
            },
            Err(err) => StepRecord {
                agent_type: step.agent_type,
                action_type: step.action_type.to_string(),
                success: false,
                execution_time,
                result: None,
                error: Some(err.to_string()),
            },
        };

        self.fan_out(step.agent_type, step.action_type, correlation_id).await;
        Ok(record)
    }

    /// Fans a trigger match out to the declared `notifications` (and, for
    /// critical triggers, `escalations`) sets. Best-effort: publish failures
    /// are logged, never propagated, and never block the workflow.
    async fn fan_out(&self, agent_type: AgentType, action_type: &str, correlation_id: &str) {
        let Some(profile) = self.profiles.get(&agent_type) else {
            return;
        };
        let Some(&critical) = profile.triggers.get(action_type) else {
            return;
        };

        let mut targets: Vec<AgentType> = profile.notifications.iter().copied().collect();
        if critical {
            targets.extend(profile.escalations.iter().copied());
        }
        targets.sort_unstable();
        targets.dedup();

        for target in targets {
            let event = EventRecord {
                id: new_id(),
                source: agent_type.label().to_string(),
                event_type: format!("{action_type}.trigger"),
                timestamp: chrono::Utc::now().to_rfc3339(),
                payload: serde_json::json!({"notify": target.label(), "correlation_id": correlation_id, "critical": critical}),
            };
            if let Err(err) = self.events.publish(event).await {
                warn!(agent_type = agent_type.label(), notify = target.label(), error = %err, "trigger fan-out failed");
            }
        }
    }

    /// `{status, issues}` health summary over every owned agent
    /// (SPEC_FULL §B).
    #[must_use]
    pub fn health(&self) -> AgentHealth {
        let mut issues = Vec::new();
        for kind in [
            AgentType::Research,
            AgentType::Submission,
            AgentType::Editorial,
            AgentType::Review,
            AgentType::Quality,
            AgentType::Production,
            AgentType::Analytics,
        ] {
            if let Some(agent) = self.directory.get(kind) {
                let agent_health = agent.health();
                for issue in agent_health.issues {
                    issues.push(format!("{}: {issue}", kind.label()));
                }
            }
        }
        let status = if issues.iter().any(|issue| issue.contains("unhandled error")) {
            HealthStatus::Unhealthy
        } else if !issues.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        AgentHealth { status, issues }
    }
}
