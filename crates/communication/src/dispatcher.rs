//! `CommunicationDispatcher`: template-driven send/broadcast, follow-up
//! scheduling, and periodic escalation checking (spec §4.8).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use folio_store::{new_id, Environment};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::channel::{ChannelProvider, InMemoryChannelProvider};
use crate::error::{CommError, CommResult};
use crate::render::{condition_matches, evaluate_send_conditions, personalize, render};
use crate::types::{Message, MessageStatus, ScheduledFollowUp, Template, TrackedEscalation};

const DEFAULT_PRIORITY: u8 = 5;
const ESCALATION_PRIORITY: u8 = 9;

/// Renders templates, applies personalization and send-condition gates,
/// hands the result to a `ChannelProvider`, and schedules this template's
/// follow-ups and escalations.
pub struct CommunicationDispatcher {
    provider: Arc<dyn ChannelProvider>,
    templates: HashMap<String, Template>,
    sent: Mutex<Vec<Message>>,
    follow_ups: Mutex<Vec<ScheduledFollowUp>>,
    escalations: Mutex<Vec<TrackedEscalation>>,
}

impl CommunicationDispatcher {
    /// Builds a dispatcher over `templates`, keyed by `Template::id`.
    ///
    /// # Errors
    /// Returns [`CommError::Configuration`] if no provider is given and
    /// `environment` is [`Environment::Production`]: the dispatcher must
    /// surface a configuration error rather than silently no-op delivering.
    pub fn new(provider: Option<Arc<dyn ChannelProvider>>, environment: Environment, templates: Vec<Template>) -> CommResult<Self> {
        let provider = match provider {
            Some(provider) => provider,
            None if environment.allows_fallback() => {
                warn!("no channel provider configured; messages will be recorded but never delivered");
                Arc::new(InMemoryChannelProvider::new()) as Arc<dyn ChannelProvider>
            }
            None => return Err(CommError::Configuration("no channel provider configured in production".to_string())),
        };
        Ok(Self {
            provider,
            templates: templates.into_iter().map(|template| (template.id.clone(), template)).collect(),
            sent: Mutex::new(Vec::new()),
            follow_ups: Mutex::new(Vec::new()),
            escalations: Mutex::new(Vec::new()),
        })
    }

    /// Renders `template_id` against `context`, applies personalization and
    /// send conditions, and delivers it to `recipient`.
    ///
    /// # Errors
    /// Returns [`CommError::Validation`] for an unknown template or a
    /// non-object context.
    pub async fn send(&self, template_id: &str, recipient: &str, context: Value, priority: u8) -> CommResult<Message> {
        let template = self
            .templates
            .get(template_id)
            .ok_or_else(|| CommError::Validation(format!("unknown template '{template_id}'")))?;
        let context_map = context
            .as_object()
            .cloned()
            .ok_or_else(|| CommError::Validation("send context must be a JSON object".to_string()))?;

        let subject = render(&template.subject_pattern, &context_map);
        let body = render(&template.body_pattern, &context_map);
        let (subject, tracking) = personalize(&subject, &template.personalization_rules, &context_map);

        let now = Utc::now();
        let mut message = Message {
            id: new_id(),
            template_id: template_id.to_string(),
            recipient: recipient.to_string(),
            sender_agent: context_map.get("sender_agent").and_then(Value::as_str).map(ToString::to_string),
            subject,
            body,
            channel: template.channel,
            priority,
            scheduled_at: now,
            sent_at: None,
            status: MessageStatus::Pending,
            context,
            attachments: Vec::new(),
            tracking,
            escalation_count: 0,
        };

        if !evaluate_send_conditions(&template.send_conditions, &context_map) {
            message.status = MessageStatus::Failed;
            note(&mut message, "required send condition not met");
            self.sent.lock().push(message.clone());
            return Ok(message);
        }

        match self.provider.deliver(&message).await {
            Ok(true) => {
                message.status = MessageStatus::Sent;
                message.sent_at = Some(Utc::now());
            }
            Ok(false) => {
                message.status = MessageStatus::Failed;
                note(&mut message, "provider declined delivery");
            }
            Err(err) => {
                message.status = MessageStatus::Failed;
                note(&mut message, &err.to_string());
            }
        }
        self.sent.lock().push(message.clone());

        if message.status == MessageStatus::Sent {
            self.schedule_follow_ups(template, recipient, &context_map, now);
            self.track_escalations(&message, template, &context_map, now);
        }

        Ok(message)
    }

    /// Sends `template_id` to every recipient, independently.
    ///
    /// # Errors
    /// Propagates the first [`CommError`] from an individual `send`.
    pub async fn broadcast(&self, template_id: &str, recipients: &[String], context: Value) -> CommResult<Vec<Message>> {
        let mut messages = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            messages.push(self.send(template_id, recipient, context.clone(), DEFAULT_PRIORITY).await?);
        }
        Ok(messages)
    }

    fn schedule_follow_ups(&self, template: &Template, recipient: &str, context: &Map<String, Value>, sent_at: DateTime<Utc>) {
        let mut queue = self.follow_ups.lock();
        for rule in &template.follow_up_rules {
            if let Some(condition) = &rule.condition {
                if !condition_matches(condition, context) {
                    continue;
                }
            }
            queue.push(ScheduledFollowUp {
                due_at: sent_at + Duration::seconds(rule.delay_secs),
                template_id: rule.template_id.clone(),
                recipient: recipient.to_string(),
                context: context.clone(),
                sender_agent: context.get("sender_agent").and_then(Value::as_str).map(ToString::to_string),
            });
        }
    }

    fn track_escalations(&self, message: &Message, template: &Template, context: &Map<String, Value>, sent_at: DateTime<Utc>) {
        let mut escalations = self.escalations.lock();
        for rule in &template.escalation_rules {
            escalations.push(TrackedEscalation {
                original_message_id: message.id.clone(),
                rule: rule.clone(),
                context: context.clone(),
                fired_count: 0,
                next_eligible_at: sent_at + Duration::seconds(rule.delay_secs),
            });
        }
    }

    /// Sends every follow-up whose delay has elapsed.
    ///
    /// # Errors
    /// Propagates the first [`CommError`] from an individual `send`.
    pub async fn run_follow_ups(&self) -> CommResult<Vec<Message>> {
        let now = Utc::now();
        let due: Vec<ScheduledFollowUp> = {
            let mut queue = self.follow_ups.lock();
            let (due, pending): (Vec<_>, Vec<_>) = queue.drain(..).partition(|follow_up| follow_up.due_at <= now);
            *queue = pending;
            due
        };

        let mut sent = Vec::with_capacity(due.len());
        for follow_up in due {
            let context = Value::Object(follow_up.context.clone());
            let message = self.send(&follow_up.template_id, &follow_up.recipient, context, DEFAULT_PRIORITY).await?;
            sent.push(message);
        }
        Ok(sent)
    }

    /// Evaluates every tracked escalation; fires (and sends) the ones whose
    /// delay has elapsed, their trigger condition holds, and they have not
    /// yet reached `max_escalations`. Intended to be called periodically
    /// (design leaves the interval to the host; spec suggests ≥60s).
    ///
    /// # Errors
    /// Propagates the first [`CommError`] from an individual `send`.
    pub async fn check_escalations(&self) -> CommResult<Vec<Message>> {
        let now = Utc::now();
        let mut due = Vec::new();
        {
            let mut escalations = self.escalations.lock();
            for escalation in escalations.iter_mut() {
                if escalation.fired_count >= escalation.rule.max_escalations {
                    continue;
                }
                if escalation.next_eligible_at > now {
                    continue;
                }
                if !condition_matches(&escalation.rule.trigger_condition, &escalation.context) {
                    continue;
                }
                escalation.fired_count += 1;
                escalation.next_eligible_at = now + Duration::seconds(escalation.rule.delay_secs);
                due.push((escalation.rule.clone(), escalation.context.clone(), escalation.original_message_id.clone()));
            }
        }

        let mut sent = Vec::new();
        for (rule, context, original_message_id) in due {
            for recipient in &rule.recipients {
                let mut message = self.send(&rule.template_id, recipient, Value::Object(context.clone()), ESCALATION_PRIORITY).await?;
                message.escalation_count += 1;
                sent.push(message);
            }
            info!(original_message_id, template_id = %rule.template_id, "escalation fired");
        }
        Ok(sent)
    }

    /// Every message this dispatcher has attempted to send, in send order.
    #[must_use]
    pub fn history(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }
}

fn note(message: &mut Message, reason: &str) {
    if let Value::Object(map) = &mut message.tracking {
        map.insert("failure_reason".to_string(), Value::String(reason.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, ConditionOperator, PersonalizationRules, SendCondition};
    use serde_json::json;

    fn review_assigned_template() -> Template {
        Template {
            id: "review_assigned".to_string(),
            subject_pattern: "Review request: {{manuscript_title}}".to_string(),
            body_pattern: "Please review {{manuscript_title}} by {{due_date}}.".to_string(),
            channel: Channel::Email,
            agent_id: "review".to_string(),
            scenario: "manuscript_submitted".to_string(),
            variables: vec!["manuscript_title".to_string(), "due_date".to_string()],
            personalization_rules: PersonalizationRules { role_prefix_field: Some("role".to_string()), ..Default::default() },
            send_conditions: vec![SendCondition {
                field: "quality_score".to_string(),
                operator: ConditionOperator::GreaterThan,
                value: json!(0.5),
                required: true,
            }],
            follow_up_rules: Vec::new(),
            escalation_rules: Vec::new(),
        }
    }

    #[tokio::test]
    async fn send_renders_and_delivers_when_conditions_are_met() {
        let dispatcher = CommunicationDispatcher::new(None, Environment::Development, vec![review_assigned_template()]).unwrap();
        let context = json!({"manuscript_title": "Deep Learning for X", "due_date": "2026-08-01", "role": "Reviewer", "quality_score": 0.8});
        let message = dispatcher.send("review_assigned", "reviewer@example.org", context, 5).await.unwrap();
        assert_eq!(message.status, MessageStatus::Sent);
        assert_eq!(message.subject, "[Reviewer] Review request: Deep Learning for X");
        assert_eq!(dispatcher.history().len(), 1);
    }

    #[tokio::test]
    async fn send_is_dropped_when_a_required_condition_fails() {
        let dispatcher = CommunicationDispatcher::new(None, Environment::Development, vec![review_assigned_template()]).unwrap();
        let context = json!({"manuscript_title": "Low Score Paper", "due_date": "2026-08-01", "quality_score": 0.1});
        let message = dispatcher.send("review_assigned", "reviewer@example.org", context, 5).await.unwrap();
        assert_eq!(message.status, MessageStatus::Failed);
    }

    #[tokio::test]
    async fn production_without_a_provider_is_a_configuration_error() {
        let result = CommunicationDispatcher::new(None, Environment::Production, Vec::new());
        assert!(matches!(result, Err(CommError::Configuration(_))));
    }

    #[tokio::test]
    async fn broadcast_sends_to_every_recipient() {
        let dispatcher = CommunicationDispatcher::new(None, Environment::Development, vec![review_assigned_template()]).unwrap();
        let context = json!({"manuscript_title": "Paper", "due_date": "2026-08-01", "quality_score": 0.9});
        let recipients = vec!["a@example.org".to_string(), "b@example.org".to_string()];
        let messages = dispatcher.broadcast("review_assigned", &recipients, context).await.unwrap();
        assert_eq!(messages.len(), 2);
    }
}
