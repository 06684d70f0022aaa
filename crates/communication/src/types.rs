//! Message, template, and rule types (spec §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Delivery channel a template targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Email.
    Email,
    /// SMS.
    Sms,
    /// Internal chat / messaging platform.
    Chat,
    /// Outbound HTTP webhook.
    Webhook,
    /// Delivered to an internal inbox only, no external provider.
    Internal,
}

/// Lifecycle state of a dispatched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Created, not yet attempted.
    Pending,
    /// Handed to the channel provider.
    Sent,
    /// Provider confirmed receipt.
    Delivered,
    /// Delivery attempt failed.
    Failed,
    /// Provider reported a hard bounce.
    Bounced,
}

/// A rendered, dispatched (or about-to-be-dispatched) message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Identifier.
    pub id: String,
    /// Template this message was rendered from.
    pub template_id: String,
    /// Recipient address/identifier, channel-dependent.
    pub recipient: String,
    /// Agent that triggered the send, if any.
    pub sender_agent: Option<String>,
    /// Rendered subject line.
    pub subject: String,
    /// Rendered body.
    pub body: String,
    /// Delivery channel.
    pub channel: Channel,
    /// Caller-supplied priority, passed through to the provider.
    pub priority: u8,
    /// When the message is eligible for delivery.
    pub scheduled_at: DateTime<Utc>,
    /// When the provider accepted the message, if sent.
    pub sent_at: Option<DateTime<Utc>>,
    /// Current lifecycle state.
    pub status: MessageStatus,
    /// Render context used to produce subject/body.
    pub context: Value,
    /// Attachment references; opaque to the dispatcher.
    pub attachments: Vec<String>,
    /// Personalization/provider tracking metadata (locale, timezone, ...).
    pub tracking: Value,
    /// Number of escalations raised against this message so far.
    pub escalation_count: u32,
}

/// How to compare a context field's value to a condition's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// The field must be present.
    Exists,
    /// The field must equal the condition's value.
    Equals,
    /// The field must differ from the condition's value.
    NotEquals,
    /// The field, read as a number, must exceed the condition's value.
    GreaterThan,
    /// The field, read as a number, must be below the condition's value.
    LessThan,
}

/// A gate evaluated against the render context before a message is sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendCondition {
    /// Context field to inspect.
    pub field: String,
    /// Comparison to apply.
    pub operator: ConditionOperator,
    /// Value to compare against (ignored for `Exists`).
    pub value: Value,
    /// If true, an unmet condition drops the send entirely.
    pub required: bool,
}

/// Personalization knobs applied after rendering (spec: "locale, role
/// prefix, timezone").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalizationRules {
    /// Context field holding the recipient's locale.
    pub locale_field: Option<String>,
    /// Context field holding the recipient's role; prefixed onto the subject.
    pub role_prefix_field: Option<String>,
    /// Context field holding the recipient's timezone.
    pub timezone_field: Option<String>,
}

/// A follow-up to send a fixed delay after the original message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpRule {
    /// Delay after the original send before the follow-up becomes due.
    pub delay_secs: i64,
    /// Template to render the follow-up from.
    pub template_id: String,
    /// Only send the follow-up if this condition holds against the original context.
    pub condition: Option<SendCondition>,
}

/// Periodic escalation checked against outstanding messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRule {
    /// Condition against the original context that triggers escalation.
    pub trigger_condition: SendCondition,
    /// Delay after the original send before this escalation is eligible.
    pub delay_secs: i64,
    /// Recipients of the escalation message.
    pub recipients: Vec<String>,
    /// Template to render the escalation from.
    pub template_id: String,
    /// Maximum number of times this rule may fire per message.
    pub max_escalations: u32,
}

/// A message template (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Identifier.
    pub id: String,
    /// Subject with `{{variable}}` placeholders.
    pub subject_pattern: String,
    /// Body with `{{variable}}` placeholders.
    pub body_pattern: String,
    /// Delivery channel.
    pub channel: Channel,
    /// Agent this template is authored for/by.
    pub agent_id: String,
    /// Scenario name this template belongs to (e.g. `manuscript_submitted`).
    pub scenario: String,
    /// Declared variable names, for documentation/validation.
    pub variables: Vec<String>,
    /// Personalization to apply after rendering.
    pub personalization_rules: PersonalizationRules,
    /// Conditions gating whether the message is sent at all.
    pub send_conditions: Vec<SendCondition>,
    /// Follow-ups scheduled after a successful send.
    pub follow_up_rules: Vec<FollowUpRule>,
    /// Escalations checked periodically against this template's sends.
    pub escalation_rules: Vec<EscalationRule>,
}

/// A follow-up or escalation not yet due.
#[derive(Debug, Clone)]
pub(crate) struct ScheduledFollowUp {
    pub due_at: DateTime<Utc>,
    pub template_id: String,
    pub recipient: String,
    pub context: Map<String, Value>,
    pub sender_agent: Option<String>,
}

/// An escalation tracked against one originally-sent message.
#[derive(Debug, Clone)]
pub(crate) struct TrackedEscalation {
    pub original_message_id: String,
    pub rule: EscalationRule,
    pub context: Map<String, Value>,
    pub fired_count: u32,
    pub next_eligible_at: DateTime<Utc>,
}
