//! Template rendering, personalization, and send-condition evaluation.

use serde_json::{Map, Value};

use crate::types::{ConditionOperator, PersonalizationRules, SendCondition};

/// Substitutes `{{field}}` placeholders from `context`; an absent field
/// renders as an empty string.
#[must_use]
pub fn render(pattern: &str, context: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        rest = &rest[start + 2..];
        let Some(end) = rest.find("}}") else {
            out.push_str("{{");
            out.push_str(rest);
            return out;
        };
        let key = rest[..end].trim();
        if let Some(value) = context.get(key) {
            out.push_str(&display(value));
        }
        rest = &rest[end + 2..];
    }
    out.push_str(rest);
    out
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Applies locale/role-prefix/timezone personalization, returning the
/// (possibly prefixed) subject and a tracking payload describing what was
/// applied.
#[must_use]
pub fn personalize(subject: &str, rules: &PersonalizationRules, context: &Map<String, Value>) -> (String, Value) {
    let mut subject = subject.to_string();
    if let Some(field) = &rules.role_prefix_field {
        if let Some(role) = context.get(field).and_then(Value::as_str) {
            subject = format!("[{role}] {subject}");
        }
    }
    let mut tracking = Map::new();
    if let Some(field) = &rules.locale_field {
        if let Some(locale) = context.get(field).and_then(Value::as_str) {
            tracking.insert("locale".to_string(), Value::String(locale.to_string()));
        }
    }
    if let Some(field) = &rules.timezone_field {
        if let Some(timezone) = context.get(field).and_then(Value::as_str) {
            tracking.insert("timezone".to_string(), Value::String(timezone.to_string()));
        }
    }
    (subject, Value::Object(tracking))
}

/// Whether the message should be sent: every `required` condition must hold.
#[must_use]
pub fn evaluate_send_conditions(conditions: &[SendCondition], context: &Map<String, Value>) -> bool {
    conditions.iter().filter(|condition| condition.required).all(|condition| condition_matches(condition, context))
}

/// Whether a single condition holds against `context` (ignores `required`).
#[must_use]
pub fn condition_matches(condition: &SendCondition, context: &Map<String, Value>) -> bool {
    let actual = context.get(&condition.field);
    match condition.operator {
        ConditionOperator::Exists => actual.is_some(),
        ConditionOperator::Equals => actual == Some(&condition.value),
        ConditionOperator::NotEquals => actual != Some(&condition.value),
        ConditionOperator::GreaterThan => compare(actual, &condition.value, |a, b| a > b),
        ConditionOperator::LessThan => compare(actual, &condition.value, |a, b| a < b),
    }
}

fn compare(actual: Option<&Value>, expected: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.and_then(Value::as_f64), expected.as_f64()) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_substitutes_known_fields_and_blanks_unknown_ones() {
        let context = json!({"name": "Dr. Lee"}).as_object().cloned().unwrap();
        assert_eq!(render("Hello {{name}}, re {{missing}}", &context), "Hello Dr. Lee, re ");
    }

    #[test]
    fn role_prefix_is_prepended_to_the_subject() {
        let context = json!({"role": "Editor"}).as_object().cloned().unwrap();
        let rules = PersonalizationRules { role_prefix_field: Some("role".to_string()), ..Default::default() };
        let (subject, _) = personalize("Manuscript ready", &rules, &context);
        assert_eq!(subject, "[Editor] Manuscript ready");
    }

    #[test]
    fn an_unmet_required_condition_blocks_the_send() {
        let context = json!({"quality_score": 0.4}).as_object().cloned().unwrap();
        let conditions = vec![SendCondition {
            field: "quality_score".to_string(),
            operator: ConditionOperator::GreaterThan,
            value: json!(0.6),
            required: true,
        }];
        assert!(!evaluate_send_conditions(&conditions, &context));
    }
}
