//! Conflict resolution strategies (spec §4.7 "Conflict resolution strategies").

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A configured conflict resolution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStrategy {
    /// The side with the newer extractable timestamp wins.
    LatestWins,
    /// Shallow-merge a configured field list from the local side.
    Merge,
    /// Record the conflict and leave it unresolved.
    Manual,
    /// Named fallback: always prefers the local (agent) side.
    AgentPriority,
    /// Named fallback: always prefers the external (OJS) side.
    OjsPriority,
}

impl ConflictStrategy {
    /// Stable string form persisted on `ConflictRecord::strategy`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::LatestWins => "latest_wins",
            Self::Merge => "merge",
            Self::Manual => "manual",
            Self::AgentPriority => "agent_priority",
            Self::OjsPriority => "ojs_priority",
        }
    }
}

impl Default for ConflictStrategy {
    fn default() -> Self {
        Self::LatestWins
    }
}

const TIMESTAMP_FIELDS: &[&str] = &["updated_at", "modified_at", "last_updated", "timestamp"];
const DEFAULT_MERGE_FIELDS: &[&str] = &["agent_analysis", "quality_score", "recommendations"];

/// The outcome of applying a strategy to a detected conflict.
pub struct Resolution {
    /// Reconciled payload.
    pub winner: Value,
    /// Whether `winner` should be pushed to the local side.
    pub push_local: bool,
    /// Whether `winner` should be pushed to the external side.
    pub push_external: bool,
    /// Whether the conflict is considered resolved (`manual` never is).
    pub resolved: bool,
}

/// Applies `strategy` to a local/external pair that hashed differently.
#[must_use]
pub fn resolve(strategy: ConflictStrategy, local: &Value, external: &Value, merge_fields: &[String], now: DateTime<Utc>) -> Resolution {
    match strategy {
        ConflictStrategy::LatestWins => {
            let local_ts = extract_timestamp(local);
            let external_ts = extract_timestamp(external);
            if external_ts > local_ts {
                Resolution { winner: external.clone(), push_local: true, push_external: false, resolved: true }
            } else {
                Resolution { winner: local.clone(), push_local: false, push_external: true, resolved: true }
            }
        }
        ConflictStrategy::Merge => {
            let owned_default: Vec<String>;
            let fields: &[String] = if merge_fields.is_empty() {
                owned_default = DEFAULT_MERGE_FIELDS.iter().map(ToString::to_string).collect();
                &owned_default
            } else {
                merge_fields
            };
            let mut merged = external.clone();
            if let (Value::Object(merged_map), Value::Object(local_map)) = (&mut merged, local) {
                for field in fields {
                    if let Some(value) = local_map.get(field.as_str()) {
                        merged_map.insert(field.clone(), value.clone());
                    }
                }
                merged_map.insert("last_updated".to_string(), Value::String(now.to_rfc3339()));
            }
            Resolution { winner: merged, push_local: true, push_external: true, resolved: true }
        }
        ConflictStrategy::Manual => {
            Resolution { winner: local.clone(), push_local: false, push_external: false, resolved: false }
        }
        ConflictStrategy::AgentPriority => {
            Resolution { winner: local.clone(), push_local: false, push_external: true, resolved: true }
        }
        ConflictStrategy::OjsPriority => {
            Resolution { winner: external.clone(), push_local: true, push_external: false, resolved: true }
        }
    }
}

/// Extracts a timestamp from the first present field of
/// `{updated_at, modified_at, last_updated, timestamp}`, normalizing a bare
/// `T`-containing string (no offset) to UTC and a trailing `Z` to `+00:00`.
#[must_use]
pub fn extract_timestamp(payload: &Value) -> Option<DateTime<Utc>> {
    let object = payload.as_object()?;
    for field in TIMESTAMP_FIELDS {
        if let Some(raw) = object.get(*field).and_then(Value::as_str) {
            if let Some(parsed) = parse_timestamp(raw) {
                return Some(parsed);
            }
        }
    }
    None
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = if raw.ends_with('Z') {
        format!("{}+00:00", &raw[..raw.len() - 1])
    } else if raw.contains('T') && !raw.contains('+') && !raw.ends_with("00:00") {
        format!("{raw}+00:00")
    } else {
        raw.to_string()
    };
    DateTime::parse_from_rfc3339(&normalized).ok().map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn latest_wins_prefers_the_newer_side() {
        let local = json!({"title": "A", "last_updated": "2024-01-01T10:00:00Z"});
        let external = json!({"title": "B", "last_updated": "2024-01-01T11:00:00Z"});
        let resolution = resolve(ConflictStrategy::LatestWins, &local, &external, &[], Utc::now());
        assert_eq!(resolution.winner["title"], "B");
        assert!(resolution.push_local);
        assert!(!resolution.push_external);
        assert!(resolution.resolved);
    }

    #[test]
    fn manual_leaves_the_conflict_unresolved() {
        let local = json!({"title": "A"});
        let external = json!({"title": "B"});
        let resolution = resolve(ConflictStrategy::Manual, &local, &external, &[], Utc::now());
        assert!(!resolution.resolved);
        assert!(!resolution.push_local && !resolution.push_external);
    }

    #[test]
    fn merge_takes_configured_fields_from_local() {
        let local = json!({"quality_score": 0.9, "title": "local title"});
        let external = json!({"quality_score": 0.2, "title": "external title"});
        let resolution = resolve(
            ConflictStrategy::Merge,
            &local,
            &external,
            &["quality_score".to_string()],
            Utc::now(),
        );
        assert_eq!(resolution.winner["quality_score"], 0.9);
        assert_eq!(resolution.winner["title"], "external title");
        assert!(resolution.push_local && resolution.push_external);
    }

    #[test]
    fn bare_z_and_offsetless_timestamps_both_parse() {
        let a = json!({"timestamp": "2024-01-01T00:00:00Z"});
        let b = json!({"timestamp": "2024-01-01T00:00:00"});
        assert_eq!(extract_timestamp(&a), extract_timestamp(&b));
    }
}
