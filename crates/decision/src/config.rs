//! Environment configuration for predictor loading and A/B assignment (spec §6).

use std::env;

use crate::error::{DecisionError, DecisionResult};

/// Predictor-loading configuration (spec §6, §9 "Pluggable predictors").
#[derive(Debug, Clone, Default)]
pub struct DecisionModelConfig {
    /// `MLFLOW_TRACKING_URI`, if set.
    pub mlflow_tracking_uri: Option<String>,
    /// `DECISION_MODEL_NAME`, if set.
    pub model_name: Option<String>,
    /// `DECISION_MODEL_VERSION`, if set.
    pub model_version: Option<String>,
    /// `DECISION_MODEL_PATH`, if set.
    pub model_path: Option<String>,
}

impl DecisionModelConfig {
    /// Reads predictor-loading keys from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            mlflow_tracking_uri: env::var("MLFLOW_TRACKING_URI").ok(),
            model_name: env::var("DECISION_MODEL_NAME").ok(),
            model_version: env::var("DECISION_MODEL_VERSION").ok(),
            model_path: env::var("DECISION_MODEL_PATH").ok(),
        }
    }

    /// Whether any predictor identity was configured at all.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.model_name.is_some() || self.model_path.is_some()
    }
}

/// A/B bucket assignment configuration (spec §4.4 step 6, §6).
#[derive(Debug, Clone)]
pub struct AbConfig {
    /// Bucket name -> percentage, normalized to sum to 100, in declaration order.
    pub splits: Vec<(String, u8)>,
    /// Context field used as the sticky hash key.
    pub sticky_by: String,
    /// Forces every assignment to this bucket, if set.
    pub force: Option<String>,
}

impl Default for AbConfig {
    fn default() -> Self {
        Self {
            splits: vec![("control".to_string(), 50), ("variant".to_string(), 50)],
            sticky_by: "submission_id".to_string(),
            force: None,
        }
    }
}

impl AbConfig {
    /// Reads `DECISION_AB_SPLIT` / `DECISION_AB_STICKY_BY` / `DECISION_AB_FORCE`.
    ///
    /// # Errors
    /// Returns [`DecisionError::Configuration`] if `DECISION_AB_SPLIT` does not
    /// normalize to 100.
    pub fn from_env() -> DecisionResult<Self> {
        let splits = match env::var("DECISION_AB_SPLIT") {
            Ok(raw) => Self::parse_splits(&raw)?,
            Err(_) => Self::default().splits,
        };
        let sticky_by = env::var("DECISION_AB_STICKY_BY").unwrap_or_else(|_| "submission_id".to_string());
        let force = env::var("DECISION_AB_FORCE").ok();
        Ok(Self { splits, sticky_by, force })
    }

    fn parse_splits(raw: &str) -> DecisionResult<Vec<(String, u8)>> {
        let mut splits = Vec::new();
        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (name, pct) = entry
                .split_once(':')
                .ok_or_else(|| DecisionError::Configuration(format!("malformed DECISION_AB_SPLIT entry: {entry}")))?;
            let pct: u8 = pct
                .trim()
                .parse()
                .map_err(|_| DecisionError::Configuration(format!("malformed DECISION_AB_SPLIT percentage: {pct}")))?;
            splits.push((name.trim().to_string(), pct));
        }
        let total: u32 = splits.iter().map(|(_, pct)| u32::from(*pct)).sum();
        if total != 100 {
            return Err(DecisionError::Configuration(format!(
                "DECISION_AB_SPLIT must normalize to 100, got {total}"
            )));
        }
        Ok(splits)
    }

    /// Deterministically assigns a bucket for `sticky_value` by hashing it modulo
    /// 100 against the configured splits (law L3: pure function of the input).
    #[must_use]
    pub fn choose_variant(&self, sticky_value: Option<&str>) -> String {
        if let Some(forced) = &self.force {
            return forced.clone();
        }
        let Some(splits_first) = self.splits.first() else {
            return String::new();
        };
        let Some(value) = sticky_value.filter(|v| !v.is_empty()) else {
            return splits_first.0.clone();
        };
        let bucket = hash_mod_100(value);
        let mut cumulative = 0u32;
        for (name, pct) in &self.splits {
            cumulative += u32::from(*pct);
            if u32::from(bucket) < cumulative {
                return name.clone();
            }
        }
        splits_first.0.clone()
    }
}

fn hash_mod_100(value: &str) -> u8 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    (hasher.finish() % 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choose_variant_is_pure_law_l3() {
        let config = AbConfig::default();
        let first = config.choose_variant(Some("sub-123"));
        let second = config.choose_variant(Some("sub-123"));
        assert_eq!(first, second);
    }

    #[test]
    fn missing_sticky_value_picks_first_bucket() {
        let config = AbConfig::default();
        assert_eq!(config.choose_variant(None), "control");
    }

    #[test]
    fn forced_variant_always_wins() {
        let mut config = AbConfig::default();
        config.force = Some("variant".to_string());
        assert_eq!(config.choose_variant(Some("anything")), "variant");
    }

    #[test]
    fn split_not_summing_to_100_is_a_configuration_error() {
        assert!(AbConfig::parse_splits("control:40,variant:40").is_err());
    }
}
