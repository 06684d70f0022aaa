//! Heuristic strategic-analytics helpers for the Analytics agent type
//! (spec §9).
//!
//! The source system's `strategic_analytics` module trains transformer
//! insight models and SQLite-backed forecasters; spec §9 leaves it
//! unspecified whether that belongs on the Coordinator's DAG as an eighth
//! agent or as an internal tool of the Analytics agent, and settles on the
//! latter. These functions produce the same shape of output — ranked
//! insights, prioritized recommendations, an executive summary — from
//! simple threshold heuristics, meant to be called from a host's
//! [`crate::ProcessTask`] implementation for the `Analytics` agent type,
//! never from `Agent::execute` itself.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity/urgency bucket for a generated insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightSeverity {
    /// Within target; no action implied.
    Low,
    /// Drifting; worth scheduling.
    Medium,
    /// Off target; address this week.
    High,
    /// Badly off target; address immediately.
    Critical,
}

/// One observation about a performance metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    /// Metric this insight concerns.
    pub category: String,
    /// Human-readable observation.
    pub description: String,
    /// Urgency bucket.
    pub severity: InsightSeverity,
    /// Relative distance from target, used to rank insights.
    pub priority_score: f64,
}

/// A recommended action derived from one insight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// Metric this recommendation addresses.
    pub category: String,
    /// What to do.
    pub action: String,
    /// Inherited from the source insight's severity.
    pub priority: InsightSeverity,
    /// Suggested timeline, derived from `priority`.
    pub timeline: String,
}

/// `{insights, recommendations, executive_summary}` bundle from one pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategicAnalysis {
    /// Ranked, most-urgent-first.
    pub insights: Vec<Insight>,
    /// One recommendation per insight.
    pub recommendations: Vec<Recommendation>,
    /// One-line health summary.
    pub executive_summary: String,
}

/// `(metric, threshold, description)`; a metric "breaches" when it falls
/// below its threshold, except `average_review_time_days`, where lower is
/// better and a breach means exceeding it.
const METRIC_THRESHOLDS: &[(&str, f64, &str)] = &[
    ("acceptance_rate", 0.3, "acceptance rate is trending low"),
    ("average_review_time_days", 21.0, "review turnaround is slower than target"),
    ("quality_score", 0.5, "average quality score is below target"),
];

/// Generates insights from a flat `{metric: value}` performance map,
/// ranked most-urgent-first.
#[must_use]
pub fn generate_insights(performance_data: &Map<String, Value>) -> Vec<Insight> {
    let mut insights: Vec<Insight> = METRIC_THRESHOLDS
        .iter()
        .filter_map(|(metric, threshold, description)| {
            let value = performance_data.get(*metric)?.as_f64()?;
            let breached = if *metric == "average_review_time_days" { value > *threshold } else { value < *threshold };
            if !breached {
                return None;
            }
            let distance = (threshold - value).abs() / threshold.max(f64::EPSILON);
            Some(Insight {
                category: (*metric).to_string(),
                description: (*description).to_string(),
                severity: severity_for(distance),
                priority_score: distance,
            })
        })
        .collect();
    insights.sort_by(|a, b| b.priority_score.partial_cmp(&a.priority_score).unwrap_or(std::cmp::Ordering::Equal));
    insights
}

fn severity_for(distance: f64) -> InsightSeverity {
    if distance >= 0.5 {
        InsightSeverity::Critical
    } else if distance >= 0.25 {
        InsightSeverity::High
    } else if distance >= 0.1 {
        InsightSeverity::Medium
    } else {
        InsightSeverity::Low
    }
}

/// Turns insights into timeline-bound recommendations, one per insight.
#[must_use]
pub fn generate_recommendations(insights: &[Insight]) -> Vec<Recommendation> {
    insights
        .iter()
        .map(|insight| Recommendation {
            category: insight.category.clone(),
            action: format!("investigate and address: {}", insight.description),
            priority: insight.severity,
            timeline: timeline_for(insight.severity).to_string(),
        })
        .collect()
}

fn timeline_for(severity: InsightSeverity) -> &'static str {
    match severity {
        InsightSeverity::Critical => "immediate",
        InsightSeverity::High => "this week",
        InsightSeverity::Medium => "this month",
        InsightSeverity::Low => "this quarter",
    }
}

/// Runs the full analysis pass over a performance snapshot.
#[must_use]
pub fn analyze(performance_data: &Map<String, Value>) -> StrategicAnalysis {
    let insights = generate_insights(performance_data);
    let recommendations = generate_recommendations(&insights);
    let executive_summary = summarize(&insights);
    StrategicAnalysis { insights, recommendations, executive_summary }
}

fn summarize(insights: &[Insight]) -> String {
    if insights.is_empty() {
        return "all tracked metrics are within target; no action needed".to_string();
    }
    let critical = insights.iter().filter(|insight| insight.severity == InsightSeverity::Critical).count();
    if critical > 0 {
        format!("{critical} metric(s) critically off target; immediate attention required")
    } else {
        format!("{} metric(s) below target; see recommendations", insights.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn healthy_metrics_produce_no_insights() {
        let performance = json!({"acceptance_rate": 0.5, "average_review_time_days": 10.0, "quality_score": 0.8})
            .as_object()
            .cloned()
            .unwrap();
        let analysis = analyze(&performance);
        assert!(analysis.insights.is_empty());
        assert!(analysis.executive_summary.contains("within target"));
    }

    #[test]
    fn a_badly_missed_metric_ranks_first_and_is_critical() {
        let performance = json!({"acceptance_rate": 0.05, "quality_score": 0.45}).as_object().cloned().unwrap();
        let analysis = analyze(&performance);
        assert_eq!(analysis.insights[0].category, "acceptance_rate");
        assert_eq!(analysis.insights[0].severity, InsightSeverity::Critical);
        assert_eq!(analysis.recommendations.len(), analysis.insights.len());
    }
}
