use crate::models::{Alert, Rule};
use chrono::{DateTime, Utc};

/// Build the alert for a triggered rule.
///
/// The id pairs the rule id with the trigger instant in milliseconds, so
/// alerts from different rules in the same millisecond never collide.
/// Presentation fields are copied from the rule untouched.
pub fn build_alert(rule: &Rule, triggered_at: DateTime<Utc>) -> Alert {
    Alert {
        id: format!("{}-{}", rule.id, triggered_at.timestamp_millis()),
        rule_id: rule.id.clone(),
        title: rule.title.clone(),
        severity: rule.severity,
        confidence: rule.confidence,
        recommendation: rule.recommendation.clone(),
        explanation: rule.explanation.clone(),
        triggered_at,
    }
}
