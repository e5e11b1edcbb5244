use crate::models::{Condition, MetricsSnapshot};

/// Evaluate one metric-vs-threshold comparison.
///
/// A metric that is absent from the snapshot, or present but not numeric,
/// never matches.
pub fn evaluate_condition(condition: &Condition, metrics: &MetricsSnapshot) -> bool {
    metrics
        .get(&condition.metric)
        .is_some_and(|value| condition.operator.compare(value, condition.threshold))
}
