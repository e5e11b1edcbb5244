use super::condition::evaluate_condition;
use crate::models::{MetricsSnapshot, Rule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch {
    pub matched_conditions: usize,
    pub total_conditions: usize,
    pub triggered: bool,
}

/// Count matching conditions and decide whether the rule fires.
///
/// With `all_conditions_required` a rule with no conditions fires
/// unconditionally (0 of 0 matched). Otherwise a single match is enough.
pub fn match_rule(rule: &Rule, metrics: &MetricsSnapshot) -> RuleMatch {
    let total_conditions = rule.conditions.len();
    let matched_conditions = rule
        .conditions
        .iter()
        .filter(|c| evaluate_condition(c, metrics))
        .count();

    let triggered = if rule.all_conditions_required {
        matched_conditions == total_conditions
    } else {
        matched_conditions > 0
    };

    RuleMatch {
        matched_conditions,
        total_conditions,
        triggered,
    }
}
