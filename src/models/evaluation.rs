use super::ruleset::{Condition, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_RULES: usize = 200;
pub const DEFAULT_MAX_TOTAL_EVALUATION_MS: u64 = 250;
pub const DEFAULT_MAX_RULE_EVALUATION_MS: u64 = 25;

/// Evaluation budgets. Any field left out of a config document keeps its
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlaConfig {
    pub max_rules: usize,
    pub max_total_evaluation_ms: u64,
    pub max_rule_evaluation_ms: u64,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            max_rules: DEFAULT_MAX_RULES,
            max_total_evaluation_ms: DEFAULT_MAX_TOTAL_EVALUATION_MS,
            max_rule_evaluation_ms: DEFAULT_MAX_RULE_EVALUATION_MS,
        }
    }
}

/// Per-field overrides layered on top of an [`SlaConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaOverrides {
    pub max_rules: Option<usize>,
    pub max_total_evaluation_ms: Option<u64>,
    pub max_rule_evaluation_ms: Option<u64>,
}

impl SlaOverrides {
    pub fn apply(&self, base: SlaConfig) -> SlaConfig {
        SlaConfig {
            max_rules: self.max_rules.unwrap_or(base.max_rules),
            max_total_evaluation_ms: self
                .max_total_evaluation_ms
                .unwrap_or(base.max_total_evaluation_ms),
            max_rule_evaluation_ms: self
                .max_rule_evaluation_ms
                .unwrap_or(base.max_rule_evaluation_ms),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.max_rules.is_none()
            && self.max_total_evaluation_ms.is_none()
            && self.max_rule_evaluation_ms.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RulesetInvalid,
    SlaRuleLimitExceeded,
    SlaTotalEvaluationExceeded,
    SlaRuleEvaluationExceeded,
    RuleEvaluationError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RulesetInvalid => "RULESET_INVALID",
            ErrorCode::SlaRuleLimitExceeded => "SLA_RULE_LIMIT_EXCEEDED",
            ErrorCode::SlaTotalEvaluationExceeded => "SLA_TOTAL_EVALUATION_EXCEEDED",
            ErrorCode::SlaRuleEvaluationExceeded => "SLA_RULE_EVALUATION_EXCEEDED",
            ErrorCode::RuleEvaluationError => "RULE_EVALUATION_ERROR",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "RULESET_INVALID" => Some(ErrorCode::RulesetInvalid),
            "SLA_RULE_LIMIT_EXCEEDED" => Some(ErrorCode::SlaRuleLimitExceeded),
            "SLA_TOTAL_EVALUATION_EXCEEDED" => Some(ErrorCode::SlaTotalEvaluationExceeded),
            "SLA_RULE_EVALUATION_EXCEEDED" => Some(ErrorCode::SlaRuleEvaluationExceeded),
            "RULE_EVALUATION_ERROR" => Some(ErrorCode::RuleEvaluationError),
            _ => None,
        }
    }

    /// True for codes that stop the pass before any rule runs.
    pub fn aborts_pass(&self) -> bool {
        matches!(
            self,
            ErrorCode::RulesetInvalid | ErrorCode::SlaRuleLimitExceeded
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Triggered,
    Passed,
    Error,
    Skipped,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Triggered => "triggered",
            RuleStatus::Passed => "passed",
            RuleStatus::Error => "error",
            RuleStatus::Skipped => "skipped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "triggered" => Some(RuleStatus::Triggered),
            "passed" => Some(RuleStatus::Passed),
            "error" => Some(RuleStatus::Error),
            "skipped" => Some(RuleStatus::Skipped),
            _ => None,
        }
    }
}

impl std::fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    pub rule_id: String,
    pub status: RuleStatus,
    pub elapsed_ms: f64,
    pub conditions: Vec<Condition>,
    pub matched_conditions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

impl ExecutionLogEntry {
    pub fn new(rule_id: impl Into<String>, status: RuleStatus, elapsed_ms: f64) -> Self {
        Self {
            rule_id: rule_id.into(),
            status,
            elapsed_ms,
            conditions: Vec::new(),
            matched_conditions: 0,
            message: None,
            error_code: None,
        }
    }

    pub fn with_conditions(mut self, conditions: &[Condition], matched: usize) -> Self {
        self.conditions = conditions.to_vec();
        self.matched_conditions = matched;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_error(mut self, code: ErrorCode) -> Self {
        self.error_code = Some(code);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub rule_id: String,
    pub title: String,
    pub severity: Severity,
    pub confidence: f64,
    pub recommendation: String,
    pub explanation: String,
    pub triggered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub ruleset_version: String,
    pub alerts: Vec<Alert>,
    pub execution_log: Vec<ExecutionLogEntry>,
    pub total_evaluation_ms: f64,
    pub errors: Vec<ErrorCode>,
    pub sla: SlaConfig,
}

impl EvaluationResult {
    /// A result for a pass that never started.
    pub fn aborted(
        ruleset_version: impl Into<String>,
        errors: Vec<ErrorCode>,
        total_evaluation_ms: f64,
        sla: SlaConfig,
    ) -> Self {
        Self {
            ruleset_version: ruleset_version.into(),
            alerts: Vec::new(),
            execution_log: Vec::new(),
            total_evaluation_ms,
            errors,
            sla,
        }
    }

    pub fn was_aborted(&self) -> bool {
        self.errors.iter().any(ErrorCode::aborts_pass)
    }
}

#[cfg(test)]
impl EvaluationResult {
    pub fn has_error(&self, code: ErrorCode) -> bool {
        self.errors.contains(&code)
    }

    pub fn entry(&self, rule_id: &str) -> Option<&ExecutionLogEntry> {
        self.execution_log.iter().find(|e| e.rule_id == rule_id)
    }

    pub fn count_status(&self, status: RuleStatus) -> usize {
        self.execution_log
            .iter()
            .filter(|e| e.status == status)
            .count()
    }
}
