use super::{
    alert::build_alert,
    execution_log::ExecutionLog,
    loader,
    matcher::match_rule,
    sla::{Admission, Clock, SlaGovernor, SystemClock},
};
use crate::models::{
    Alert, ErrorCode, EvaluationInput, EvaluationResult, ExecutionLogEntry, MetricsSnapshot,
    RuleEntry, RuleSetDocument, RuleStatus, SlaConfig,
};
use std::time::Instant;
use tracing::{info, warn};

/// What happened to a single admitted rule.
struct RuleOutcome {
    entry: ExecutionLogEntry,
    alert: Option<Alert>,
    error: Option<ErrorCode>,
}

/// Evaluates a metrics snapshot against one ruleset under fixed budgets.
///
/// The ruleset document and SLA config are fixed at construction and never
/// mutated, so one engine can serve concurrent evaluations.
pub struct DecisionEngine<C: Clock = SystemClock> {
    document: RuleSetDocument,
    sla: SlaConfig,
    clock: C,
}

impl DecisionEngine<SystemClock> {
    pub fn new(document: RuleSetDocument, sla: SlaConfig) -> Self {
        Self::with_clock(document, sla, SystemClock)
    }
}

impl<C: Clock> DecisionEngine<C> {
    pub fn with_clock(document: RuleSetDocument, sla: SlaConfig, clock: C) -> Self {
        Self {
            document,
            sla,
            clock,
        }
    }

    pub fn evaluate(&self, input: &EvaluationInput) -> EvaluationResult {
        let span = tracing::info_span!(
            "evaluate",
            organization_id = %input.organization_id,
            field_id = input.field_id.as_deref().unwrap_or("-"),
            plot_id = input.plot_id.as_deref().unwrap_or("-"),
        );
        let _enter = span.enter();

        let governor = SlaGovernor::start(self.sla, &self.clock);

        let ruleset = match loader::load(&self.document) {
            Ok(ruleset) => ruleset,
            Err(errors) => {
                return EvaluationResult::aborted(
                    self.document.version().unwrap_or_default(),
                    errors,
                    governor.total_elapsed_ms(),
                    self.sla,
                );
            }
        };

        let enabled: Vec<&RuleEntry> = ruleset.enabled().collect();
        if let Err(code) = governor.check_rule_count(enabled.len()) {
            return EvaluationResult::aborted(
                ruleset.version,
                vec![code],
                governor.total_elapsed_ms(),
                self.sla,
            );
        }

        let mut log = ExecutionLog::new();
        let mut alerts = Vec::new();
        let mut errors = Vec::new();

        for rule in enabled {
            let started = match governor.admit_rule() {
                Admission::Proceed(started) => started,
                Admission::BudgetExhausted { elapsed_ms } => {
                    warn!(
                        rule_id = %rule.id(),
                        elapsed_ms,
                        budget_ms = self.sla.max_total_evaluation_ms,
                        "Total evaluation budget exceeded, abandoning remaining rules"
                    );
                    log.record(skipped_entry(rule, elapsed_ms, self.sla));
                    errors.push(ErrorCode::SlaTotalEvaluationExceeded);
                    break;
                }
            };

            let outcome = self.run_rule(rule, &input.metrics, &governor, started);
            if let Some(alert) = outcome.alert {
                alerts.push(alert);
            }
            if let Some(code) = outcome.error {
                errors.push(code);
            }
            log.record(outcome.entry);
        }

        let total_evaluation_ms = governor.total_elapsed_ms();
        let execution_log = log.into_entries();
        info!(
            ruleset_version = %ruleset.version,
            alerts = alerts.len(),
            evaluated = execution_log.len(),
            errors = errors.len(),
            total_evaluation_ms,
            "Evaluation pass complete"
        );

        EvaluationResult {
            ruleset_version: ruleset.version,
            alerts,
            execution_log,
            total_evaluation_ms,
            errors,
            sla: self.sla,
        }
    }

    fn run_rule(
        &self,
        entry: &RuleEntry,
        metrics: &MetricsSnapshot,
        governor: &SlaGovernor<'_, C>,
        started: Instant,
    ) -> RuleOutcome {
        let rule = match entry {
            RuleEntry::Valid(rule) => rule,
            RuleEntry::Malformed(malformed) => {
                let elapsed_ms = governor.rule_elapsed_ms(started);
                warn!(rule_id = %malformed.id, reason = %malformed.reason, "Rule could not be evaluated");
                return RuleOutcome {
                    entry: ExecutionLogEntry::new(&malformed.id, RuleStatus::Error, elapsed_ms)
                        .with_message(format!("Malformed rule: {}", malformed.reason))
                        .with_error(ErrorCode::RuleEvaluationError),
                    alert: None,
                    error: Some(ErrorCode::RuleEvaluationError),
                };
            }
        };

        let result = match_rule(rule, metrics);
        let elapsed_ms = governor.rule_elapsed_ms(started);
        let matched = format!(
            "{}/{} conditions matched",
            result.matched_conditions, result.total_conditions
        );

        if governor.rule_budget_exceeded(elapsed_ms) {
            warn!(
                rule_id = %rule.id,
                elapsed_ms,
                budget_ms = self.sla.max_rule_evaluation_ms,
                "Rule exceeded its evaluation budget"
            );
            return RuleOutcome {
                entry: ExecutionLogEntry::new(&rule.id, RuleStatus::Error, elapsed_ms)
                    .with_conditions(&rule.conditions, result.matched_conditions)
                    .with_message(format!(
                        "Rule evaluation took {:.3} ms, budget is {} ms ({})",
                        elapsed_ms, self.sla.max_rule_evaluation_ms, matched
                    ))
                    .with_error(ErrorCode::SlaRuleEvaluationExceeded),
                alert: None,
                error: Some(ErrorCode::SlaRuleEvaluationExceeded),
            };
        }

        let (status, alert) = if result.triggered {
            (
                RuleStatus::Triggered,
                Some(build_alert(rule, self.clock.utc_now())),
            )
        } else {
            (RuleStatus::Passed, None)
        };

        RuleOutcome {
            entry: ExecutionLogEntry::new(&rule.id, status, elapsed_ms)
                .with_conditions(&rule.conditions, result.matched_conditions)
                .with_message(matched),
            alert,
            error: None,
        }
    }
}

/// Entry for the rule the pass stopped at. The rule never ran, so its own
/// elapsed time is recorded as zero and the message says so.
fn skipped_entry(entry: &RuleEntry, elapsed_ms: f64, sla: SlaConfig) -> ExecutionLogEntry {
    let skipped = ExecutionLogEntry::new(entry.id(), RuleStatus::Skipped, 0.0)
        .with_message(format!(
            "Not evaluated (0 ms): pass had run {:.3} ms, budget is {} ms",
            elapsed_ms, sla.max_total_evaluation_ms
        ))
        .with_error(ErrorCode::SlaTotalEvaluationExceeded);

    match entry {
        RuleEntry::Valid(rule) => skipped.with_conditions(&rule.conditions, 0),
        RuleEntry::Malformed(_) => skipped,
    }
}
