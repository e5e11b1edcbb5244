use crate::models::ExecutionLogEntry;

/// Append-only audit trail for one evaluation pass.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    entries: Vec<ExecutionLogEntry>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: ExecutionLogEntry) {
        tracing::debug!(
            rule_id = %entry.rule_id,
            status = %entry.status,
            elapsed_ms = entry.elapsed_ms,
            matched = entry.matched_conditions,
            "Rule evaluated"
        );
        self.entries.push(entry);
    }

    pub fn into_entries(self) -> Vec<ExecutionLogEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorCode, RuleStatus};

    #[test]
    fn keeps_append_order() {
        let mut log = ExecutionLog::new();

        log.record(ExecutionLogEntry::new("b", RuleStatus::Passed, 0.2));
        log.record(ExecutionLogEntry::new("a", RuleStatus::Triggered, 0.1));
        log.record(
            ExecutionLogEntry::new("c", RuleStatus::Skipped, 0.0)
                .with_error(ErrorCode::SlaTotalEvaluationExceeded),
        );

        let entries = log.into_entries();
        let ids: Vec<_> = entries.iter().map(|e| e.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(
            entries[2].error_code,
            Some(ErrorCode::SlaTotalEvaluationExceeded)
        );
    }
}
