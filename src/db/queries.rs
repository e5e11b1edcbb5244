use crate::db::Database;
use crate::error::Result;
use crate::models::{
    Alert, Condition, ErrorCode, EvaluationInput, EvaluationResult, ExecutionLogEntry, RuleStatus,
    RunSummary, Severity,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Row};
use tracing::warn;

// Evaluation Run Queries

impl Database {
    /// Store one evaluation with its alerts and execution log. Returns the
    /// generated run id.
    pub fn record_run(&self, input: &EvaluationInput, result: &EvaluationResult) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let errors = serde_json::to_string(&result.errors)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                r#"
                INSERT INTO evaluation_runs
                    (id, organization_id, campaign_id, field_id, plot_id, ruleset_version,
                     total_evaluation_ms, errors, alert_count, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    run_id,
                    input.organization_id,
                    input.campaign_id,
                    input.field_id,
                    input.plot_id,
                    result.ruleset_version,
                    result.total_evaluation_ms,
                    errors,
                    result.alerts.len() as i64,
                    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
                ],
            )?;

            for alert in &result.alerts {
                tx.execute(
                    r#"
                    INSERT INTO run_alerts
                        (run_id, alert_id, rule_id, title, severity, confidence,
                         recommendation, explanation, triggered_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    "#,
                    params![
                        run_id,
                        alert.id,
                        alert.rule_id,
                        alert.title,
                        alert.severity.as_str(),
                        alert.confidence,
                        alert.recommendation,
                        alert.explanation,
                        alert.triggered_at.to_rfc3339(),
                    ],
                )?;
            }

            for (position, entry) in result.execution_log.iter().enumerate() {
                tx.execute(
                    r#"
                    INSERT INTO run_log_entries
                        (run_id, position, rule_id, status, elapsed_ms, conditions,
                         matched_conditions, message, error_code)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    "#,
                    params![
                        run_id,
                        position as i64,
                        entry.rule_id,
                        entry.status.as_str(),
                        entry.elapsed_ms,
                        serde_json::to_string(&entry.conditions)?,
                        entry.matched_conditions as i64,
                        entry.message,
                        entry.error_code.map(|c| c.as_str()),
                    ],
                )?;
            }

            tx.commit()?;
            Ok(())
        })?;

        tracing::debug!(run_id = %run_id, "Evaluation run recorded");
        Ok(run_id)
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM evaluation_runs ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            )?;
            let runs = stmt
                .query_map([limit as i64], row_to_run_summary)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(runs)
        })
    }

    pub fn run_alerts(&self, run_id: &str) -> Result<Vec<Alert>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM run_alerts WHERE run_id = ?1 ORDER BY id")?;
            let alerts = stmt
                .query_map([run_id], row_to_alert)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(alerts)
        })
    }

    pub fn run_log(&self, run_id: &str) -> Result<Vec<ExecutionLogEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM run_log_entries WHERE run_id = ?1 ORDER BY position")?;
            let entries = stmt
                .query_map([run_id], row_to_log_entry)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(entries)
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_run_summary(row: &Row) -> rusqlite::Result<RunSummary> {
    let errors_str: String = row.get("errors")?;
    let created_at_str: String = row.get("created_at")?;
    let alert_count: i64 = row.get("alert_count")?;

    let errors: Vec<ErrorCode> = serde_json::from_str(&errors_str).unwrap_or_else(|e| {
        warn!(errors = %errors_str, error = %e, "Unreadable error codes in database, ignoring");
        Vec::new()
    });

    Ok(RunSummary {
        id: row.get("id")?,
        organization_id: row.get("organization_id")?,
        campaign_id: row.get("campaign_id")?,
        field_id: row.get("field_id")?,
        plot_id: row.get("plot_id")?,
        ruleset_version: row.get("ruleset_version")?,
        total_evaluation_ms: row.get("total_evaluation_ms")?,
        errors,
        alert_count: alert_count.max(0) as usize,
        created_at: parse_timestamp(&created_at_str),
    })
}

fn row_to_alert(row: &Row) -> rusqlite::Result<Alert> {
    let severity_str: String = row.get("severity")?;
    let triggered_at_str: String = row.get("triggered_at")?;

    let severity = Severity::from_str(&severity_str).unwrap_or_else(|| {
        warn!(
            severity = %severity_str,
            "Unknown severity in database, defaulting to Info"
        );
        Severity::Info
    });

    Ok(Alert {
        id: row.get("alert_id")?,
        rule_id: row.get("rule_id")?,
        title: row.get("title")?,
        severity,
        confidence: row.get("confidence")?,
        recommendation: row.get("recommendation")?,
        explanation: row.get("explanation")?,
        triggered_at: parse_timestamp(&triggered_at_str),
    })
}

fn row_to_log_entry(row: &Row) -> rusqlite::Result<ExecutionLogEntry> {
    let status_str: String = row.get("status")?;
    let conditions_str: String = row.get("conditions")?;
    let error_code_str: Option<String> = row.get("error_code")?;
    let matched: i64 = row.get("matched_conditions")?;

    let status = RuleStatus::from_str(&status_str).unwrap_or_else(|| {
        warn!(status = %status_str, "Unknown rule status in database, treating as error");
        RuleStatus::Error
    });
    let conditions: Vec<Condition> = serde_json::from_str(&conditions_str).unwrap_or_else(|e| {
        warn!(error = %e, "Unreadable conditions in database, ignoring");
        Vec::new()
    });
    let error_code = error_code_str.as_ref().and_then(|c| {
        ErrorCode::from_str(c).or_else(|| {
            warn!(error_code = %c, "Unknown error code in database, ignoring");
            None
        })
    });

    Ok(ExecutionLogEntry {
        rule_id: row.get("rule_id")?,
        status,
        elapsed_ms: row.get("elapsed_ms")?,
        conditions,
        matched_conditions: matched.max(0) as usize,
        message: row.get("message")?,
        error_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::DecisionEngine;
    use crate::models::{MetricsSnapshot, RuleSetDocument, SlaConfig};

    fn evaluate(metrics: MetricsSnapshot) -> (EvaluationInput, EvaluationResult) {
        let engine = DecisionEngine::new(RuleSetDocument::builtin().unwrap(), SlaConfig::default());
        let input = EvaluationInput::new("org-7", metrics)
            .with_field("north-40")
            .with_plot("p3");
        let result = engine.evaluate(&input);
        (input, result)
    }

    #[test]
    fn record_and_read_back_run() {
        let db = Database::open_in_memory().unwrap();
        let (input, result) = evaluate(
            MetricsSnapshot::new()
                .with("soil_moisture", 10.0)
                .with("ndvi", 0.2)
                .with("air_temp_c", -1.0),
        );
        assert_eq!(result.alerts.len(), 2);

        let run_id = db.record_run(&input, &result).unwrap();

        let runs = db.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 1);
        let run = &runs[0];
        assert_eq!(run.id, run_id);
        assert_eq!(run.organization_id, "org-7");
        assert_eq!(run.location(), "north-40/p3");
        assert_eq!(run.ruleset_version, "1.0.0");
        assert_eq!(run.alert_count, 2);
        assert!(run.errors.is_empty());

        let alerts = db.run_alerts(&run_id).unwrap();
        assert_eq!(alerts, result.alerts);

        let log = db.run_log(&run_id).unwrap();
        assert_eq!(log.len(), result.execution_log.len());
        for (stored, original) in log.iter().zip(&result.execution_log) {
            assert_eq!(stored.rule_id, original.rule_id);
            assert_eq!(stored.status, original.status);
            assert_eq!(stored.matched_conditions, original.matched_conditions);
            assert_eq!(stored.conditions, original.conditions);
        }
    }

    #[test]
    fn error_codes_persist() {
        let db = Database::open_in_memory().unwrap();
        let input = EvaluationInput::new("org-1", MetricsSnapshot::new().with("ndvi", 0.4));
        let result = EvaluationResult::aborted(
            "1.0.0",
            vec![ErrorCode::SlaRuleLimitExceeded],
            0.05,
            SlaConfig::default(),
        );

        db.record_run(&input, &result).unwrap();

        let runs = db.recent_runs(5).unwrap();
        assert_eq!(runs[0].errors, vec![ErrorCode::SlaRuleLimitExceeded]);
        assert_eq!(runs[0].alert_count, 0);
        assert_eq!(runs[0].location(), "-");
    }

    #[test]
    fn recent_runs_respects_limit_and_order() {
        let db = Database::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let (input, result) = evaluate(MetricsSnapshot::new().with("pest_index", 0.9));
            ids.push(db.record_run(&input, &result).unwrap());
        }

        let runs = db.recent_runs(2).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, ids[2]);
        assert_eq!(runs[1].id, ids[1]);
    }

    #[test]
    fn log_keeps_codes_and_messages() {
        let db = Database::open_in_memory().unwrap();
        let input = EvaluationInput::new("org-2", MetricsSnapshot::new().with("ndvi", 0.4));
        let mut result = EvaluationResult::aborted(
            "1.0.0",
            vec![ErrorCode::SlaTotalEvaluationExceeded],
            30.0,
            SlaConfig::default(),
        );
        result.execution_log = vec![
            ExecutionLogEntry::new("frost_risk", RuleStatus::Passed, 0.4)
                .with_message("0/1 conditions matched"),
            ExecutionLogEntry::new("water_stress", RuleStatus::Skipped, 0.0)
                .with_message("Not evaluated (0 ms)")
                .with_error(ErrorCode::SlaTotalEvaluationExceeded),
        ];

        let run_id = db.record_run(&input, &result).unwrap();
        let log = db.run_log(&run_id).unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log[0].status, RuleStatus::Passed);
        assert_eq!(log[0].error_code, None);
        assert_eq!(log[1].rule_id, "water_stress");
        assert_eq!(log[1].status, RuleStatus::Skipped);
        assert_eq!(log[1].error_code, Some(ErrorCode::SlaTotalEvaluationExceeded));
        assert_eq!(log[1].message.as_deref(), Some("Not evaluated (0 ms)"));
    }

    #[test]
    fn unknown_run_has_no_alerts() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.run_alerts("missing").unwrap().is_empty());
        assert!(db.run_log("missing").unwrap().is_empty());
    }
}
