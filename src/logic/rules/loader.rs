use crate::models::{ErrorCode, MalformedRule, Rule, RuleEntry, RuleSet, RuleSetDocument};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

/// Structural problems with a ruleset document, as human-readable strings.
///
/// Only the envelope is checked: a non-blank version and a `rules` list.
/// Rule bodies are left for [`load`] to lift one by one.
pub fn structural_problems(doc: &RuleSetDocument) -> Vec<String> {
    let mut problems = Vec::new();

    if doc.version().is_none() {
        problems.push("version is missing or empty".to_string());
    }

    if !doc.rules.is_array() {
        problems.push(format!(
            "rules must be a list, found {}",
            json_kind(&doc.rules)
        ));
    }

    problems
}

pub fn validate_document(doc: &RuleSetDocument) -> Vec<ErrorCode> {
    let problems = structural_problems(doc);
    if problems.is_empty() {
        return Vec::new();
    }

    for problem in &problems {
        warn!(problem = %problem, "Ruleset document rejected");
    }
    vec![ErrorCode::RulesetInvalid]
}

/// Validate the document and lift its rules into the typed model.
pub fn load(doc: &RuleSetDocument) -> std::result::Result<RuleSet, Vec<ErrorCode>> {
    let errors = validate_document(doc);
    if !errors.is_empty() {
        return Err(errors);
    }

    let (Some(version), Some(raw_rules)) = (doc.version(), doc.rules.as_array()) else {
        return Err(vec![ErrorCode::RulesetInvalid]);
    };

    let entries: Vec<RuleEntry> = raw_rules
        .iter()
        .enumerate()
        .map(|(index, raw)| lift_rule(index, raw))
        .collect();

    let ruleset = RuleSet {
        version: version.to_string(),
        name: doc.name.clone(),
        description: doc.description.clone(),
        entries,
    };

    for id in duplicate_ids(&ruleset) {
        warn!(rule_id = %id, "Duplicate rule id; alert ids may collide");
    }

    Ok(ruleset)
}

fn lift_rule(index: usize, raw: &Value) -> RuleEntry {
    match Rule::deserialize(raw) {
        Ok(rule) => RuleEntry::Valid(rule),
        Err(e) => {
            let id = raw
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("rules[{}]", index));
            let enabled = raw.get("enabled").and_then(Value::as_bool).unwrap_or(true);

            warn!(rule_id = %id, error = %e, "Malformed rule in ruleset");

            RuleEntry::Malformed(MalformedRule {
                id,
                enabled,
                reason: e.to_string(),
            })
        }
    }
}

/// Rule ids that appear more than once, in first-repeat order.
pub fn duplicate_ids(ruleset: &RuleSet) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();

    for entry in &ruleset.entries {
        let id = entry.id();
        if !seen.insert(id) && !duplicates.iter().any(|d| d == id) {
            duplicates.push(id.to_string());
        }
    }

    duplicates
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "nothing",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operator, Severity};
    use serde_json::json;

    fn doc(value: Value) -> RuleSetDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_rule_list_is_valid() {
        let ruleset = load(&doc(json!({ "version": "1.0.0", "rules": [] }))).unwrap();
        assert_eq!(ruleset.version, "1.0.0");
        assert!(ruleset.entries.is_empty());
    }

    #[test]
    fn missing_version_is_invalid() {
        let d = doc(json!({ "rules": [] }));
        assert_eq!(validate_document(&d), vec![ErrorCode::RulesetInvalid]);
        assert_eq!(load(&d), Err(vec![ErrorCode::RulesetInvalid]));
    }

    #[test]
    fn blank_version_is_invalid() {
        let d = doc(json!({ "version": "  ", "rules": [] }));
        assert_eq!(validate_document(&d), vec![ErrorCode::RulesetInvalid]);
    }

    #[test]
    fn non_list_rules_are_invalid() {
        let d = doc(json!({ "version": "1.0.0", "rules": { "id": "x" } }));
        let problems = structural_problems(&d);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("an object"));
        assert_eq!(validate_document(&d), vec![ErrorCode::RulesetInvalid]);
    }

    #[test]
    fn both_problems_reported_once_as_code() {
        let d = RuleSetDocument::default();
        assert_eq!(structural_problems(&d).len(), 2);
        assert_eq!(validate_document(&d), vec![ErrorCode::RulesetInvalid]);
    }

    #[test]
    fn malformed_rule_does_not_reject_document() {
        let ruleset = load(&doc(json!({
            "version": "1.0.0",
            "rules": [
                {
                    "id": "frost",
                    "severity": "critical",
                    "confidence": 0.9,
                    "conditions": [{ "metric": "air_temp_c", "operator": "<=", "threshold": 0 }]
                },
                {
                    "id": "broken",
                    "severity": "critical",
                    "confidence": 0.9,
                    "conditions": [{ "metric": "ndvi", "operator": "~", "threshold": 0.5 }]
                },
                { "severity": "info", "enabled": false }
            ]
        })))
        .unwrap();

        assert_eq!(ruleset.entries.len(), 3);

        match &ruleset.entries[0] {
            RuleEntry::Valid(rule) => {
                assert_eq!(rule.severity, Severity::Critical);
                assert_eq!(rule.conditions[0].operator, Operator::LessEqual);
            }
            other => panic!("expected valid rule, got {:?}", other),
        }

        match &ruleset.entries[1] {
            RuleEntry::Malformed(m) => {
                assert_eq!(m.id, "broken");
                assert!(m.enabled);
                assert!(!m.reason.is_empty());
            }
            other => panic!("expected malformed rule, got {:?}", other),
        }

        match &ruleset.entries[2] {
            RuleEntry::Malformed(m) => {
                assert_eq!(m.id, "rules[2]");
                assert!(!m.enabled);
            }
            other => panic!("expected malformed rule, got {:?}", other),
        }

        assert_eq!(ruleset.enabled_count(), 2);
    }

    #[test]
    fn detects_duplicate_ids() {
        let ruleset = load(&doc(json!({
            "version": "1.0.0",
            "rules": [
                { "id": "a", "severity": "info", "confidence": 0.5, "conditions": [] },
                { "id": "b", "severity": "info", "confidence": 0.5, "conditions": [] },
                { "id": "a", "severity": "info", "confidence": 0.5, "conditions": [] },
                { "id": "a", "severity": "info", "confidence": 0.5, "conditions": [] }
            ]
        })))
        .unwrap();

        assert_eq!(duplicate_ids(&ruleset), vec!["a".to_string()]);
    }

    #[test]
    fn builtin_ruleset_loads_cleanly() {
        let ruleset = load(&RuleSetDocument::builtin().unwrap()).unwrap();
        assert!(ruleset
            .entries
            .iter()
            .all(|e| matches!(e, RuleEntry::Valid(_))));
        assert!(duplicate_ids(&ruleset).is_empty());
        assert!(ruleset.enabled_count() < ruleset.entries.len());
    }
}
