use crate::error::{AgroDssError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const BUILTIN_RULESET: &str = include_str!("../../rulesets/default.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Severity::Info),
            "warning" | "warn" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Comparison operator of a condition. Serialized in its symbolic form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">", alias = "gt")]
    GreaterThan,
    #[serde(rename = ">=", alias = "gte")]
    GreaterEqual,
    #[serde(rename = "<", alias = "lt")]
    LessThan,
    #[serde(rename = "<=", alias = "lte")]
    LessEqual,
    #[serde(rename = "==", alias = "eq")]
    Equal,
    #[serde(rename = "!=", alias = "ne")]
    NotEqual,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::GreaterThan => ">",
            Operator::GreaterEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessEqual => "<=",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
        }
    }

    /// Equality is exact IEEE-754 comparison, without tolerance.
    #[allow(clippy::float_cmp)]
    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::GreaterThan => value > threshold,
            Operator::GreaterEqual => value >= threshold,
            Operator::LessThan => value < threshold,
            Operator::LessEqual => value <= threshold,
            Operator::Equal => value == threshold,
            Operator::NotEqual => value != threshold,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub metric: String,
    pub operator: Operator,
    #[serde(alias = "value")]
    pub threshold: f64,
}

#[cfg(test)]
impl Condition {
    pub fn new(metric: impl Into<String>, operator: Operator, threshold: f64) -> Self {
        Self {
            metric: metric.into(),
            operator,
            threshold,
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.metric, self.operator, self.threshold)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    /// Author-supplied, surfaced as-is on alerts.
    pub confidence: f64,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub explanation: String,
    pub conditions: Vec<Condition>,
    #[serde(default = "default_true")]
    pub all_conditions_required: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[cfg(test)]
impl Rule {
    pub fn new(id: impl Into<String>, severity: Severity, confidence: f64) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            severity,
            confidence,
            recommendation: String::new(),
            explanation: String::new(),
            conditions: Vec::new(),
            all_conditions_required: true,
            enabled: true,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn with_condition(mut self, metric: &str, operator: Operator, threshold: f64) -> Self {
        self.conditions.push(Condition::new(metric, operator, threshold));
        self
    }

    pub fn any_condition(mut self) -> Self {
        self.all_conditions_required = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A rule whose document could not be lifted into a [`Rule`].
///
/// Kept in the ruleset so the failure is reported against that rule during
/// the pass instead of rejecting the whole document.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedRule {
    pub id: String,
    pub enabled: bool,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleEntry {
    Valid(Rule),
    Malformed(MalformedRule),
}

impl RuleEntry {
    pub fn id(&self) -> &str {
        match self {
            RuleEntry::Valid(rule) => &rule.id,
            RuleEntry::Malformed(malformed) => &malformed.id,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            RuleEntry::Valid(rule) => rule.enabled,
            RuleEntry::Malformed(malformed) => malformed.enabled,
        }
    }
}

/// The ruleset as it arrives from storage: only the envelope is typed,
/// the rules stay raw until the loader has checked the shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetDocument {
    #[serde(default)]
    pub version: serde_json::Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: serde_json::Value,
}

#[cfg(test)]
impl RuleSetDocument {
    pub fn new(version: &str, rules: Vec<Rule>) -> Self {
        Self {
            version: serde_json::Value::String(version.to_string()),
            name: None,
            description: None,
            rules: serde_json::to_value(rules).unwrap_or_default(),
        }
    }
}

impl RuleSetDocument {
    /// Version string, if present and non-blank.
    pub fn version(&self) -> Option<&str> {
        self.version
            .as_str()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// The ruleset bundled with the binary.
    pub fn builtin() -> Result<Self> {
        serde_json::from_str(BUILTIN_RULESET).map_err(Into::into)
    }

    /// Read a ruleset document; `.json` files are parsed as JSON, anything
    /// else as YAML.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AgroDssError::NotFound(format!(
                "Ruleset file not found at {:?}",
                path
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(serde_yaml::from_str(&content)?)
        }
    }
}

/// A validated ruleset, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub version: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub entries: Vec<RuleEntry>,
}

impl RuleSet {
    pub fn enabled(&self) -> impl Iterator<Item = &RuleEntry> {
        self.entries.iter().filter(|e| e.is_enabled())
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operator_symbols_and_aliases() {
        let op: Operator = serde_json::from_value(json!(">=")).unwrap();
        assert_eq!(op, Operator::GreaterEqual);
        let op: Operator = serde_json::from_value(json!("lt")).unwrap();
        assert_eq!(op, Operator::LessThan);
        assert!(serde_json::from_value::<Operator>(json!("~=")).is_err());
        assert_eq!(
            serde_json::to_value(Operator::NotEqual).unwrap(),
            json!("!=")
        );
    }

    #[test]
    fn operator_compare() {
        assert!(Operator::GreaterThan.compare(10.0, 5.0));
        assert!(!Operator::GreaterThan.compare(5.0, 5.0));
        assert!(Operator::GreaterEqual.compare(5.0, 5.0));
        assert!(Operator::LessThan.compare(1.0, 5.0));
        assert!(Operator::LessEqual.compare(5.0, 5.0));
        assert!(Operator::Equal.compare(0.5, 0.5));
        assert!(Operator::NotEqual.compare(0.5, 0.51));
    }

    #[test]
    fn equality_is_exact() {
        // 0.1 + 0.2 is not 0.3 in binary floating point
        assert!(!Operator::Equal.compare(0.1 + 0.2, 0.3));
        assert!(Operator::NotEqual.compare(0.1 + 0.2, 0.3));
    }

    #[test]
    fn rule_defaults_when_flags_absent() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "drought",
            "severity": "warning",
            "confidence": 0.8,
            "conditions": [{ "metric": "soil_moisture", "operator": "<", "threshold": 20 }]
        }))
        .unwrap();

        assert!(rule.all_conditions_required);
        assert!(rule.enabled);
        assert_eq!(rule.conditions[0].threshold, 20.0);
        assert!(rule.title.is_empty());
    }

    #[test]
    fn condition_accepts_value_alias() {
        let condition: Condition = serde_json::from_value(json!({
            "metric": "ndvi", "operator": "lte", "value": 0.5
        }))
        .unwrap();
        assert_eq!(condition, Condition::new("ndvi", Operator::LessEqual, 0.5));
        assert_eq!(condition.to_string(), "ndvi <= 0.5");
    }

    #[test]
    fn severity_from_str() {
        assert_eq!(Severity::from_str("Critical"), Some(Severity::Critical));
        assert_eq!(Severity::from_str("warn"), Some(Severity::Warning));
        assert_eq!(Severity::from_str("severe"), None);
    }

    #[test]
    fn document_version_must_be_non_blank_string() {
        let mut doc = RuleSetDocument::new("1.2.0", Vec::new());
        assert_eq!(doc.version(), Some("1.2.0"));

        doc.version = json!("   ");
        assert_eq!(doc.version(), None);

        doc.version = json!(3);
        assert_eq!(doc.version(), None);
    }

    #[test]
    fn builtin_ruleset_parses() {
        let doc = RuleSetDocument::builtin().unwrap();
        assert!(doc.version().is_some());
        assert!(doc.rules.as_array().is_some_and(|r| !r.is_empty()));
    }

    #[test]
    fn document_from_yaml() {
        let yaml = r#"
version: "2.0.0"
name: Field scouting
rules:
  - id: frost
    severity: critical
    confidence: 0.9
    conditions:
      - metric: air_temp_c
        operator: "<="
        threshold: 0
"#;
        let doc: RuleSetDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(doc.version(), Some("2.0.0"));
        assert_eq!(doc.name.as_deref(), Some("Field scouting"));
        assert_eq!(doc.rules.as_array().map(Vec::len), Some(1));
    }
}
