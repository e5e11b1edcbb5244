use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Named field readings supplied for one evaluation.
///
/// Values are kept as raw JSON so a reading that arrived as a string or null
/// can still be carried around; only numbers ever satisfy a condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsSnapshot(HashMap<String, serde_json::Value>);

impl MetricsSnapshot {
    /// Numeric value of a metric; `None` when absent or not a number.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(serde_json::Value::as_f64)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
impl MetricsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), serde_json::Value::from(value));
    }

    pub fn insert_raw(&mut self, name: &str, value: serde_json::Value) {
        self.0.insert(name.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationInput {
    /// Correlation only; never interpreted.
    pub organization_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_id: Option<String>,
    #[serde(default)]
    pub metrics: MetricsSnapshot,
}

#[cfg(test)]
impl EvaluationInput {
    pub fn new(organization_id: impl Into<String>, metrics: MetricsSnapshot) -> Self {
        Self {
            organization_id: organization_id.into(),
            campaign_id: None,
            field_id: None,
            plot_id: None,
            metrics,
        }
    }

    pub fn with_field(mut self, field_id: impl Into<String>) -> Self {
        self.field_id = Some(field_id.into());
        self
    }

    pub fn with_plot(mut self, plot_id: impl Into<String>) -> Self {
        self.plot_id = Some(plot_id.into());
        self
    }
}
