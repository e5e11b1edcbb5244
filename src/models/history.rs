use super::evaluation::ErrorCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded evaluation, as listed by `agro-dss history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: String,
    pub organization_id: String,
    pub campaign_id: Option<String>,
    pub field_id: Option<String>,
    pub plot_id: Option<String>,
    pub ruleset_version: String,
    pub total_evaluation_ms: f64,
    pub errors: Vec<ErrorCode>,
    pub alert_count: usize,
    pub created_at: DateTime<Utc>,
}

impl RunSummary {
    /// Short location label: field/plot when known.
    pub fn location(&self) -> String {
        match (&self.field_id, &self.plot_id) {
            (Some(field), Some(plot)) => format!("{}/{}", field, plot),
            (Some(field), None) => field.clone(),
            (None, Some(plot)) => format!("-/{}", plot),
            (None, None) => "-".to_string(),
        }
    }
}
