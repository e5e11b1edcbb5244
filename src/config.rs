use crate::error::{AgroDssError, Result};
use crate::models::{RuleSetDocument, SlaConfig};
use dialoguer::{Confirm, Input};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub sla: SlaSettings,
    #[serde(default)]
    pub ruleset: RulesetConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Evaluation budgets as written in config.yaml. Unset keys keep their
/// defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SlaSettings {
    pub max_rules: usize,
    pub max_total_evaluation_ms: u64,
    pub max_rule_evaluation_ms: u64,
}

impl Default for SlaSettings {
    fn default() -> Self {
        SlaConfig::default().into()
    }
}

impl From<SlaConfig> for SlaSettings {
    fn from(sla: SlaConfig) -> Self {
        Self {
            max_rules: sla.max_rules,
            max_total_evaluation_ms: sla.max_total_evaluation_ms,
            max_rule_evaluation_ms: sla.max_rule_evaluation_ms,
        }
    }
}

impl From<SlaSettings> for SlaConfig {
    fn from(settings: SlaSettings) -> Self {
        Self {
            max_rules: settings.max_rules,
            max_total_evaluation_ms: settings.max_total_evaluation_ms,
            max_rule_evaluation_ms: settings.max_rule_evaluation_ms,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RulesetConfig {
    /// Ruleset document to evaluate; the bundled ruleset when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_enabled() -> bool {
    true
}

impl Config {
    /// Load configuration. An explicit path must exist; otherwise the
    /// standard locations are searched and defaults apply when none is found.
    pub fn load(config_override: Option<&PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => {
                if !p.exists() {
                    return Err(AgroDssError::Config(format!(
                        "Config file not found at {:?}",
                        p
                    )));
                }
                p.clone()
            }
            None => match Self::find_config_path() {
                Some(p) => p,
                None => {
                    tracing::debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        tracing::debug!(path = ?config_path, "Loading config");

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| AgroDssError::Config(format!("Failed to read config: {}", e)))?;

        Self::parse(&config_str)
    }

    /// Parse YAML config text, substituting `${VAR}` placeholders first.
    pub fn parse(content: &str) -> Result<Self> {
        let content = Self::substitute_env_vars(content)?;

        serde_yaml::from_str(&content)
            .map_err(|e| AgroDssError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Search for config.yaml in standard locations.
    fn find_config_path() -> Option<PathBuf> {
        let local_config = PathBuf::from("config/config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir()
            .map(|dir| dir.join("agro-dss").join("config.yaml"))
            .filter(|p| p.exists())
    }

    /// Default path for writing new config files (~/.config/agro-dss/config.yaml).
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AgroDssError::Config("Cannot determine config directory".into()))?
            .join("agro-dss");
        Ok(config_dir.join("config.yaml"))
    }

    /// Ruleset to evaluate: command-line path, then configured path, then
    /// the bundled default.
    pub fn ruleset_document(&self, ruleset_override: Option<&Path>) -> Result<RuleSetDocument> {
        match ruleset_override.or(self.ruleset.path.as_deref()) {
            Some(path) => RuleSetDocument::from_path(path),
            None => RuleSetDocument::builtin(),
        }
    }

    /// Run interactive setup prompts and write config to disk.
    pub fn setup_interactive() -> Result<(Self, PathBuf)> {
        println!();
        println!("Agronomic decision support setup");
        println!();

        println!("Ruleset (leave blank to use the bundled ruleset)");
        let ruleset_path: String = Input::new()
            .with_prompt("  Ruleset file")
            .default(String::new())
            .allow_empty(true)
            .interact_text()
            .map_err(|e| AgroDssError::Config(format!("Input error: {}", e)))?;

        println!();
        println!("Evaluation budgets");
        let defaults = SlaSettings::default();

        let max_rules: usize = Input::new()
            .with_prompt("  Max enabled rules")
            .default(defaults.max_rules)
            .interact_text()
            .map_err(|e| AgroDssError::Config(format!("Input error: {}", e)))?;

        let max_total_evaluation_ms: u64 = Input::new()
            .with_prompt("  Max total evaluation (ms)")
            .default(defaults.max_total_evaluation_ms)
            .interact_text()
            .map_err(|e| AgroDssError::Config(format!("Input error: {}", e)))?;

        let max_rule_evaluation_ms: u64 = Input::new()
            .with_prompt("  Max per-rule evaluation (ms)")
            .default(defaults.max_rule_evaluation_ms)
            .interact_text()
            .map_err(|e| AgroDssError::Config(format!("Input error: {}", e)))?;

        println!();
        let history_enabled = Confirm::new()
            .with_prompt("Record evaluation history locally?")
            .default(true)
            .interact()
            .map_err(|e| AgroDssError::Config(format!("Input error: {}", e)))?;

        println!();

        let config = Config {
            sla: SlaSettings {
                max_rules,
                max_total_evaluation_ms,
                max_rule_evaluation_ms,
            },
            ruleset: RulesetConfig {
                path: (!ruleset_path.trim().is_empty()).then(|| PathBuf::from(ruleset_path.trim())),
            },
            history: HistoryConfig {
                enabled: history_enabled,
            },
        };

        let config_path = Self::default_config_path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| AgroDssError::Config(format!("Failed to serialize config: {}", e)))?;

        let content = format!(
            "# agro-dss configuration\n# Generated by `agro-dss init`\n# Environment variable substitution (${{VAR}}) is supported.\n\n{}",
            yaml
        );
        std::fs::write(&config_path, content)?;

        println!("Configuration saved to {}", config_path.display());
        println!();

        Ok((config, config_path))
    }

    fn substitute_env_vars(content: &str) -> Result<String> {
        let mut result = content.to_string();

        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| AgroDssError::Config(format!("Invalid placeholder pattern: {}", e)))?;

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        Ok(result)
    }

    pub fn data_dir(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        if let Some(dir) = data_dir_override {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        if let Ok(dir) = std::env::var("AGRO_DSS_DATA_DIR") {
            let p = PathBuf::from(dir);
            std::fs::create_dir_all(&p)?;
            return Ok(p);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| AgroDssError::Config("Cannot determine data directory".into()))?
            .join("agro-dss");

        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn db_path(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        Ok(Self::data_dir(data_dir_override)?.join("history.db"))
    }
}
