//! Analyzer configuration
//!
//! Loaded from the `[sema]` table of a TOML file, or built in code.

use miette::Report;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub type ConfigError = Report;

fn config_msg(message: impl Into<String>) -> ConfigError {
    Report::msg(message.into())
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SemaConfig {
    /// Search argument types for same-named callables
    #[serde(default = "default_true")]
    pub adl: bool,

    /// Compute erased instances shared by reference-type instantiations
    #[serde(default = "default_true")]
    pub share_less_specialized: bool,

    /// Emit an event for every instantiation and cache hit
    #[serde(default)]
    pub trace_instantiation: bool,

    /// Qualified names of definitions whose analysis is traced
    #[serde(default)]
    pub traced_defns: Vec<String>,

    /// Root class that reference-type arguments erase to
    #[serde(default = "default_root_object")]
    pub root_object: String,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    sema: Option<SemaConfig>,
}

fn default_true() -> bool {
    true
}

fn default_root_object() -> String {
    "Object".to_string()
}

impl Default for SemaConfig {
    fn default() -> Self {
        SemaConfig {
            adl: true,
            share_less_specialized: true,
            trace_instantiation: false,
            traced_defns: Vec::new(),
            root_object: default_root_object(),
        }
    }
}

impl SemaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document. A missing `[sema]` table yields the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| config_msg(format!("Failed to parse config: {}", e)))?;
        let config = file.sema.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| config_msg(format!("Failed to read config: {}", e)))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        #[derive(Serialize)]
        struct Out<'a> {
            sema: &'a SemaConfig,
        }
        toml::to_string_pretty(&Out { sema: self })
            .map_err(|e| config_msg(format!("Failed to serialize config: {}", e)))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.root_object.trim().is_empty() {
            return Err(config_msg("root_object must name a class"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_table_uses_defaults() {
        let config = SemaConfig::from_toml_str("").expect("config");
        assert_eq!(config, SemaConfig::default());
        assert!(config.adl);
    }

    #[test]
    fn overrides_are_applied() {
        let config = SemaConfig::from_toml_str(
            r#"
[sema]
adl = false
trace_instantiation = true
traced_defns = ["app.Box"]
"#,
        )
        .expect("config");
        assert!(!config.adl);
        assert!(config.trace_instantiation);
        assert_eq!(config.traced_defns, vec!["app.Box".to_string()]);
        assert_eq!(config.root_object, "Object");
    }

    #[test]
    fn empty_root_object_is_rejected() {
        let err = SemaConfig::from_toml_str("[sema]\nroot_object = \"\"\n").unwrap_err();
        assert!(err.to_string().contains("root_object"));
    }

    #[test]
    fn serialized_config_parses_back() {
        let mut config = SemaConfig::default();
        config.share_less_specialized = false;
        let text = config.to_toml_string().expect("serialize");
        assert_eq!(SemaConfig::from_toml_str(&text).expect("parse"), config);
    }
}
