//! Settings for trackgraph.
//!
//! Controls weight-sharing, constraint strictness and solver
//! parameters. Settings are immutable after load and shared by
//! reference into every constraint-building call.
//!
//! # Examples
//!
//! Load settings from a TOML string:
//!
//! ```
//! use trackgraph_config::Settings;
//!
//! let settings = Settings::from_toml_str(r#"
//!     states_share_weights = true
//!     optimizer_ep_gap = 0.05
//! "#).unwrap();
//!
//! assert!(settings.states_share_weights);
//! assert_eq!(settings.optimizer_ep_gap, 0.05);
//! // unspecified fields keep their defaults
//! assert!(settings.allow_partial_merger_appearance);
//! ```
//!
//! Use defaults when no file is given:
//!
//! ```
//! use trackgraph_config::Settings;
//!
//! let settings = Settings::load("settings.toml").unwrap_or_default();
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Model and solver settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Settings {
    /// Multiply the features of each state by the same weight, instead
    /// of giving every (state, feature) pair its own weight.
    pub states_share_weights: bool,

    /// Allow a merger node to gain objects via appearance while it also
    /// has active incoming transitions.
    pub allow_partial_merger_appearance: bool,

    /// Force at least two active outgoing transitions wherever a
    /// division is active.
    pub require_separate_children_of_division: bool,

    /// Acceptable relative gap to the proven optimum.
    pub optimizer_ep_gap: f64,

    pub optimizer_verbose: bool,

    /// 0 means "use all CPU cores".
    pub optimizer_num_threads: usize,

    /// Constrain learned weights to be non-negative.
    pub non_negative_weights_only: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            states_share_weights: false,
            allow_partial_merger_appearance: true,
            require_separate_children_of_division: false,
            optimizer_ep_gap: 0.01,
            optimizer_verbose: true,
            optimizer_num_threads: 1,
            non_negative_weights_only: false,
        }
    }
}

impl Settings {
    /// Creates default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads settings from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses settings from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads settings from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses settings from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Enables or disables weight sharing across states.
    pub fn with_states_share_weights(mut self, value: bool) -> Self {
        self.states_share_weights = value;
        self
    }

    /// Enables or disables partial merger appearance.
    pub fn with_allow_partial_merger_appearance(mut self, value: bool) -> Self {
        self.allow_partial_merger_appearance = value;
        self
    }

    /// Enables or disables the separate-children division constraint.
    pub fn with_require_separate_children_of_division(mut self, value: bool) -> Self {
        self.require_separate_children_of_division = value;
        self
    }

    /// Sets the optimizer epsilon gap.
    pub fn with_optimizer_ep_gap(mut self, value: f64) -> Self {
        self.optimizer_ep_gap = value;
        self
    }

    /// Sets optimizer verbosity.
    pub fn with_optimizer_verbose(mut self, value: bool) -> Self {
        self.optimizer_verbose = value;
        self
    }

    /// Sets the optimizer thread count.
    pub fn with_optimizer_num_threads(mut self, value: usize) -> Self {
        self.optimizer_num_threads = value;
        self
    }

    /// Constrains learned weights to be non-negative.
    pub fn with_non_negative_weights_only(mut self, value: bool) -> Self {
        self.non_negative_weights_only = value;
        self
    }

    /// Logs the effective settings.
    pub fn log_summary(&self) {
        tracing::info!(
            states_share_weights = self.states_share_weights,
            allow_partial_merger_appearance = self.allow_partial_merger_appearance,
            require_separate_children_of_division = self.require_separate_children_of_division,
            non_negative_weights_only = self.non_negative_weights_only,
            optimizer_ep_gap = self.optimizer_ep_gap,
            optimizer_verbose = self.optimizer_verbose,
            optimizer_num_threads = self.optimizer_num_threads,
            "settings"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let s = Settings::default();
        assert!(!s.states_share_weights);
        assert!(s.allow_partial_merger_appearance);
        assert!(!s.require_separate_children_of_division);
        assert_eq!(s.optimizer_ep_gap, 0.01);
        assert!(s.optimizer_verbose);
        assert_eq!(s.optimizer_num_threads, 1);
        assert!(!s.non_negative_weights_only);
    }

    #[test]
    fn toml_overrides_selected_fields() {
        let s = Settings::from_toml_str(
            r#"
            require_separate_children_of_division = true
            optimizer_num_threads = 4
            "#,
        )
        .unwrap();
        assert!(s.require_separate_children_of_division);
        assert_eq!(s.optimizer_num_threads, 4);
        assert!(s.allow_partial_merger_appearance);
    }

    #[test]
    fn yaml_round_trip() {
        let s = Settings::default().with_states_share_weights(true);
        let text = serde_yaml::to_string(&s).unwrap();
        let back = Settings::from_yaml_str(&text).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn builders_chain() {
        let s = Settings::new()
            .with_optimizer_ep_gap(0.0)
            .with_optimizer_verbose(false)
            .with_non_negative_weights_only(true);
        assert_eq!(s.optimizer_ep_gap, 0.0);
        assert!(!s.optimizer_verbose);
        assert!(s.non_negative_weights_only);
    }
}
