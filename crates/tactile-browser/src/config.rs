//! Timeouts and input pacing for an input session.
//!
//! [`InputConfig`] is plain TOML so it can live alongside other tool
//! configuration. Every field has an explicit, finite default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BrowserError;

fn default_command_timeout_ms() -> u64 {
    30_000
}

fn default_interaction_timeout_ms() -> u64 {
    30_000
}

fn default_stability_timeout_ms() -> u64 {
    5_000
}

fn default_attach_retries() -> u32 {
    2
}

fn default_mouse_move_steps() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Upper bound on a single CDP command round trip.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// Upper bound on a whole interaction (resolve, wait, dispatch).
    #[serde(default = "default_interaction_timeout_ms")]
    pub interaction_timeout_ms: u64,
    /// Upper bound on one stability wait; further capped by the time left
    /// in the interaction.
    #[serde(default = "default_stability_timeout_ms")]
    pub stability_timeout_ms: u64,
    /// Extra attempts when the element is not rendered and the caller asked
    /// to wait for it to attach.
    #[serde(default = "default_attach_retries")]
    pub attach_retries: u32,
    /// Pause between key down and key up.
    #[serde(default)]
    pub key_delay_ms: u64,
    /// Pause between mouse press and release.
    #[serde(default)]
    pub click_delay_ms: u64,
    #[serde(default = "default_mouse_move_steps")]
    pub mouse_move_steps: u32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout_ms(),
            interaction_timeout_ms: default_interaction_timeout_ms(),
            stability_timeout_ms: default_stability_timeout_ms(),
            attach_retries: default_attach_retries(),
            key_delay_ms: 0,
            click_delay_ms: 0,
            mouse_move_steps: default_mouse_move_steps(),
        }
    }
}

impl InputConfig {
    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, BrowserError> {
        let config: Self =
            toml::from_str(content).map_err(|e| BrowserError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, BrowserError> {
        toml::to_string_pretty(self).map_err(|e| BrowserError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), BrowserError> {
        if self.command_timeout_ms == 0 {
            return Err(BrowserError::Config(
                "command_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.interaction_timeout_ms == 0 {
            return Err(BrowserError::Config(
                "interaction_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.mouse_move_steps == 0 {
            return Err(BrowserError::Config(
                "mouse_move_steps must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn interaction_timeout(&self) -> Duration {
        Duration::from_millis(self.interaction_timeout_ms)
    }

    pub fn stability_timeout(&self) -> Duration {
        Duration::from_millis(self.stability_timeout_ms)
    }

    pub fn key_delay(&self) -> Duration {
        Duration::from_millis(self.key_delay_ms)
    }

    pub fn click_delay(&self) -> Duration {
        Duration::from_millis(self.click_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = InputConfig::from_toml("").unwrap();
        assert_eq!(config, InputConfig::default());
        assert_eq!(config.interaction_timeout(), Duration::from_secs(30));
        assert_eq!(config.stability_timeout(), Duration::from_secs(5));
        assert_eq!(config.attach_retries, 2);
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = InputConfig::from_toml(
            r#"
            stability_timeout_ms = 250
            key_delay_ms = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.stability_timeout(), Duration::from_millis(250));
        assert_eq!(config.key_delay(), Duration::from_millis(20));
        assert_eq!(config.command_timeout_ms, 30_000);
    }

    #[test]
    fn roundtrip_through_toml() {
        let config = InputConfig {
            attach_retries: 5,
            mouse_move_steps: 8,
            ..InputConfig::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(InputConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let err = InputConfig::from_toml("interaction_timeout_ms = 0").unwrap_err();
        assert!(matches!(err, BrowserError::Config(_)));
        assert!(InputConfig::from_toml("command_timeout_ms = 0").is_err());
        assert!(InputConfig::from_toml("mouse_move_steps = 0").is_err());
    }

    #[test]
    fn bad_types_are_config_errors() {
        let err = InputConfig::from_toml("attach_retries = \"many\"").unwrap_err();
        assert!(err.to_string().starts_with("configuration error"));
    }
}
