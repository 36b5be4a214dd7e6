//! Reply behavior options.
//!
//! | Option              | Default | Effect                                                       |
//! |---------------------|---------|--------------------------------------------------------------|
//! | `pushAfterCritical` | `true`  | A critical error finalizes the reply immediately             |
//! | `clearDataIfError`  | `true`  | `data` is emptied when the reply carries a critical error    |
//! | `getHtmlOutput`     | `true`  | Captured stray output is placed under `html` in the envelope |
//!
//! Options can be set programmatically through [`crate::ResponseBuilder::configure`]
//! or loaded with figment, e.g. from `MODKIT_REPLY_*` environment variables.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use figment::Figment;
use figment::providers::Env;
use serde::{Deserialize, Serialize};

use crate::error::ReplyError;

/// Environment variable prefix read by [`ReplyConfig::from_env`].
pub const ENV_PREFIX: &str = "MODKIT_REPLY_";

/// Options recognized by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyOption {
    PushAfterCritical,
    ClearDataIfError,
    GetHtmlOutput,
}

impl ReplyOption {
    pub const ALL: [Self; 3] = [
        Self::PushAfterCritical,
        Self::ClearDataIfError,
        Self::GetHtmlOutput,
    ];

    /// Option key as it appears in configuration maps.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PushAfterCritical => "pushAfterCritical",
            Self::ClearDataIfError => "clearDataIfError",
            Self::GetHtmlOutput => "getHtmlOutput",
        }
    }

    /// Environment key after [`ENV_PREFIX`], lowercased.
    #[must_use]
    pub const fn env_key(self) -> &'static str {
        match self {
            Self::PushAfterCritical => "push_after_critical",
            Self::ClearDataIfError => "clear_data_if_error",
            Self::GetHtmlOutput => "get_html_output",
        }
    }
}

impl fmt::Display for ReplyOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a key does not name a [`ReplyOption`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown reply option `{0}`")]
pub struct UnknownOption(pub String);

impl FromStr for ReplyOption {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|opt| opt.as_str() == s)
            .ok_or_else(|| UnknownOption(s.to_owned()))
    }
}

/// Boolean option map consulted at escalation and finalize time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplyConfig {
    #[serde(alias = "push_after_critical")]
    pub push_after_critical: bool,
    #[serde(alias = "clear_data_if_error")]
    pub clear_data_if_error: bool,
    #[serde(alias = "get_html_output")]
    pub get_html_output: bool,
    /// Keys the builder does not interpret, kept as given.
    #[serde(flatten)]
    pub extra: BTreeMap<String, bool>,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            push_after_critical: true,
            clear_data_if_error: true,
            get_html_output: true,
            extra: BTreeMap::new(),
        }
    }
}

impl ReplyConfig {
    /// Extract a config from any figment; missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns [`ReplyError::Config`] if a value has the wrong type.
    pub fn from_figment(figment: &Figment) -> Result<Self, ReplyError> {
        let config: Self = figment.extract()?;
        tracing::debug!(?config, "reply configuration loaded");
        Ok(config)
    }

    /// Load options from `MODKIT_REPLY_*` environment variables.
    ///
    /// `MODKIT_REPLY_PUSH_AFTER_CRITICAL=false` sets `pushAfterCritical`.
    /// Only the recognized options are read; other prefixed variables are
    /// ignored.
    ///
    /// # Errors
    /// Returns [`ReplyError::Config`] if an option variable cannot be read as
    /// a boolean.
    pub fn from_env() -> Result<Self, ReplyError> {
        let keys = ReplyOption::ALL.map(ReplyOption::env_key);
        Self::from_figment(&Figment::from(Env::prefixed(ENV_PREFIX).only(&keys)))
    }

    /// Typed lookup for a recognized option.
    #[must_use]
    pub fn enabled(&self, option: ReplyOption) -> bool {
        match option {
            ReplyOption::PushAfterCritical => self.push_after_critical,
            ReplyOption::ClearDataIfError => self.clear_data_if_error,
            ReplyOption::GetHtmlOutput => self.get_html_output,
        }
    }

    /// Lookup by key; unknown keys are served from `extra`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<bool> {
        match key.parse::<ReplyOption>() {
            Ok(option) => Some(self.enabled(option)),
            Err(_) => self.extra.get(key).copied(),
        }
    }

    pub fn set(&mut self, key: &str, value: bool) {
        match key.parse::<ReplyOption>() {
            Ok(ReplyOption::PushAfterCritical) => self.push_after_critical = value,
            Ok(ReplyOption::ClearDataIfError) => self.clear_data_if_error = value,
            Ok(ReplyOption::GetHtmlOutput) => self.get_html_output = value,
            Err(UnknownOption(key)) => {
                self.extra.insert(key, value);
            }
        }
    }

    /// Merge a partial option map over the current values.
    pub fn merge<I, K>(&mut self, options: I)
    where
        I: IntoIterator<Item = (K, bool)>,
        K: AsRef<str>,
    {
        for (key, value) in options {
            self.set(key.as_ref(), value);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use figment::providers::Serialized;
    use serde_json::json;

    #[test]
    fn defaults_enable_every_option() {
        let config = ReplyConfig::default();
        for option in ReplyOption::ALL {
            assert!(config.enabled(option), "{option} should default to true");
        }
        assert!(config.extra.is_empty());
    }

    #[test]
    fn option_keys_round_trip_through_from_str() {
        for option in ReplyOption::ALL {
            assert_eq!(option.as_str().parse::<ReplyOption>(), Ok(option));
        }
        assert_eq!(
            "verbose".parse::<ReplyOption>(),
            Err(UnknownOption("verbose".to_owned()))
        );
    }

    #[test]
    fn merge_overrides_known_and_keeps_unknown() {
        let mut config = ReplyConfig::default();
        config.merge([("clearDataIfError", false), ("traceIds", true)]);

        assert_eq!(config.get("clearDataIfError"), Some(false));
        assert_eq!(config.get("pushAfterCritical"), Some(true));
        assert_eq!(config.get("traceIds"), Some(true));
        assert_eq!(config.get("missing"), None);
    }

    #[test]
    fn from_figment_reads_camel_case_and_extra_keys() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "getHtmlOutput": false,
            "auditTrail": true,
        })));
        let config = ReplyConfig::from_figment(&figment).unwrap();

        assert!(!config.get_html_output);
        assert!(config.push_after_critical);
        assert_eq!(config.extra.get("auditTrail"), Some(&true));
    }

    #[test]
    fn from_figment_rejects_non_boolean_values() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "pushAfterCritical": "sometimes",
        })));
        let err = ReplyConfig::from_figment(&figment).unwrap_err();
        assert!(matches!(err, ReplyError::Config(_)));
    }

    #[test]
    fn from_env_ignores_unrelated_prefixed_variables() {
        temp_env::with_vars(
            [
                ("MODKIT_REPLY_LOG_LEVEL", Some("debug")),
                ("MODKIT_REPLY_GET_HTML_OUTPUT", Some("false")),
            ],
            || {
                let config = ReplyConfig::from_env().unwrap();
                assert!(!config.get_html_output);
                assert!(config.push_after_critical);
                assert!(config.extra.is_empty());
            },
        );
    }

    #[test]
    fn from_env_rejects_non_boolean_option_values() {
        temp_env::with_var("MODKIT_REPLY_PUSH_AFTER_CRITICAL", Some("sometimes"), || {
            let err = ReplyConfig::from_env().unwrap_err();
            assert!(matches!(err, ReplyError::Config(_)));
        });
    }

    #[test]
    fn from_env_maps_snake_case_variables() {
        temp_env::with_vars(
            [
                ("MODKIT_REPLY_PUSH_AFTER_CRITICAL", Some("false")),
                ("MODKIT_REPLY_CLEAR_DATA_IF_ERROR", Some("false")),
            ],
            || {
                let config = ReplyConfig::from_env().unwrap();
                assert!(!config.push_after_critical);
                assert!(!config.clear_data_if_error);
                assert!(config.get_html_output);
            },
        );
    }
}
