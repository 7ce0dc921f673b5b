use std::env;

use serde::Deserialize;

use crate::error::Error;

/// Environment variable holding comma-separated admin operation signatures.
pub const ENV_SIGNATURES: &str = "ADMIN_AUDIT_SIGNATURES";
/// Environment variable overriding the request time format.
pub const ENV_TIMESTAMP_FORMAT: &str = "ADMIN_AUDIT_TIMESTAMP_FORMAT";
/// Environment variable overriding the label used for missing values.
pub const ENV_NONE_LABEL: &str = "ADMIN_AUDIT_NONE_LABEL";

const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DEFAULT_NONE_LABEL: &str = "none";

/// Audit configuration.
///
/// Every field has a default, so an empty JSON object is a valid config.
///
/// # Examples
///
/// ```
/// use admin_audit::AuditConfig;
///
/// let config = AuditConfig::from_json(r#"{
///     "admin_signatures": ["CommentAdminController.delete_comment"]
/// }"#).unwrap();
///
/// assert_eq!(config.none_label, "none");
/// assert_eq!(config.admin_signatures.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// `chrono` format string for the request time
    pub timestamp_format: String,
    /// Text logged for a missing caller or payload
    pub none_label: String,
    /// Operation signatures treated as admin operations
    pub admin_signatures: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            none_label: DEFAULT_NONE_LABEL.to_string(),
            admin_signatures: Vec::new(),
        }
    }
}

impl AuditConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed JSON or unknown fields.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds a configuration from `ADMIN_AUDIT_*` environment variables,
    /// using defaults for anything unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let admin_signatures = lookup(ENV_SIGNATURES)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            timestamp_format: lookup(ENV_TIMESTAMP_FORMAT).unwrap_or(defaults.timestamp_format),
            none_label: lookup(ENV_NONE_LABEL).unwrap_or(defaults.none_label),
            admin_signatures,
        }
    }
}
