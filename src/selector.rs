//! Selection of admin operations.
//!
//! An operation is audited if either:
//! - its signature appears in the configured signature list, or
//! - it was registered with the admin marker.
//!
//! Both paths lead to the same interceptor.

use crate::config::AuditConfig;
use crate::operation::OperationId;

/// A parsed signature pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Pattern {
    owner: String,
    /// `None` matches every operation of the owner
    name: Option<String>,
}

impl Pattern {
    /// Parses `path::Owner.name`, `Owner.name`, `Owner.*` or `Owner.name(..)`.
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let raw = raw.strip_suffix("(..)").unwrap_or(raw);
        let raw = raw.strip_suffix("()").unwrap_or(raw);

        let (owner, name) = raw.rsplit_once('.')?;
        if owner.is_empty() || name.is_empty() {
            return None;
        }

        Some(Self {
            owner: owner.to_string(),
            name: (name != "*").then(|| name.to_string()),
        })
    }

    fn matches(&self, id: &OperationId) -> bool {
        let owner_matches = self.owner == id.owner()
            || (!id.path().is_empty() && self.owner == format!("{}::{}", id.path(), id.owner()));

        owner_matches && self.name.as_deref().map_or(true, |name| name == id.name())
    }
}

/// Decides which operations are audited.
///
/// # Examples
///
/// ```
/// use admin_audit::{AdminSelector, OperationId};
///
/// let selector = AdminSelector::from_signatures([
///     "app::comment::CommentAdminController.delete_comment(..)",
///     "UserAdminController.*",
/// ]);
///
/// let delete = OperationId::new("app::comment", "CommentAdminController", "delete_comment");
/// let role = OperationId::new("app::user", "UserAdminController", "change_user_role");
/// let list = OperationId::new("app::comment", "CommentController", "list_comments");
///
/// assert!(selector.is_selected(&delete, false));
/// assert!(selector.is_selected(&role, false));
/// assert!(!selector.is_selected(&list, false));
/// assert!(selector.is_selected(&list, true));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AdminSelector {
    patterns: Vec<Pattern>,
}

impl AdminSelector {
    /// Selector with no signatures; only marked operations are audited.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a selector from a list of signatures.
    ///
    /// Malformed entries (no `.` separating owner and name) are skipped with a
    /// warning.
    pub fn from_signatures<I, S>(signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selector = Self::new();
        for signature in signatures {
            selector.add_signature(signature.as_ref());
        }
        selector
    }

    /// Builds a selector from the configured signature list.
    pub fn from_config(config: &AuditConfig) -> Self {
        Self::from_signatures(&config.admin_signatures)
    }

    /// Adds one signature. Returns `false` if it could not be parsed.
    pub fn add_signature(&mut self, signature: &str) -> bool {
        match Pattern::parse(signature) {
            Some(pattern) => {
                self.patterns.push(pattern);
                true
            }
            None => {
                tracing::warn!(
                    target: "admin_audit",
                    signature,
                    "ignoring malformed admin signature"
                );
                false
            }
        }
    }

    /// Returns `true` if `id` matches a configured signature.
    pub fn matches_signature(&self, id: &OperationId) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(id))
    }

    /// Returns `true` if the operation should be audited, either because it
    /// is marked or because its signature is listed.
    pub fn is_selected(&self, id: &OperationId, marked: bool) -> bool {
        marked || self.matches_signature(id)
    }

    /// Number of configured signatures.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns `true` if no signatures are configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELETE: OperationId =
        OperationId::new("app::comment", "CommentAdminController", "delete_comment");

    #[test]
    fn short_signature_matches() {
        let selector = AdminSelector::from_signatures(["CommentAdminController.delete_comment"]);
        assert!(selector.matches_signature(&DELETE));
    }

    #[test]
    fn qualified_signature_must_match_path() {
        let selector =
            AdminSelector::from_signatures(["other::CommentAdminController.delete_comment"]);
        assert!(!selector.matches_signature(&DELETE));
    }

    #[test]
    fn wildcard_matches_all_operations_of_owner() {
        let selector = AdminSelector::from_signatures(["CommentAdminController.*"]);
        assert!(selector.matches_signature(&DELETE));
        assert!(selector.matches_signature(&OperationId::new(
            "",
            "CommentAdminController",
            "restore_comment"
        )));
    }

    #[test]
    fn malformed_signatures_are_skipped() {
        let mut selector = AdminSelector::new();
        assert!(!selector.add_signature("no_separator"));
        assert!(!selector.add_signature(".name"));
        assert!(selector.add_signature("Owner.name()"));
        assert_eq!(selector.len(), 1);
    }

    #[test]
    fn marker_selects_without_signature() {
        let selector = AdminSelector::new();
        assert!(selector.is_empty());
        assert!(selector.is_selected(&DELETE, true));
        assert!(!selector.is_selected(&DELETE, false));
    }

    #[test]
    fn from_config_reads_signature_list() {
        let config = AuditConfig {
            admin_signatures: vec!["CommentAdminController.delete_comment".to_string()],
            ..AuditConfig::default()
        };
        assert!(AdminSelector::from_config(&config).matches_signature(&DELETE));
    }
}
