//! # Application-wide Defaults
//!
//! The rules and reactions used when a request does not bring its own. Create
//! one [`FlightDefaults`] at startup, customise each hook at most once, then
//! share it read-only. A second customisation of the same hook is ignored so
//! that late code cannot silently replace the policy chosen at bootstrap.

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::classify::{ClassificationRules, Rule};

use super::spec::ErrorEvent;

/// Reaction to a permission-denied payload when the request has no handler.
pub type PermissionAction = Arc<dyn Fn(&Value) + Send + Sync>;
/// Reaction to a failure when the request has no handler.
pub type ErrorAction = Arc<dyn Fn(&ErrorEvent) + Send + Sync>;

/// One-shot configurable defaults shared by every channel of a controller.
pub struct FlightDefaults {
    login_page: String,
    success_rule: OnceLock<Rule>,
    permission_rule: OnceLock<Rule>,
    no_permission_action: OnceLock<PermissionAction>,
    error_action: OnceLock<ErrorAction>,
}

impl Default for FlightDefaults {
    fn default() -> Self {
        Self::new("/")
    }
}

impl FlightDefaults {
    /// Defaults whose built-in permission reaction points at `login_page`.
    pub fn new(login_page: impl Into<String>) -> Self {
        Self {
            login_page: login_page.into(),
            success_rule: OnceLock::new(),
            permission_rule: OnceLock::new(),
            no_permission_action: OnceLock::new(),
            error_action: OnceLock::new(),
        }
    }

    /// Where the built-in permission-denied reaction sends the user.
    pub fn login_page(&self) -> &str {
        &self.login_page
    }

    /// Replaces the default success rule. Returns `false` if it was already replaced.
    pub fn set_success_rule<F>(&self, rule: F) -> bool
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let rule: Rule = Arc::new(rule);
        one_shot(&self.success_rule, rule, "success rule")
    }

    /// Replaces the default permission rule. Returns `false` if it was already replaced.
    pub fn set_permission_rule<F>(&self, rule: F) -> bool
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let rule: Rule = Arc::new(rule);
        one_shot(&self.permission_rule, rule, "permission rule")
    }

    /// Replaces the default permission-denied reaction. Returns `false` if it was already replaced.
    pub fn set_no_permission_action<F>(&self, action: F) -> bool
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let action: PermissionAction = Arc::new(action);
        one_shot(&self.no_permission_action, action, "no-permission action")
    }

    /// Replaces the default failure reaction. Returns `false` if it was already replaced.
    pub fn set_error_action<F>(&self, action: F) -> bool
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        let action: ErrorAction = Arc::new(action);
        one_shot(&self.error_action, action, "error action")
    }

    /// The rules currently in force: customised ones where set, built-ins otherwise.
    pub fn rules(&self) -> ClassificationRules {
        let builtin = ClassificationRules::default();
        ClassificationRules {
            success: self.success_rule.get().cloned().unwrap_or(builtin.success),
            permission: self.permission_rule.get().cloned().unwrap_or(builtin.permission),
        }
    }

    pub(crate) fn no_permission(&self, payload: &Value) {
        match self.no_permission_action.get() {
            Some(action) => action(payload),
            None => tracing::warn!(login_page = %self.login_page, "permission denied, redirect to login page"),
        }
    }

    pub(crate) fn error(&self, event: &ErrorEvent) {
        match self.error_action.get() {
            Some(action) => action(event),
            None => tracing::warn!(error = %event, "request failed with no error handler"),
        }
    }
}

fn one_shot<T>(cell: &OnceLock<T>, value: T, hook: &str) -> bool {
    let applied = cell.set(value).is_ok();
    if !applied {
        tracing::debug!(hook, "default already customised, ignoring");
    }
    applied
}

impl fmt::Debug for FlightDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightDefaults")
            .field("login_page", &self.login_page)
            .field("success_rule", &self.success_rule.get().is_some())
            .field("permission_rule", &self.permission_rule.get().is_some())
            .field("no_permission_action", &self.no_permission_action.get().is_some())
            .field("error_action", &self.error_action.get().is_some())
            .finish()
    }
}
