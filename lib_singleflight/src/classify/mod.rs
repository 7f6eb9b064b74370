//! # Response Classification
//!
//! Decides what a parsed response payload means for the caller. The backend
//! convention is a JSON object carrying a `code` field: `200` for success,
//! `401` when the session lacks permission, anything else is a failure.
//!
//! Evaluation order is fixed: the success rule is asked first, then the
//! permission rule; a payload that satisfies neither is a failure. Each rule
//! can be overridden per request through [`RuleOverrides`]; otherwise the
//! application-wide [`ClassificationRules`] apply.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A predicate over a parsed response payload.
pub type Rule = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// The three ways a payload can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The success rule accepted the payload.
    Success,
    /// The success rule declined and the permission rule accepted.
    PermissionDenied,
    /// Neither rule accepted the payload.
    Failure,
}

/// The pair of rules used when a request does not override them.
#[derive(Clone)]
pub struct ClassificationRules {
    /// Decides whether a payload is a success.
    pub success: Rule,
    /// Decides whether a payload signals missing permission.
    pub permission: Rule,
}

impl Default for ClassificationRules {
    /// `code == 200` for success, `code == 401` for permission denied.
    fn default() -> Self {
        Self {
            success: Arc::new(|payload: &Value| has_code(payload, 200.0)),
            permission: Arc::new(|payload: &Value| has_code(payload, 401.0)),
        }
    }
}

impl fmt::Debug for ClassificationRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationRules").finish_non_exhaustive()
    }
}

/// Per-request replacements for the default rules.
#[derive(Clone, Default)]
pub struct RuleOverrides {
    /// Replaces the default success rule for one request.
    pub success: Option<Rule>,
    /// Replaces the default permission rule for one request.
    pub permission: Option<Rule>,
}

impl RuleOverrides {
    /// True when neither rule is overridden.
    pub fn is_empty(&self) -> bool {
        self.success.is_none() && self.permission.is_none()
    }
}

impl fmt::Debug for RuleOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleOverrides")
            .field("success", &self.success.is_some())
            .field("permission", &self.permission.is_some())
            .finish()
    }
}

/// Classifies `payload`, preferring `overrides` over `defaults` rule by rule.
///
/// Never fails: a payload that is absent, malformed or simply unrecognised
/// ends up as [`Outcome::Failure`].
pub fn classify(payload: &Value, overrides: &RuleOverrides, defaults: &ClassificationRules) -> Outcome {
    let success = overrides.success.as_ref().unwrap_or(&defaults.success);
    if success(payload) {
        return Outcome::Success;
    }

    let permission = overrides.permission.as_ref().unwrap_or(&defaults.permission);
    if permission(payload) {
        return Outcome::PermissionDenied;
    }

    Outcome::Failure
}

/// Reads the `code` field of an object payload as a number.
///
/// Follows loose numeric coercion: numbers as-is, strings trimmed and parsed
/// (an empty string is zero, `0x`/`0o`/`0b` prefixes select the radix),
/// booleans as one or zero, null as zero. Anything else has no numeric reading.
pub fn numeric_code(payload: &Value) -> Option<f64> {
    let code = payload.as_object()?.get("code")?;
    match code {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else if let Some(n) = radix_literal(trimmed) {
                Some(n)
            } else {
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Unsigned `0x`, `0o` or `0b` literal. A sign or an empty digit run is not one.
fn radix_literal(text: &str) -> Option<f64> {
    let radix = match text.get(..2)?.to_ascii_lowercase().as_str() {
        "0x" => 16,
        "0o" => 8,
        "0b" => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() {
        return None;
    }
    digits
        .chars()
        .try_fold(0.0_f64, |acc, c| c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d)))
}

fn has_code(payload: &Value, expected: f64) -> bool {
    numeric_code(payload) == Some(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(payload: Value) -> Outcome {
        classify(&payload, &RuleOverrides::default(), &ClassificationRules::default())
    }

    #[test]
    fn test_default_rules_follow_code_field() {
        assert_eq!(run(json!({ "code": 200, "data": [1, 2] })), Outcome::Success);
        assert_eq!(run(json!({ "code": 401 })), Outcome::PermissionDenied);
        assert_eq!(run(json!({ "code": 500 })), Outcome::Failure);
        assert_eq!(run(json!({ "data": "no code" })), Outcome::Failure);
    }

    #[test]
    fn test_string_codes_are_coerced() {
        assert_eq!(run(json!({ "code": "200" })), Outcome::Success);
        assert_eq!(run(json!({ "code": " 401 " })), Outcome::PermissionDenied);
        assert_eq!(run(json!({ "code": "200.0" })), Outcome::Success);
        assert_eq!(run(json!({ "code": "ok" })), Outcome::Failure);
    }

    #[test]
    fn test_malformed_payloads_resolve_to_failure() {
        assert_eq!(run(Value::Null), Outcome::Failure);
        assert_eq!(run(json!(200)), Outcome::Failure);
        assert_eq!(run(json!("200")), Outcome::Failure);
        assert_eq!(run(json!([{ "code": 200 }])), Outcome::Failure);
        assert_eq!(run(json!({ "code": { "value": 200 } })), Outcome::Failure);
        assert_eq!(run(json!({ "code": null })), Outcome::Failure);
    }

    #[test]
    fn test_success_override_takes_precedence() {
        let overrides = RuleOverrides {
            success: Some(Arc::new(|p: &Value| p.get("ok") == Some(&json!(true)))),
            permission: None,
        };
        let defaults = ClassificationRules::default();

        assert_eq!(classify(&json!({ "ok": true }), &overrides, &defaults), Outcome::Success);
        // The default success rule no longer applies, the default permission rule still does.
        assert_eq!(classify(&json!({ "code": 200 }), &overrides, &defaults), Outcome::Failure);
        assert_eq!(classify(&json!({ "code": 401 }), &overrides, &defaults), Outcome::PermissionDenied);
    }

    #[test]
    fn test_success_is_checked_before_permission() {
        let overrides = RuleOverrides {
            success: Some(Arc::new(|_: &Value| true)),
            permission: Some(Arc::new(|_: &Value| true)),
        };
        let outcome = classify(&json!({ "code": 401 }), &overrides, &ClassificationRules::default());
        assert_eq!(outcome, Outcome::Success);
    }

    #[test]
    fn test_radix_prefixed_codes() {
        assert_eq!(run(json!({ "code": "0xC8" })), Outcome::Success);
        assert_eq!(run(json!({ "code": " 0X191 " })), Outcome::PermissionDenied);
        assert_eq!(numeric_code(&json!({ "code": "0o310" })), Some(200.0));
        assert_eq!(numeric_code(&json!({ "code": "0b11001000" })), Some(200.0));
        assert_eq!(numeric_code(&json!({ "code": "0x" })), None);
        assert_eq!(numeric_code(&json!({ "code": "-0xC8" })), None);
        assert_eq!(numeric_code(&json!({ "code": "0x+1" })), None);
        assert_eq!(numeric_code(&json!({ "code": "0b102" })), None);
    }

    #[test]
    fn test_numeric_code_readings() {
        assert_eq!(numeric_code(&json!({ "code": true })), Some(1.0));
        assert_eq!(numeric_code(&json!({ "code": "" })), Some(0.0));
        assert_eq!(numeric_code(&json!({ "code": "inf" })), None);
        assert_eq!(numeric_code(&json!({})), None);
        assert!(RuleOverrides::default().is_empty());
    }
}
