//! Request-time secret verification.
//!
//! Evaluates a [`SecretExpr`] against the values a caller supplied. Leaves
//! look up the owner's active secrets and compare; `All` nodes need every
//! child to match and stop at the first mismatch, `Any` nodes skip types the
//! caller did not supply and stop at the first match. Usage counters are only
//! consumed once the whole expression has verified.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::domain::{OwnerRef, Secret, SecretTypePolicy};
use crate::errors::{FieldErrors, Result, VigilError};
use crate::observability::MetricsRecorder;
use crate::secrets::engine::SecretEngine;
use crate::secrets::expression::{ExprMode, SecretExpr};
use crate::secrets::input::SecretInput;
use crate::secrets::usage_lock::{UsageGuard, UsageLocks};

/// Request fields keyed by accessor name.
pub type SecretInputs = Map<String, Value>;

/// Outcome of a successful verification.
///
/// The guards keep the matched secrets locked against a second decrement and
/// must live until the request has been answered.
#[derive(Debug, Default)]
pub struct Verification {
    pub matched: Vec<Secret>,
    pub guards: Vec<UsageGuard>,
}

/// Whether a request field counts as present.
pub fn is_supplied(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(fields)) => !fields.is_empty(),
        Some(_) => true,
    }
}

#[derive(Clone)]
pub struct SecretVerifier {
    engine: Arc<SecretEngine>,
    locks: UsageLocks,
    metrics: MetricsRecorder,
}

impl SecretVerifier {
    pub fn new(engine: Arc<SecretEngine>, locks: UsageLocks) -> Self {
        Self { engine, locks, metrics: MetricsRecorder::new() }
    }

    pub fn engine(&self) -> &Arc<SecretEngine> {
        &self.engine
    }

    /// Verify `inputs` for `owner` against `expr`, then consume usage of the matched secrets.
    #[instrument(skip(self, owner, inputs), fields(expr = %expr), name = "verify_secrets")]
    pub async fn verify(
        &self,
        owner: Option<&OwnerRef>,
        expr: &SecretExpr,
        inputs: &SecretInputs,
    ) -> Result<Verification> {
        let owner = owner.filter(|o| o.is_persisted()).ok_or_else(VigilError::unauthenticated)?;
        expr.resolve(self.engine.registry())?;

        let mode = expr.mode().unwrap_or(ExprMode::All).as_str();
        let matched = match self.evaluate(owner, expr, inputs).await {
            Ok(matched) => matched,
            Err(e) => {
                self.metrics.record_verification(mode, error_outcome(&e));
                return Err(e);
            }
        };
        self.metrics.record_verification(mode, "success");

        let mut guards = Vec::new();
        for secret in matched.iter().filter(|s| s.usage_left.is_some()) {
            match self.locks.try_acquire(secret.id) {
                Some(guard) => {
                    self.engine.decrement_usage(secret).await?;
                    guards.push(guard);
                }
                None => debug!(secret_id = secret.id, "Usage already being consumed, skipping decrement"),
            }
        }

        Ok(Verification { matched, guards })
    }

    fn evaluate<'a>(
        &'a self,
        owner: &'a OwnerRef,
        expr: &'a SecretExpr,
        inputs: &'a SecretInputs,
    ) -> BoxFuture<'a, Result<Vec<Secret>>> {
        async move {
            match expr {
                SecretExpr::Type(_) => self.evaluate_all(owner, std::slice::from_ref(expr), inputs).await,
                SecretExpr::All(children) => self.evaluate_all(owner, children, inputs).await,
                SecretExpr::Any(children) => self.evaluate_any(owner, children, inputs).await,
            }
        }
        .boxed()
    }

    fn leaf_policies<'r>(&'r self, children: &[SecretExpr]) -> Result<Vec<&'r SecretTypePolicy>> {
        children
            .iter()
            .filter_map(|child| match child {
                SecretExpr::Type(key) => Some(self.engine.registry().by_key(key)),
                _ => None,
            })
            .collect()
    }

    /// Match one supplied value against the owner's active secrets of a type.
    async fn check_leaf(
        &self,
        owner: &OwnerRef,
        policy: &SecretTypePolicy,
        value: &Value,
    ) -> Result<Option<Secret>> {
        let secrets = self.engine.get_active_secrets(owner, &policy.accessor_name, true, false).await?;
        let input = SecretInput::from_json(value)?;
        Ok(self.engine.check_secret(&input, &secrets)?.cloned())
    }

    async fn evaluate_all(
        &self,
        owner: &OwnerRef,
        children: &[SecretExpr],
        inputs: &SecretInputs,
    ) -> Result<Vec<Secret>> {
        let mut missing = FieldErrors::new();
        for policy in self.leaf_policies(children)? {
            if !is_supplied(inputs.get(&policy.accessor_name)) {
                missing.insert(
                    policy.accessor_name.clone(),
                    vec![format!("The {} field is required.", policy.display_name)],
                );
            }
        }
        if !missing.is_empty() {
            return Err(VigilError::ValidationFailed { fields: missing });
        }

        let mut matched = Vec::new();
        for child in children {
            match child {
                SecretExpr::Type(key) => {
                    let policy = self.engine.registry().by_key(key)?;
                    let value = inputs.get(&policy.accessor_name).unwrap_or(&Value::Null);
                    match self.check_leaf(owner, policy, value).await? {
                        Some(secret) => matched.push(secret),
                        None => return Err(VigilError::invalid_secret(policy)),
                    }
                }
                nested => matched.extend(self.evaluate(owner, nested, inputs).await?),
            }
        }
        Ok(matched)
    }

    async fn evaluate_any(
        &self,
        owner: &OwnerRef,
        children: &[SecretExpr],
        inputs: &SecretInputs,
    ) -> Result<Vec<Secret>> {
        let leaves = self.leaf_policies(children)?;
        let mut last_error: Option<VigilError> = None;

        for child in children {
            match child {
                SecretExpr::Type(key) => {
                    let policy = self.engine.registry().by_key(key)?;
                    let Some(value) = inputs.get(&policy.accessor_name).filter(|v| is_supplied(Some(v))) else {
                        continue;
                    };
                    match self.check_leaf(owner, policy, value).await? {
                        Some(secret) => return Ok(vec![secret]),
                        None => last_error = Some(VigilError::invalid_secret(policy)),
                    }
                }
                nested => match self.evaluate(owner, nested, inputs).await {
                    Ok(matched) => return Ok(matched),
                    Err(e) if e.is_no_active_secret() => return Err(e),
                    // A wrong value the caller did send outranks a branch they left out.
                    Err(e) => match (&last_error, &e) {
                        (Some(VigilError::InvalidSecret { .. }), VigilError::ValidationFailed { .. }) => {}
                        _ => last_error = Some(e),
                    },
                },
            }
        }

        Err(last_error.unwrap_or_else(|| required_without_all(&leaves)))
    }
}

/// Every alternative reported missing, each naming the others.
fn required_without_all(policies: &[&SecretTypePolicy]) -> VigilError {
    let mut fields = FieldErrors::new();
    for policy in policies {
        let others: Vec<&str> = policies
            .iter()
            .filter(|other| other.key != policy.key)
            .map(|other| other.display_name.as_str())
            .collect();
        let message = if others.is_empty() {
            format!("The {} field is required.", policy.display_name)
        } else {
            format!(
                "The {} field is required when none of {} are present.",
                policy.display_name,
                others.join(" / ")
            )
        };
        fields.insert(policy.accessor_name.clone(), vec![message]);
    }
    if fields.is_empty() {
        warn!("Alternative secret expression had no direct secret types to report");
        return VigilError::invalid_input("None of the alternative secrets were provided");
    }
    VigilError::ValidationFailed { fields }
}

fn error_outcome(error: &VigilError) -> &'static str {
    match error {
        VigilError::Unauthenticated { .. } => "unauthenticated",
        VigilError::NoActiveSecret { .. } => "no_active_secret",
        VigilError::InvalidSecret { .. } => "invalid_secret",
        VigilError::ValidationFailed { .. } => "validation_failed",
        _ => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_supplied() {
        assert!(!is_supplied(None));
        assert!(!is_supplied(Some(&Value::Null)));
        assert!(!is_supplied(Some(&json!("  "))));
        assert!(!is_supplied(Some(&json!([]))));
        assert!(is_supplied(Some(&json!("1234"))));
        assert!(is_supplied(Some(&json!(["a"]))));
        assert!(is_supplied(Some(&json!({"value": "a"}))));
    }

    #[test]
    fn test_required_without_all_messages() {
        let password = SecretTypePolicy::named("password", 0, "password");
        let pin = SecretTypePolicy::named("pin", 1, "PIN");
        match required_without_all(&[&password, &pin]) {
            VigilError::ValidationFailed { fields } => {
                assert_eq!(
                    fields["password"],
                    vec!["The password field is required when none of PIN are present."]
                );
                assert_eq!(
                    fields["pin"],
                    vec!["The PIN field is required when none of password are present."]
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
