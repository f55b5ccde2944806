//! Secret type registry.
//!
//! Policies are assembled once at startup from configuration plus any
//! validation rules and masking functions registered through the builder.
//! The finished [`PolicyRegistry`] is immutable and shared behind an `Arc`.

use std::collections::HashMap;

use crate::config::{AppConfig, SecretTypeConfig};
use crate::domain::SecretTypePolicy;
use crate::errors::{Result, VigilError};
use crate::secrets::rules::{default_password_rules, SecretRule};

fn to_chrono(key: &str, field: &str, duration: std::time::Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(duration).map_err(|_| {
        VigilError::config(format!("Secret type '{}' has an out-of-range {}", key, field))
    })
}

impl SecretTypePolicy {
    /// Build a policy from its configuration entry. Rules and masking start empty.
    pub fn from_config(config: &SecretTypeConfig) -> Result<Self> {
        let expires_after = config
            .expires_after()?
            .map(|d| to_chrono(&config.key, "expires_after", d))
            .transpose()?;
        let broadcast_expiring_before = config
            .broadcast_expiring_before()?
            .map(|d| to_chrono(&config.key, "broadcast_expiring_before", d))
            .transpose()?;

        Ok(Self {
            key: config.key.clone(),
            code: config.code,
            display_name: config.display_name.clone(),
            accessor_name: config.accessor_name.clone(),
            relationship_name: config.relationship_name(),
            max_active_count: config.max_active_count,
            max_history_count: config.max_history_count,
            max_usage_count: config.max_usage_count,
            expires_after,
            broadcast_expiring_before,
            hashed: config.hashed,
            unique_for_all: config.unique_for_all,
            hidden: config.hidden,
            append: config.append,
            rules: Vec::new(),
            masking: None,
        })
    }
}

/// Collects policies and their runtime callbacks before freezing them.
#[derive(Debug)]
pub struct PolicyRegistryBuilder {
    policies: Vec<SecretTypePolicy>,
    validation_enabled: bool,
}

impl Default for PolicyRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyRegistryBuilder {
    pub fn new() -> Self {
        Self { policies: Vec::new(), validation_enabled: true }
    }

    /// Seed the builder from configuration; the `password` type gets the stock rule set.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut builder = Self::new().validation_enabled(config.validation_enabled);
        for type_config in &config.types {
            let mut policy = SecretTypePolicy::from_config(type_config)?;
            if policy.key == "password" {
                policy.rules = default_password_rules();
            }
            builder = builder.register(policy);
        }
        Ok(builder)
    }

    pub fn register(mut self, policy: SecretTypePolicy) -> Self {
        self.policies.push(policy);
        self
    }

    fn policy_mut(&mut self, key: &str) -> Result<&mut SecretTypePolicy> {
        self.policies
            .iter_mut()
            .find(|p| p.key == key)
            .ok_or_else(|| VigilError::not_found("secret type", key))
    }

    /// Replace the validation rules of one type.
    pub fn rules(mut self, key: &str, rules: Vec<SecretRule>) -> Result<Self> {
        self.policy_mut(key)?.rules = rules;
        Ok(self)
    }

    pub fn masking<F>(mut self, key: &str, mask: F) -> Result<Self>
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.policy_mut(key)?.masking = Some(std::sync::Arc::new(mask));
        Ok(self)
    }

    pub fn validation_enabled(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    pub fn build(self) -> Result<PolicyRegistry> {
        let mut by_key = HashMap::new();
        let mut by_code = HashMap::new();
        let mut by_accessor = HashMap::new();

        for (index, policy) in self.policies.iter().enumerate() {
            if by_key.insert(policy.key.clone(), index).is_some() {
                return Err(VigilError::config(format!("Duplicate secret type key '{}'", policy.key)));
            }
            if by_code.insert(policy.code, index).is_some() {
                return Err(VigilError::config(format!("Duplicate secret type code {}", policy.code)));
            }
            if by_accessor.insert(policy.accessor_name.clone(), index).is_some() {
                return Err(VigilError::config(format!(
                    "Duplicate secret accessor name '{}'",
                    policy.accessor_name
                )));
            }
            if policy.unique_for_all && policy.hashed {
                return Err(VigilError::config(format!(
                    "Secret type '{}' cannot be unique_for_all while hashed",
                    policy.key
                )));
            }
            if policy.broadcast_expiring_before.is_some() && policy.expires_after.is_none() {
                return Err(VigilError::config(format!(
                    "Secret type '{}' sets broadcast_expiring_before without expires_after",
                    policy.key
                )));
            }
        }

        tracing::info!(
            types = ?self.policies.iter().map(|p| p.key.as_str()).collect::<Vec<_>>(),
            validation_enabled = self.validation_enabled,
            "Secret type registry built"
        );

        Ok(PolicyRegistry {
            policies: self.policies,
            by_key,
            by_code,
            by_accessor,
            validation_enabled: self.validation_enabled,
        })
    }
}

/// Immutable lookup of secret type policies by key, code or accessor name.
#[derive(Debug)]
pub struct PolicyRegistry {
    policies: Vec<SecretTypePolicy>,
    by_key: HashMap<String, usize>,
    by_code: HashMap<u8, usize>,
    by_accessor: HashMap<String, usize>,
    validation_enabled: bool,
}

impl PolicyRegistry {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        PolicyRegistryBuilder::from_config(config)?.build()
    }

    /// All policies in configuration order.
    pub fn types(&self) -> &[SecretTypePolicy] {
        &self.policies
    }

    pub fn by_key(&self, key: &str) -> Result<&SecretTypePolicy> {
        self.by_key
            .get(key)
            .map(|&index| &self.policies[index])
            .ok_or_else(|| VigilError::not_found("secret type", key))
    }

    pub fn by_code(&self, code: u8) -> Result<&SecretTypePolicy> {
        self.by_code
            .get(&code)
            .map(|&index| &self.policies[index])
            .ok_or_else(|| VigilError::not_found("secret type code", code.to_string()))
    }

    pub fn by_accessor(&self, accessor: &str) -> Result<&SecretTypePolicy> {
        self.by_accessor
            .get(accessor)
            .map(|&index| &self.policies[index])
            .ok_or_else(|| VigilError::not_found("secret accessor", accessor))
    }

    /// Types usable as a standalone login credential.
    pub fn credential_types(&self) -> impl Iterator<Item = &SecretTypePolicy> {
        self.policies.iter().filter(|p| p.is_credential())
    }

    /// Types that warn their owners before expiry.
    pub fn expiring_types(&self) -> impl Iterator<Item = &SecretTypePolicy> {
        self.policies
            .iter()
            .filter(|p| p.expires_after.is_some() && p.broadcast_expiring_before.is_some())
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PolicyRegistry {
        let mut email = SecretTypePolicy::named("email", 2, "email address");
        email.hashed = false;
        email.unique_for_all = true;
        email.hidden = false;

        PolicyRegistryBuilder::new()
            .register(SecretTypePolicy::named("password", 0, "password"))
            .register(SecretTypePolicy::named("pin", 1, "PIN"))
            .register(email)
            .masking("email", |v| format!("{}***", &v[..1]))
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_lookups() {
        let registry = registry();
        assert_eq!(registry.types().len(), 3);
        assert_eq!(registry.by_key("pin").unwrap().code, 1);
        assert_eq!(registry.by_code(2).unwrap().key, "email");
        assert_eq!(registry.by_accessor("password").unwrap().display_name, "password");

        assert!(matches!(registry.by_key("otp"), Err(VigilError::NotFound { .. })));
        assert!(matches!(registry.by_code(9), Err(VigilError::NotFound { .. })));
    }

    #[test]
    fn test_credential_types_and_masking() {
        let registry = registry();
        let credentials: Vec<_> = registry.credential_types().map(|p| p.key.as_str()).collect();
        assert_eq!(credentials, vec!["email"]);
        assert_eq!(registry.by_key("email").unwrap().mask("alice@example.com").unwrap(), "a***");
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let result = PolicyRegistryBuilder::new()
            .register(SecretTypePolicy::named("password", 0, "password"))
            .register(SecretTypePolicy::named("pin", 0, "PIN"))
            .build();
        assert!(matches!(result, Err(VigilError::Config { .. })));
    }

    #[test]
    fn test_unique_for_all_requires_plain_values() {
        let mut email = SecretTypePolicy::named("email", 2, "email");
        email.unique_for_all = true;
        assert!(PolicyRegistryBuilder::new().register(email).build().is_err());
    }

    #[test]
    fn test_from_default_config() {
        let registry = PolicyRegistry::from_config(&AppConfig::default()).unwrap();
        let password = registry.by_key("password").unwrap();
        assert_eq!(password.expires_after, Some(chrono::Duration::days(90)));
        assert_eq!(password.broadcast_expiring_before, Some(chrono::Duration::days(10)));
        assert!(!password.rules.is_empty());
        assert_eq!(registry.expiring_types().count(), 1);
        assert!(registry.validation_enabled());
    }

    #[test]
    fn test_unknown_type_rules_rejected() {
        let result = PolicyRegistryBuilder::new().rules("nope", vec![SecretRule::Numbers]);
        assert!(result.is_err());
    }
}
