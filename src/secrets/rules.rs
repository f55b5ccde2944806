//! Composable validation rules for raw secret values.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    static ref LETTER_REGEX: Regex =
        Regex::new(r"\p{L}").expect("LETTER_REGEX should be a valid regex pattern");
    static ref MIXED_CASE_REGEX: Regex = Regex::new(r"(\p{Ll}+.*\p{Lu})|(\p{Lu}+.*\p{Ll})")
        .expect("MIXED_CASE_REGEX should be a valid regex pattern");
    static ref NUMBER_REGEX: Regex =
        Regex::new(r"\p{N}").expect("NUMBER_REGEX should be a valid regex pattern");
    static ref SYMBOL_REGEX: Regex = Regex::new(r"[\p{Z}\p{S}\p{P}]")
        .expect("SYMBOL_REGEX should be a valid regex pattern");
}

/// Custom check registered at startup; receives the raw value.
pub type RuleCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum SecretRule {
    MinLength(usize),
    MaxLength(usize),
    Letters,
    MixedCase,
    Numbers,
    Symbols,
    /// `message` may reference the field label as `:attribute`
    Pattern { regex: Regex, message: String },
    Custom { name: String, message: String, check: RuleCheck },
}

impl SecretRule {
    pub fn pattern(regex: Regex, message: &str) -> Self {
        Self::Pattern { regex, message: message.to_string() }
    }

    pub fn custom<F>(name: &str, message: &str, check: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Custom { name: name.to_string(), message: message.to_string(), check: Arc::new(check) }
    }

    fn code(&self) -> Cow<'static, str> {
        match self {
            SecretRule::MinLength(_) => Cow::Borrowed("min"),
            SecretRule::MaxLength(_) => Cow::Borrowed("max"),
            SecretRule::Letters => Cow::Borrowed("letters"),
            SecretRule::MixedCase => Cow::Borrowed("mixed_case"),
            SecretRule::Numbers => Cow::Borrowed("numbers"),
            SecretRule::Symbols => Cow::Borrowed("symbols"),
            SecretRule::Pattern { .. } => Cow::Borrowed("regex"),
            SecretRule::Custom { name, .. } => Cow::Owned(name.clone()),
        }
    }

    fn passes(&self, value: &str) -> bool {
        match self {
            SecretRule::MinLength(min) => value.chars().count() >= *min,
            SecretRule::MaxLength(max) => value.chars().count() <= *max,
            SecretRule::Letters => LETTER_REGEX.is_match(value),
            SecretRule::MixedCase => MIXED_CASE_REGEX.is_match(value),
            SecretRule::Numbers => NUMBER_REGEX.is_match(value),
            SecretRule::Symbols => SYMBOL_REGEX.is_match(value),
            SecretRule::Pattern { regex, .. } => regex.is_match(value),
            SecretRule::Custom { check, .. } => check(value),
        }
    }

    fn message(&self, label: &str) -> String {
        match self {
            SecretRule::MinLength(min) => {
                format!("The {} field must be at least {} characters.", label, min)
            }
            SecretRule::MaxLength(max) => {
                format!("The {} field must not be greater than {} characters.", label, max)
            }
            SecretRule::Letters => format!("The {} field must contain at least one letter.", label),
            SecretRule::MixedCase => format!(
                "The {} field must contain at least one uppercase and one lowercase letter.",
                label
            ),
            SecretRule::Numbers => format!("The {} field must contain at least one number.", label),
            SecretRule::Symbols => format!("The {} field must contain at least one symbol.", label),
            SecretRule::Pattern { message, .. } | SecretRule::Custom { message, .. } => {
                message.replace(":attribute", label)
            }
        }
    }

    /// Check `value`, labelling any failure with the type's display name.
    pub fn validate(&self, label: &str, value: &str) -> Result<(), ValidationError> {
        if self.passes(value) {
            return Ok(());
        }
        let mut error = ValidationError::new("secret_rule");
        error.code = self.code();
        error.message = Some(Cow::Owned(self.message(label)));
        Err(error)
    }
}

impl fmt::Debug for SecretRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretRule::MinLength(min) => write!(f, "MinLength({})", min),
            SecretRule::MaxLength(max) => write!(f, "MaxLength({})", max),
            SecretRule::Letters => f.write_str("Letters"),
            SecretRule::MixedCase => f.write_str("MixedCase"),
            SecretRule::Numbers => f.write_str("Numbers"),
            SecretRule::Symbols => f.write_str("Symbols"),
            SecretRule::Pattern { regex, .. } => write!(f, "Pattern({})", regex.as_str()),
            SecretRule::Custom { name, .. } => write!(f, "Custom({})", name),
        }
    }
}

/// The rule every value passes through before its type's own rules.
pub fn check_required(label: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some(Cow::Owned(format!("The {} field is required.", label)));
        return Err(error);
    }
    Ok(())
}

/// Stock password rules: at least 12 characters with letters in both cases and a number.
pub fn default_password_rules() -> Vec<SecretRule> {
    vec![SecretRule::MinLength(12), SecretRule::Letters, SecretRule::MixedCase, SecretRule::Numbers]
}
