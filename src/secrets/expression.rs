//! Secret requirement expressions.
//!
//! Route guards name the secret types they need as a list of terms such as
//! `password&pin` or `password|otp`. A list parsed in one mode splits each
//! term on that mode's operator; any piece still carrying the other operator
//! becomes a nested node of the other mode.

use std::fmt;

use crate::domain::SecretTypePolicy;
use crate::errors::{Result, VigilError};
use crate::secrets::registry::PolicyRegistry;

/// How the children of a node combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprMode {
    /// Every child must verify
    All,
    /// One child verifying is enough
    Any,
}

impl ExprMode {
    pub fn operator(&self) -> char {
        match self {
            ExprMode::All => '&',
            ExprMode::Any => '|',
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            ExprMode::All => ExprMode::Any,
            ExprMode::Any => ExprMode::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExprMode::All => "and",
            ExprMode::Any => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretExpr {
    /// A single secret type key
    Type(String),
    All(Vec<SecretExpr>),
    Any(Vec<SecretExpr>),
}

impl SecretExpr {
    /// Parse guard terms in `mode`.
    ///
    /// Empty pieces are ignored; an expression with no type at all is rejected.
    pub fn parse<S: AsRef<str>>(mode: ExprMode, terms: &[S]) -> Result<Self> {
        let pieces: Vec<&str> = terms
            .iter()
            .flat_map(|term| term.as_ref().split(mode.operator()))
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .collect();
        Self::build(mode, &pieces)
    }

    fn build(mode: ExprMode, pieces: &[&str]) -> Result<Self> {
        let opposite = mode.opposite();
        let mut children = Vec::with_capacity(pieces.len());

        for piece in pieces {
            if piece.contains(opposite.operator()) {
                let nested: Vec<&str> = piece
                    .split(opposite.operator())
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .collect();
                children.push(Self::build(opposite, &nested)?);
            } else {
                children.push(SecretExpr::Type(piece.to_string()));
            }
        }

        match children.len() {
            0 => Err(VigilError::invalid_input("Secret expression names no secret type")),
            1 => Ok(children.remove(0)),
            _ => Ok(match mode {
                ExprMode::All => SecretExpr::All(children),
                ExprMode::Any => SecretExpr::Any(children),
            }),
        }
    }

    /// Mode of this node, `None` for a leaf.
    pub fn mode(&self) -> Option<ExprMode> {
        match self {
            SecretExpr::Type(_) => None,
            SecretExpr::All(_) => Some(ExprMode::All),
            SecretExpr::Any(_) => Some(ExprMode::Any),
        }
    }

    /// Every type key in the expression, in order of appearance.
    pub fn type_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys<'a>(&'a self, keys: &mut Vec<&'a str>) {
        match self {
            SecretExpr::Type(key) => keys.push(key),
            SecretExpr::All(children) | SecretExpr::Any(children) => {
                children.iter().for_each(|child| child.collect_keys(keys))
            }
        }
    }

    /// Fail with `NotFound` when any key is not a registered type.
    pub fn resolve<'r>(&self, registry: &'r PolicyRegistry) -> Result<Vec<&'r SecretTypePolicy>> {
        self.type_keys().into_iter().map(|key| registry.by_key(key)).collect()
    }
}

impl fmt::Display for SecretExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretExpr::Type(key) => f.write_str(key),
            SecretExpr::All(children) | SecretExpr::Any(children) => {
                let operator = self.mode().map(|m| m.operator()).unwrap_or('&');
                f.write_str("(")?;
                for (index, child) in children.iter().enumerate() {
                    if index > 0 {
                        write!(f, "{}", operator)?;
                    }
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
        }
    }
}
