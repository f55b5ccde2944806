//! One-way hashing for secret values.

use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use rand::rngs::OsRng;

use crate::errors::{Result, VigilError};

// Argon2id tuned for request-time verification: 0.75 MiB, one pass.
const MEMORY_COST_KIB: u32 = 768;
const ITERATIONS: u32 = 1;
const PARALLELISM: u32 = 1;

fn secret_hasher() -> Result<Argon2<'static>> {
    let params = Params::new(MEMORY_COST_KIB, ITERATIONS, PARALLELISM, Some(32))
        .map_err(|e| VigilError::hashing(format!("Invalid Argon2 parameters: {}", e)))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a raw value into a PHC string.
pub fn hash_value(raw: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = secret_hasher()?
        .hash_password(raw.as_bytes(), &salt)
        .map_err(|e| VigilError::hashing(format!("Failed to hash secret value: {}", e)))?;
    Ok(hash.to_string())
}

/// Compare a candidate against a stored PHC string.
///
/// A stored value that does not parse as a hash never matches.
pub fn verify_value(stored: &str, candidate: &str) -> bool {
    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Stored secret hash could not be parsed");
            return false;
        }
    };

    // Parameters are read from the PHC string, so older hashes still verify.
    Argon2::default().verify_password(candidate.as_bytes(), &parsed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_value("CorrectHorse42").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_value(&hash, "CorrectHorse42"));
        assert!(!verify_value(&hash, "WrongHorse42"));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_value("same").unwrap(), hash_value("same").unwrap());
    }

    #[test]
    fn test_unparseable_hash_never_matches() {
        assert!(!verify_value("not-a-hash", "not-a-hash"));
    }
}
