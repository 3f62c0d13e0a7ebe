use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;

use crate::error::{Error, Result};

/// Service tokens look like `siteman_<lookup>_<secret>`. The lookup half is
/// stored in plaintext as a row index; the secret half exists only in the
/// operator's hands and as an Argon2id hash.
const TOKEN_PREFIX: &str = "siteman";
const LOOKUP_LENGTH: usize = 8;
const SECRET_LENGTH: usize = 24;

// Argon2id parameters, sized for interactive verification
const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

pub struct TokenGenerator {
    argon2: Argon2<'static>,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenGenerator {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(
            ARGON2_MEMORY_KIB,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .expect("invalid argon2 params");

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Mints a fresh token. Returns (raw_token, lookup, hash); the raw token
    /// is shown once and never stored.
    pub fn generate(&self) -> Result<(String, String, String)> {
        let lookup = random_hex(LOOKUP_LENGTH);
        let secret = random_hex(SECRET_LENGTH);
        let raw_token = format!("{TOKEN_PREFIX}_{lookup}_{secret}");
        let hash = self.hash(&raw_token)?;
        Ok((raw_token, lookup, hash))
    }

    /// Hashes a raw token to a PHC string with a fresh salt.
    pub fn hash(&self, token: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(token.as_bytes(), &salt)
            .map_err(|e| Error::Config(format!("failed to hash token: {e}")))?;
        Ok(hash.to_string())
    }

    /// Verifies a raw token against a stored PHC hash.
    pub fn verify(&self, token: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::Config(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(token.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Config(format!("failed to verify token: {e}"))),
        }
    }
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len.div_ceil(2)];
    rand::thread_rng().fill(bytes.as_mut_slice());
    let mut encoded = hex::encode(bytes);
    encoded.truncate(len);
    encoded
}

/// Splits a raw token into (lookup, secret), rejecting anything that does not
/// match the minted shape exactly.
pub fn parse_token(token: &str) -> Result<(String, String)> {
    let rest = token
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or(Error::InvalidTokenFormat)?;

    let (lookup, secret) = rest.split_once('_').ok_or(Error::InvalidTokenFormat)?;

    if lookup.len() != LOOKUP_LENGTH || secret.len() != SECRET_LENGTH || secret.contains('_') {
        return Err(Error::InvalidTokenFormat);
    }

    Ok((lookup.to_string(), secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_tokens_have_the_documented_shape() {
        let generator = TokenGenerator::new();
        let (token, lookup, _hash) = generator.generate().unwrap();

        assert!(token.starts_with("siteman_"));
        assert_eq!(lookup.len(), LOOKUP_LENGTH);

        let (parsed_lookup, parsed_secret) = parse_token(&token).unwrap();
        assert_eq!(parsed_lookup, lookup);
        assert_eq!(parsed_secret.len(), SECRET_LENGTH);
    }

    #[test]
    fn minted_tokens_verify_against_their_hash() {
        let generator = TokenGenerator::new();
        let (token, _, hash) = generator.generate().unwrap();

        assert!(generator.verify(&token, &hash).unwrap());
    }

    #[test]
    fn a_forged_secret_does_not_verify() {
        let generator = TokenGenerator::new();
        let (token, _, hash) = generator.generate().unwrap();

        let forged = format!("{}abcde", &token[..token.len() - 5]);
        assert!(!generator.verify(&forged, &hash).unwrap());
    }

    #[test]
    fn parse_accepts_the_minted_shape_only() {
        let (lookup, secret) = parse_token("siteman_12345678_123456789012345678901234").unwrap();
        assert_eq!(lookup, "12345678");
        assert_eq!(secret, "123456789012345678901234");

        for bad in [
            "notright_12345678_123456789012345678901234",
            "siteman_12345678",
            "siteman_short_123456789012345678901234",
            "siteman_12345678_tooshort",
            "siteman_12345678_1234567890123456789_1234",
            "",
        ] {
            assert!(
                matches!(parse_token(bad), Err(Error::InvalidTokenFormat)),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn hashes_are_phc_strings() {
        let generator = TokenGenerator::new();
        let (_, _, hash) = generator.generate().unwrap();

        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn random_hex_lengths_are_exact() {
        assert_eq!(random_hex(8).len(), 8);
        assert_eq!(random_hex(24).len(), 24);
        assert_ne!(random_hex(24), random_hex(24));
    }
}
