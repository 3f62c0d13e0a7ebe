//! Encrypted-at-rest storage for remote-platform access tokens.
//!
//! Key: 32 bytes, SHA-256 of the operator-supplied secret.
//! Cipher: AES-256-GCM, fresh random 96-bit nonce per record.
//! Stored format: base64( nonce (12 bytes) | ciphertext + tag ).

use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::NewTokenRecord;

const NONCE_LEN: usize = 12;

pub struct Vault {
    store: Arc<dyn Store>,
    key: Option<[u8; 32]>,
}

impl Vault {
    pub fn new(store: Arc<dyn Store>, secret: Option<&str>) -> Self {
        let key = secret.map(derive_key);
        Self { store, key }
    }

    fn key(&self) -> Result<&[u8; 32]> {
        self.key
            .as_ref()
            .ok_or_else(|| Error::Config("token encryption secret is not configured".to_string()))
    }

    /// Encrypts and appends a new token record. The write is synchronous:
    /// once this returns, the record is in the store.
    pub fn store_token(&self, user_id: i64, provider: &str, plaintext: &str) -> Result<()> {
        let ciphertext = encrypt(self.key()?, plaintext)?;
        self.store.append_token(&NewTokenRecord {
            user_id,
            provider: provider.to_string(),
            ciphertext,
        })?;
        Ok(())
    }

    /// Decrypts the most recently stored token for (user, provider).
    /// Returns `Ok(None)` when no record exists; a record that fails
    /// authentication is an error, never garbage plaintext.
    pub fn latest_token(&self, user_id: i64, provider: &str) -> Result<Option<String>> {
        let key = self.key()?;
        match self.store.latest_token(user_id, provider)? {
            Some(record) => decrypt(key, &record.ciphertext).map(Some),
            None => Ok(None),
        }
    }
}

fn derive_key(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

fn encrypt(key: &[u8; 32], plaintext: &str) -> Result<String> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let sealed = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| Error::Config("token encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(STANDARD.encode(out))
}

fn decrypt(key: &[u8; 32], payload: &str) -> Result<String> {
    let data = STANDARD.decode(payload).map_err(|_| Error::Decryption)?;
    if data.len() < NONCE_LEN {
        return Err(Error::Decryption);
    }
    let (nonce, sealed) = data.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| Error::Decryption)?;

    String::from_utf8(plaintext).map_err(|_| Error::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn test_vault(secret: Option<&str>) -> (Vault, i64) {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        let user = store
            .upsert_user(&crate::types::NewUser {
                provider: "github".to_string(),
                provider_id: "1".to_string(),
                username: "octocat".to_string(),
                display_name: None,
                avatar_url: None,
            })
            .unwrap();
        (Vault::new(Arc::new(store), secret), user.id)
    }

    #[test]
    fn round_trip_returns_original_token() {
        let (vault, user_id) = test_vault(Some("correct horse battery staple"));

        vault.store_token(user_id, "github", "ghp_secret123").unwrap();
        let token = vault.latest_token(user_id, "github").unwrap();

        assert_eq!(token.as_deref(), Some("ghp_secret123"));
    }

    #[test]
    fn latest_wins_after_repeated_stores() {
        let (vault, user_id) = test_vault(Some("s3cret"));

        vault.store_token(user_id, "github", "old-token").unwrap();
        vault.store_token(user_id, "github", "new-token").unwrap();

        let token = vault.latest_token(user_id, "github").unwrap();
        assert_eq!(token.as_deref(), Some("new-token"));
    }

    #[test]
    fn absent_record_is_none_not_error() {
        let (vault, user_id) = test_vault(Some("s3cret"));
        assert!(vault.latest_token(user_id, "github").unwrap().is_none());
    }

    #[test]
    fn missing_secret_is_a_config_error() {
        let (vault, user_id) = test_vault(None);

        assert!(matches!(
            vault.store_token(user_id, "github", "tok"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            vault.latest_token(user_id, "github"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let key = derive_key("s3cret");
        let sealed = encrypt(&key, "ghp_secret123").unwrap();

        let mut bytes = STANDARD.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = STANDARD.encode(bytes);

        assert!(matches!(decrypt(&key, &tampered), Err(Error::Decryption)));
    }

    #[test]
    fn wrong_key_fails_closed() {
        let sealed = encrypt(&derive_key("right"), "ghp_secret123").unwrap();
        assert!(matches!(
            decrypt(&derive_key("wrong"), &sealed),
            Err(Error::Decryption)
        ));
    }

    #[test]
    fn garbage_payloads_never_decrypt() {
        let key = derive_key("s3cret");

        for payload in ["", "!!!not-base64!!!", "AAAA", &STANDARD.encode([0u8; 4])] {
            assert!(
                matches!(decrypt(&key, payload), Err(Error::Decryption)),
                "payload {payload:?} should fail closed"
            );
        }
    }
}
