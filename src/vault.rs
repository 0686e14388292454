use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::Rng;

use crate::error::{AppError, AppResult};

/// Bumped if the on-disk envelope format ever changes; lets a future
/// migration tell old and new ciphertexts apart without a side table.
const VAULT_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;

/// AES-256-GCM secret vault (C2). Holds the key in memory for the life of
/// the process; never logs plaintext or ciphertext. Callers store the
/// returned string directly in `llm_configs.api_key_encrypted`.
#[derive(Clone)]
pub struct Vault {
    cipher: Aes256Gcm,
}

impl Vault {
    pub fn new(key_base64: &str) -> AppResult<Self> {
        let key = BASE64.decode(key_base64).map_err(|_| AppError::Crypto)?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| AppError::Crypto)?;
        Ok(Vault { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> AppResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| AppError::Crypto)?;

        let mut envelope = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        envelope.push(VAULT_VERSION);
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend(ciphertext);
        Ok(BASE64.encode(envelope))
    }

    pub fn decrypt(&self, encoded: &str) -> AppResult<String> {
        let envelope = BASE64.decode(encoded).map_err(|_| AppError::Crypto)?;
        if envelope.len() < 1 + NONCE_LEN {
            return Err(AppError::Crypto);
        }
        let (version, rest) = envelope.split_at(1);
        if version[0] != VAULT_VERSION {
            return Err(AppError::Crypto);
        }
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self.cipher.decrypt(nonce, ciphertext).map_err(|_| AppError::Crypto)?;
        String::from_utf8(plaintext).map_err(|_| AppError::Crypto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vault() -> Vault {
        let key = BASE64.encode([7u8; 32]);
        Vault::new(&key).unwrap()
    }

    #[test]
    fn round_trips() {
        let vault = test_vault();
        let encrypted = vault.encrypt("sk-super-secret").unwrap();
        assert_ne!(encrypted, "sk-super-secret");
        assert_eq!(vault.decrypt(&encrypted).unwrap(), "sk-super-secret");
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let vault = test_vault();
        let mut encrypted = BASE64.decode(vault.encrypt("sk-super-secret").unwrap()).unwrap();
        *encrypted.last_mut().unwrap() ^= 0xff;
        let tampered = BASE64.encode(encrypted);
        assert!(vault.decrypt(&tampered).is_err());
    }

    #[test]
    fn rejects_unknown_version() {
        let vault = test_vault();
        let mut encrypted = BASE64.decode(vault.encrypt("x").unwrap()).unwrap();
        encrypted[0] = 99;
        let bad = BASE64.encode(encrypted);
        assert!(vault.decrypt(&bad).is_err());
    }
}
