use anyhow::{anyhow, Result};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use base64::Engine;
use password_hash::{PasswordHash, SaltString};

use crate::config::HashingSettings;

/// Turns a password into a stored secret and checks candidates against it.
/// The session manager only ever sees PHC strings through this seam.
pub trait CredentialVerifier: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;
    /// False for a mismatch and for a secret that does not parse.
    fn verify(&self, secret: &str, password: &str) -> bool;
}

/// Argon2id with a random 16-byte salt per secret.
#[derive(Debug, Clone)]
pub struct Argon2Verifier {
    params: Params,
}

impl Argon2Verifier {
    pub fn new(settings: &HashingSettings) -> Result<Self> {
        let params = Params::new(settings.memory_kib, settings.iterations, settings.parallelism, None)
            .map_err(|e| anyhow!("argon2 params: {}", e))?;
        Ok(Self { params })
    }

    fn engine(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Verifier {
    fn default() -> Self { Self { params: Params::default() } }
}

impl CredentialVerifier for Argon2Verifier {
    fn hash(&self, password: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
        let phc = self
            .engine()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!(e.to_string()))?
            .to_string();
        Ok(phc)
    }

    fn verify(&self, secret: &str, password: &str) -> bool {
        // Parameters come from the PHC string, so secrets hashed under older
        // settings still verify.
        if let Ok(parsed) = PasswordHash::new(secret) {
            self.engine().verify_password(password.as_bytes(), &parsed).is_ok()
        } else { false }
    }
}

/// Random url-safe token (base64url, no padding) from `bytes` bytes of OS entropy.
pub fn random_token(bytes: usize) -> Result<String> {
    let mut buf = vec![0u8; bytes.max(8)];
    getrandom::getrandom(&mut buf).map_err(|e| anyhow!(e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}
