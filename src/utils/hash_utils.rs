use std::hash::Hasher;
use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use crate::error::TagmarkError;

const SESSION_TOKEN_LENGTH: usize = 48;

pub struct PasswordHasher;

impl PasswordHasher {
    pub fn hash(password: &str) -> Result<String, TagmarkError> {
        let mut salt_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| TagmarkError::PasswordHash(e.to_string()))?;
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| TagmarkError::PasswordHash(e.to_string()))?;
        Ok(hash.to_string())
    }

    pub fn verify(password: &str, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

pub fn new_session_token() -> String {
    ChaCha20Rng::from_entropy()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

pub fn xxhash_str(text: &str) -> u64 {
    let mut hasher = twox_hash::XxHash64::default();
    hasher.write(text.as_bytes());
    hasher.finish()
}
