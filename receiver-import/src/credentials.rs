//! Initial credentials for subscribers created by an import.
//!
//! Imported subscribers never receive their generated password; it only has
//! to exist so the account row is complete. The password is hashed with
//! argon2id before it leaves this module.

use argon2::{
    Algorithm, Argon2, ParamsBuilder, PasswordHasher, Version, password_hash::SaltString,
};
use rand::RngCore;
use rand::seq::SliceRandom;
use thiserror::Error;

const SALT_LEN: usize = 16;
const INITIAL_PASSWORD_LEN: usize = 16;
const PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!?=%-";

pub type CredentialResult<T> = Result<T, CredentialError>;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
}

impl From<argon2::Error> for CredentialError {
    fn from(err: argon2::Error) -> Self {
        CredentialError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for CredentialError {
    fn from(err: argon2::password_hash::Error) -> Self {
        CredentialError::PasswordHash(err.to_string())
    }
}

#[derive(Clone)]
pub struct CredentialService {
    argon2: Argon2<'static>,
}

impl CredentialService {
    pub fn new() -> CredentialResult<Self> {
        Self::with_cost(19 * 1024, 2) // 19 MiB
    }

    /// Build a service with explicit memory (KiB) and iteration costs.
    pub fn with_cost(m_cost: u32, t_cost: u32) -> CredentialResult<Self> {
        let mut builder = ParamsBuilder::new();
        builder.m_cost(m_cost);
        builder.t_cost(t_cost);
        builder.p_cost(1);
        let params = builder.build()?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { argon2 })
    }

    /// Random password drawn without repetition from the password alphabet.
    pub fn generate_password(&self) -> String {
        let mut rng = rand::thread_rng();
        PASSWORD_ALPHABET
            .choose_multiple(&mut rng, INITIAL_PASSWORD_LEN)
            .map(|byte| *byte as char)
            .collect()
    }

    pub fn hash_password(&self, password: &str) -> CredentialResult<String> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)?
            .to_string();
        Ok(hash)
    }

    /// Hash of a freshly generated password; the plaintext is discarded.
    pub fn issue_initial_hash(&self) -> CredentialResult<String> {
        let password = self.generate_password();
        self.hash_password(&password)
    }
}
