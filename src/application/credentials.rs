//! Credential Manager - issues collision-checked secret tokens.
//!
//! Tokens are drawn from the OS random source and checked against the
//! record store before use. The store's unique constraints remain the last
//! line of defence; this check keeps collisions from surfacing as failed
//! activations in the common case.

use std::sync::Arc;

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

use crate::domain::foundation::PurchaseId;
use crate::domain::purchase::{CredentialKind, PurchaseError};
use crate::ports::PurchaseRepository;

/// Default number of candidates tried before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

const API_KEY_BYTES: usize = 32;
const LICENSE_KEY_GROUPS: usize = 5;
const LICENSE_KEY_GROUP_LEN: usize = 5;

// No 0/O or 1/I, license keys get typed by hand.
const LICENSE_KEY_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Source of candidate credential values.
pub trait CredentialGenerator: Send + Sync {
    fn generate(&self, kind: CredentialKind) -> String;
}

/// Generator backed by the operating system's CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCredentialGenerator;

impl CredentialGenerator for RandomCredentialGenerator {
    fn generate(&self, kind: CredentialKind) -> String {
        match kind {
            CredentialKind::LicenseKey => {
                let mut rng = OsRng;
                (0..LICENSE_KEY_GROUPS)
                    .map(|_| {
                        (0..LICENSE_KEY_GROUP_LEN)
                            .map(|_| {
                                let idx = rng.gen_range(0..LICENSE_KEY_ALPHABET.len());
                                LICENSE_KEY_ALPHABET[idx] as char
                            })
                            .collect::<String>()
                    })
                    .collect::<Vec<_>>()
                    .join("-")
            }
            // Callers never ask for `None`; an api-key shaped token is harmless.
            CredentialKind::ApiKey | CredentialKind::None => {
                let mut bytes = [0u8; API_KEY_BYTES];
                OsRng.fill_bytes(&mut bytes);
                hex::encode(bytes)
            }
        }
    }
}

/// Issues credentials that no other record currently holds.
pub struct CredentialManager {
    repository: Arc<dyn PurchaseRepository>,
    generator: Arc<dyn CredentialGenerator>,
    max_attempts: u32,
}

impl CredentialManager {
    pub fn new(repository: Arc<dyn PurchaseRepository>, max_attempts: u32) -> Self {
        Self {
            repository,
            generator: Arc::new(RandomCredentialGenerator),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Replaces the random source (deterministic values in tests).
    pub fn with_generator(mut self, generator: Arc<dyn CredentialGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Generates a value for `kind` that no record other than `excluding`
    /// holds.
    ///
    /// # Errors
    ///
    /// - `CredentialGenerationExhausted` once `max_attempts` candidates collided
    /// - `Storage` if the collision check itself fails
    pub async fn generate_unique_key(
        &self,
        kind: CredentialKind,
        excluding: Option<&PurchaseId>,
    ) -> Result<String, PurchaseError> {
        for attempt in 1..=self.max_attempts {
            let candidate = self.generator.generate(kind);
            let taken = self
                .repository
                .credential_in_use(kind, &candidate, excluding)
                .await?;
            if !taken {
                return Ok(candidate);
            }
            tracing::debug!(attempt, kind = kind.as_str(), "credential candidate collided");
        }

        tracing::error!(
            attempts = self.max_attempts,
            kind = kind.as_str(),
            "credential generation exhausted"
        );
        Err(PurchaseError::CredentialGenerationExhausted {
            attempts: self.max_attempts,
        })
    }
}
