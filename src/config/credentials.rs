//! Credential generation settings

use serde::Deserialize;

use super::error::ValidationError;
use crate::application::credentials::DEFAULT_MAX_ATTEMPTS;

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    /// Collision retries before giving up on a fresh key
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl CredentialsConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 || self.max_attempts > 100 {
            return Err(ValidationError::InvalidCredentialAttempts);
        }
        Ok(())
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
