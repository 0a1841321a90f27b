pub mod error;

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha3::{Digest, Sha3_256};
use tracing::info;
use url::Url;

use crate::core::client::database::{DatabaseError, QueryMode};
use crate::core::config::Config;
use crate::types::external_initiator::{ExternalInitiator, ExternalInitiatorCredentials};
pub use error::ExternalInitiatorError;

const TOKEN_LENGTH: usize = 32;

/// Registration and authentication of external initiators.
pub struct ExternalInitiators {
    config: Arc<Config>,
}

impl ExternalInitiators {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Registers an initiator and hands back its credentials. The secret is
    /// never stored, so this is the only time it can be read.
    pub async fn create(
        &self,
        name: &str,
        url: Option<&str>,
    ) -> Result<ExternalInitiatorCredentials, ExternalInitiatorError> {
        if !self.config.params().external_initiators_enabled() {
            return Err(ExternalInitiatorError::FeatureDisabled);
        }
        validate_name(name)?;
        let url = url.map(parse_url).transpose()?;

        let database = self.config.database();
        match database.find_external_initiator_by_name(name, QueryMode::Scoped).await {
            Ok(_) => return Err(ExternalInitiatorError::NameTaken(name.to_string())),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        let access_key = new_token();
        let secret = new_token();
        let salt = new_token();
        let hashed_secret = hash_secret(&secret, &salt);
        let initiator = ExternalInitiator::new(name.to_string(), url, access_key.clone(), salt, hashed_secret);

        match database.create_external_initiator(initiator).await {
            Ok(initiator) => {
                info!(name = %initiator.name, id = %initiator.id, "Created external initiator");
                Ok(ExternalInitiatorCredentials { name: initiator.name, access_key, secret })
            }
            Err(DatabaseError::Duplicate(_)) => Err(ExternalInitiatorError::NameTaken(name.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    /// Soft deletes an initiator. Unscoped lookups still find it.
    pub async fn destroy(&self, name: &str) -> Result<(), ExternalInitiatorError> {
        if !self.config.params().dev {
            return Err(ExternalInitiatorError::DevModeOnly);
        }
        match self.config.database().delete_external_initiator(name).await {
            Ok(()) => {
                info!(name, "Deleted external initiator");
                Ok(())
            }
            Err(err) if err.is_not_found() => Err(ExternalInitiatorError::NotFound(name.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    /// Resolves the live initiator owning these credentials.
    pub async fn authenticate(
        &self,
        access_key: &str,
        secret: &str,
    ) -> Result<ExternalInitiator, ExternalInitiatorError> {
        let initiator = match self.config.database().find_external_initiator(access_key, QueryMode::Scoped).await {
            Ok(initiator) => initiator,
            Err(err) if err.is_not_found() => return Err(ExternalInitiatorError::Unauthorized),
            Err(err) => return Err(err.into()),
        };
        if hash_secret(secret, &initiator.salt) != initiator.hashed_secret {
            return Err(ExternalInitiatorError::Unauthorized);
        }
        Ok(initiator)
    }
}

/// Hex encoded `sha3_256("v0-{salt}-{secret}")`.
pub fn hash_secret(secret: &str, salt: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(format!("v0-{salt}-{secret}").as_bytes());
    hex::encode(hasher.finalize())
}

fn new_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(TOKEN_LENGTH).map(char::from).collect()
}

fn validate_name(name: &str) -> Result<(), ExternalInitiatorError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ExternalInitiatorError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn parse_url(url: &str) -> Result<Url, ExternalInitiatorError> {
    let parsed =
        Url::parse(url).map_err(|e| ExternalInitiatorError::InvalidUrl { url: url.to_string(), message: e.to_string() })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ExternalInitiatorError::InvalidUrl {
            url: url.to_string(),
            message: "scheme must be http or https".to_string(),
        });
    }
    Ok(parsed)
}
