use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// A third party allowed to trigger runs of jobs with an `external`
/// initiator. Only a salted hash of its secret is stored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalInitiator {
    pub id: Uuid,
    pub name: String,
    pub url: Option<Url>,
    pub access_key: String,
    pub salt: String,
    pub hashed_secret: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ExternalInitiator {
    pub fn new(name: String, url: Option<Url>, access_key: String, salt: String, hashed_secret: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            url,
            access_key,
            salt,
            hashed_secret,
            created_at: Utc::now().round_subsecs(0),
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Credentials handed back exactly once, when the initiator is created.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalInitiatorCredentials {
    pub name: String,
    pub access_key: String,
    pub secret: String,
}
