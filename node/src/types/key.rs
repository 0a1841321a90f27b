use alloy_primitives::Address;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// A signing account known to the database. The key material itself stays
/// in the key store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

impl Key {
    pub fn new(address: Address) -> Self {
        Self { address, created_at: Utc::now().round_subsecs(0) }
    }
}
