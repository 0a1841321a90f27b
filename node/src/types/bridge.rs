use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::assets::Link;
use crate::types::job_spec::TaskType;

/// An externally registered HTTP adapter, addressed by its case-insensitive
/// name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BridgeType {
    pub name: TaskType,
    pub url: Url,
    /// sent as a bearer token on every call to the bridge
    pub outgoing_token: String,
    /// overrides the node wide floor when set
    pub minimum_contract_payment: Option<Link>,
}

impl BridgeType {
    pub fn new(name: TaskType, url: Url, outgoing_token: impl Into<String>) -> Self {
        Self { name, url, outgoing_token: outgoing_token.into(), minimum_contract_payment: None }
    }

    pub fn with_minimum_contract_payment(mut self, payment: Link) -> Self {
        self.minimum_contract_payment = Some(payment);
        self
    }
}
