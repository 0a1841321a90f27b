use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::AdapterError;
use crate::core::config::Config;
use crate::types::assets::Link;
use crate::types::bridge::BridgeType;
use crate::types::run_result::{RunInput, RunOutput};
use crate::utils::json::merge;

/// A resolved external adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Bridge {
    pub bridge_type: BridgeType,
    pub min_payment: Link,
}

#[derive(Serialize, Debug)]
struct BridgeRequest<'a> {
    id: Uuid,
    data: &'a Value,
}

#[derive(Deserialize, Debug, Default)]
struct BridgeResponse {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    pending: bool,
}

impl Bridge {
    /// POSTs the run input to the bridge and merges whatever data comes back
    /// into it. A resumed pending task asks the bridge again.
    pub(super) async fn perform(&self, input: &RunInput, config: &Config) -> Result<RunOutput, AdapterError> {
        let name = self.bridge_type.name.to_string();
        debug!(bridge = %name, url = %self.bridge_type.url, run_id = %input.job_run_id, "Calling bridge");

        let response = config
            .http_client()
            .post(self.bridge_type.url.clone())
            .bearer_auth(&self.bridge_type.outgoing_token)
            .timeout(config.params().bridge_response_timeout)
            .json(&BridgeRequest { id: input.job_run_id, data: &input.data })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::BridgeStatus { name, status: status.as_u16() });
        }

        let body: BridgeResponse = response.json().await?;
        if let Some(error) = body.error.filter(|e| !e.is_empty()) {
            return Ok(RunOutput::error(error));
        }
        let data = merge(&input.data, &body.data);
        Ok(if body.pending { RunOutput::pending(data) } else { RunOutput::complete(data) })
    }
}
