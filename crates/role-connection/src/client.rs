//! Role Connection HTTP Client Implementation
//!
//! PUTs metadata to `{base_url}/users/{user_id}/role-connection` using the
//! linked-roles body shape, where every metadata value is a string.

use serde::Serialize;

use crate::{RoleConnectionConfig, RoleConnectionError, RoleConnectionMetadata, RoleConnectionService};

#[derive(Debug, Serialize)]
struct RoleConnectionBody<'a> {
    platform_name: &'a str,
    metadata: WireMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct WireMetadata<'a> {
    member: String,
    expiry: &'a str,
}

/// Real role connection client.
pub struct RoleConnectionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    platform_name: String,
}

impl RoleConnectionClient {
    /// Create a new client from configuration.
    pub fn new(config: RoleConnectionConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url,
            api_key: config.api_key,
            platform_name: config.platform_name,
        }
    }

    fn connection_url(&self, user_id: &str) -> Result<reqwest::Url, RoleConnectionError> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            RoleConnectionError::Configuration(format!("Invalid ROLE_CONNECTION_BASE_URL: {}", e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                RoleConnectionError::Configuration(
                    "ROLE_CONNECTION_BASE_URL cannot be a base URL".to_string(),
                )
            })?
            .pop_if_empty()
            .extend(["users", user_id, "role-connection"]);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl RoleConnectionService for RoleConnectionClient {
    async fn push_metadata(
        &self,
        user_id: &str,
        metadata: &RoleConnectionMetadata,
    ) -> Result<(), RoleConnectionError> {
        let url = self.connection_url(user_id)?;
        let body = RoleConnectionBody {
            platform_name: &self.platform_name,
            metadata: WireMetadata {
                member: metadata.member.to_string(),
                expiry: &metadata.expiry,
            },
        };

        let response = self
            .http
            .put(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RoleConnectionError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read response body".to_string());
            return Err(RoleConnectionError::Response(format!(
                "Role connection API returned {}: {}",
                status, body
            )));
        }

        tracing::debug!(user_id = %user_id, member = metadata.member, "Role connection metadata pushed");
        Ok(())
    }
}
