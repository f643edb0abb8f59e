use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::modules::appointment::schema::{AppointmentLookup, AppointmentStatusReport};
use crate::modules::session::model::TokenPair;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("portal returned status: {0}")]
    Api(StatusCode),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ApiError {
    /// Everything but a rejected refresh token is worth retrying.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidRefreshToken)
    }
}

/// The two read operations this runtime consumes. The backend defines them;
/// tests substitute a scripted implementation.
#[async_trait]
pub trait PortalApi: Send + Sync {
    async fn check_appointment_status(
        &self,
        appointment_id: &str,
    ) -> Result<AppointmentLookup, ApiError>;

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
}

/// Portal REST API client
/// Handles all communication with the portal backend.
pub struct PortalClient {
    client: Client,
    base_url: String,
}

impl PortalClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PortalApi for PortalClient {
    async fn check_appointment_status(
        &self,
        appointment_id: &str,
    ) -> Result<AppointmentLookup, ApiError> {
        let url = format!("{}/appointments/{}/status", self.base_url, appointment_id);

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(AppointmentLookup::NotFound);
        }
        if !response.status().is_success() {
            return Err(ApiError::Api(response.status()));
        }

        let body: serde_json::Value = response.json().await?;

        // Some deployments report a not-yet-visible appointment in the body
        // rather than as a 404.
        if body.get("status").and_then(|s| s.as_str()) == Some("not_found") {
            return Ok(AppointmentLookup::NotFound);
        }

        let report: AppointmentStatusReport = serde_json::from_value(body)?;
        Ok(AppointmentLookup::Found(report))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let url = format!("{}/auth/refresh", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "refreshToken": refresh_token }))
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(ApiError::InvalidRefreshToken);
        }
        if !response.status().is_success() {
            return Err(ApiError::Api(response.status()));
        }

        Ok(response.json().await?)
    }
}
