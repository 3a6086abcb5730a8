//! HTTP client for the campaign system's REST API.

use async_trait::async_trait;
use reqwest::{IntoUrl, Method, RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info};

use super::{CampaignSystemStatus, ExternalCampaignSystem};
use crate::approvals::{ApprovalRequest, Approver};
use crate::campaign::model::Campaign;
use crate::config::ApiConfig;
use crate::error::ExternalError;
use crate::phone::normalize_phone;

#[derive(Debug, Serialize)]
struct StatusChangeRequest {
    status: CampaignSystemStatus,
}

#[derive(Debug, Serialize)]
struct ApprovalResponse<'a> {
    status: CampaignSystemStatus,
    approvers: Vec<&'a str>,
}

/// Bearer-authenticated client for the campaign system.
pub struct CampaignSystemClient {
    base_url: String,
    secret: SecretString,
    client: reqwest::Client,
}

impl CampaignSystemClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            base_url: config.base_url,
            secret: config.secret,
            client: reqwest::Client::new(),
        }
    }

    /// Whether a secret is configured for authenticated calls.
    pub fn is_secured(&self) -> bool {
        !self.secret.expose_secret().is_empty()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_to(method, format!("{}{path}", self.base_url))
    }

    fn request_to(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Content-Type", "application/json")
            .bearer_auth(self.secret.expose_secret())
    }

    /// `{base}/users/subscriptions/{email}` with the email as one escaped
    /// path segment.
    fn subscription_url(&self, email: &str) -> Result<Url, ExternalError> {
        let invalid = |reason: String| ExternalError::RequestFailed {
            endpoint: "/users/subscriptions".to_string(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(["users", "subscriptions", email]);
        Ok(url)
    }

    /// Send a request and turn transport failures and non-2xx statuses into
    /// typed errors.
    async fn execute(
        &self,
        builder: RequestBuilder,
        endpoint: &str,
    ) -> Result<reqwest::Response, ExternalError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ExternalError::RequestFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        info!(endpoint, status = status.as_u16(), "Campaign system call");

        if !status.is_success() {
            return Err(ExternalError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn change_subscriptions(
        &self,
        method: Method,
        emails: &[String],
    ) -> Result<(), ExternalError> {
        for email in emails {
            let url = self.subscription_url(email)?;
            let endpoint = url.path().to_string();
            self.execute(self.request_to(method.clone(), url), &endpoint)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ExternalCampaignSystem for CampaignSystemClient {
    async fn campaign_completed(
        &self,
        status: CampaignSystemStatus,
        campaign: &Campaign,
    ) -> Result<(), ExternalError> {
        let path = format!("/campaigns/{}", campaign.id);
        let body = StatusChangeRequest { status };
        self.execute(self.request(Method::PUT, &path).json(&body), &path)
            .await?;
        Ok(())
    }

    async fn get_all_approvers(&self) -> Result<Vec<Approver>, ExternalError> {
        let path = "/approvers";
        let response = self.execute(self.request(Method::GET, path), path).await?;

        let mut approvers: Vec<Approver> =
            response
                .json()
                .await
                .map_err(|e| ExternalError::InvalidResponse {
                    endpoint: path.to_string(),
                    reason: e.to_string(),
                })?;

        for approver in &mut approvers {
            approver.phone_number = normalize_phone(&approver.phone_number);
        }
        debug!(count = approvers.len(), "Fetched approver roster");
        Ok(approvers)
    }

    async fn approve_campaign(
        &self,
        request: &ApprovalRequest,
        approver: &Approver,
    ) -> Result<(), ExternalError> {
        let path = format!("/campaigns/{}", request.id);
        let body = ApprovalResponse {
            status: CampaignSystemStatus::Ready,
            approvers: vec![approver.id.as_str()],
        };
        self.execute(self.request(Method::PUT, &path).json(&body), &path)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, emails: &[String]) -> Result<(), ExternalError> {
        self.change_subscriptions(Method::POST, emails).await
    }

    async fn unsubscribe(&self, emails: &[String]) -> Result<(), ExternalError> {
        self.change_subscriptions(Method::DELETE, emails).await
    }
}
