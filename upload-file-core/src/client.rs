//! # client: the security agent API client
//!
//! [`SecurityAgentClient`] implements [`Uploader`] against the real backend:
//!
//! 1. one GraphQL query exchanges a destination path for a presigned URL and its expiry,
//! 2. one HTTP `PUT` sends the whole file to that URL.
//!
//! The `Authorization` header carries the raw API key, without a `Bearer` prefix.
//!
//! Files are read fully into memory before the PUT, so the usable size is bounded by
//! available memory. That is fine for scan reports and metadata documents.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::contract::{PresignedUpload, UploadRequest, Uploader};
use crate::error::UploadError;
use crate::paths;

pub const DEFAULT_API_ENDPOINT: &str = "https://security-agent.ddn.pro.hasura.io/graphql";

/// Ceiling for the GraphQL exchange.
pub const PRESIGN_TIMEOUT: Duration = Duration::from_secs(30);

/// Ceiling for the PUT transfer.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const PRESIGNED_UPLOAD_QUERY: &str = r#"
query UploadFile($name: String!) {
  storage_presigned_upload_url(name: $name) {
    url
    expired_at
  }
}
"#;

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: PresignVariables<'a>,
}

#[derive(Serialize)]
struct PresignVariables<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct PresignedUploadData {
    storage_presigned_upload_url: Option<PresignedUploadUrl>,
}

#[derive(Deserialize)]
struct PresignedUploadUrl {
    url: String,
    expired_at: DateTime<Utc>,
}

/// Client for the security agent API and the storage it presigns URLs for.
///
/// Holds the endpoint, the credential and one connection pool shared by every call.
pub struct SecurityAgentClient {
    endpoint: String,
    api_key: String,
    http: reqwest::Client,
    presign_timeout: Duration,
    transfer_timeout: Duration,
}

impl SecurityAgentClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, UploadError> {
        let endpoint = endpoint.into();
        let http = reqwest::Client::builder().build()?;
        info!(endpoint = %endpoint, "Initialised security agent client");
        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            http,
            presign_timeout: PRESIGN_TIMEOUT,
            transfer_timeout: TRANSFER_TIMEOUT,
        })
    }

    /// Override the default timeout ceilings.
    pub fn with_timeouts(mut self, presign: Duration, transfer: Duration) -> Self {
        self.presign_timeout = presign;
        self.transfer_timeout = transfer;
        self
    }

    /// Refuse a presigned URL whose expiry has already passed.
    ///
    /// Storage checks the signature when the request starts, so a transfer that begins
    /// in time may run past `expires_at`.
    fn ensure_not_expired(presigned: &PresignedUpload) -> Result<(), UploadError> {
        if presigned.expires_at <= Utc::now() {
            error!(
                expires_at = %presigned.expires_at,
                "Presigned URL already expired before transfer"
            );
            return Err(UploadError::PresignExpired {
                expired_at: presigned.expires_at,
            });
        }
        Ok(())
    }

    async fn raw_upload(
        &self,
        url: &str,
        content_type: &str,
        content: Vec<u8>,
    ) -> Result<(), UploadError> {
        let response = self
            .http
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, content.len())
            .timeout(self.transfer_timeout)
            .body(content)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "PUT to presigned URL failed");
                UploadError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<failed to read response body>"));
            error!(status = %status, body = %body, "Storage rejected the upload");
            return Err(UploadError::Upload {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Uploader for SecurityAgentClient {
    async fn presigned_upload_url(
        &self,
        destination: &str,
    ) -> Result<PresignedUpload, UploadError> {
        debug!(destination, "Requesting presigned upload URL");
        let request = GraphQlRequest {
            query: PRESIGNED_UPLOAD_QUERY,
            variables: PresignVariables { name: destination },
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, self.api_key.as_str())
            .timeout(self.presign_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| UploadError::Presign(format!("GraphQL request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| {
                UploadError::Presign(format!("failed to read GraphQL response: {e}"))
            })?;
        if !status.is_success() {
            return Err(UploadError::Presign(format!(
                "GraphQL endpoint returned status {status}: {body}"
            )));
        }

        let decoded: GraphQlResponse<PresignedUploadData> = serde_json::from_str(&body)
            .map_err(|e| {
                error!(error = ?e, body = %body, "Failed to decode GraphQL response");
                UploadError::Presign(format!("unexpected GraphQL response: {e}"))
            })?;

        if let Some(errors) = decoded.errors.filter(|errors| !errors.is_empty()) {
            let messages = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(UploadError::Presign(format!("GraphQL errors: {messages}")));
        }

        let presigned = decoded
            .data
            .and_then(|data| data.storage_presigned_upload_url)
            .filter(|presigned| !presigned.url.is_empty())
            .ok_or_else(|| {
                error!(body = %body, "Empty presigned URL received");
                UploadError::Presign("empty presigned URL received from API".to_string())
            })?;

        info!(destination, expires_at = %presigned.expired_at, "Presigned URL expires at");
        Ok(PresignedUpload {
            url: presigned.url,
            expires_at: presigned.expired_at,
        })
    }

    async fn put_file(&self, request: UploadRequest) -> Result<(), UploadError> {
        let UploadRequest {
            source_path,
            destination,
        } = request;

        let metadata = match tokio::fs::metadata(&source_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploadError::FileNotFound(source_path));
            }
            Err(e) => return Err(e.into()),
        };
        let content_type = paths::content_type(&source_path);
        info!(
            file = %source_path.display(),
            size_bytes = metadata.len(),
            destination = %destination,
            content_type,
            "Uploading file"
        );

        let content = tokio::fs::read(&source_path).await?;
        let presigned = self.presigned_upload_url(&destination).await?;
        Self::ensure_not_expired(&presigned)?;

        debug!(destination = %destination, "Got presigned URL, uploading file");
        self.raw_upload(&presigned.url, content_type, content).await?;

        info!(destination = %destination, "File uploaded successfully");
        Ok(())
    }
}
