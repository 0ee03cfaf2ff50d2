use std::time::Duration;

use reqwest::{StatusCode, Url};
use thiserror::Error;
use tracing::{error, info};

/// Fixed deadline for one SQL round trip.
pub const SQL_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("invalid json body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Thin client for the CartoDB SQL API.
#[derive(Clone)]
pub struct SqlGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl SqlGateway {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, SqlError> {
        Self::with_deadline(endpoint, SQL_DEADLINE)
    }

    pub(crate) fn with_deadline(endpoint: impl Into<String>, deadline: Duration) -> Result<Self, SqlError> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .timeout(deadline)
            .build()?;
        Ok(Self { client, endpoint: endpoint.into() })
    }

    /// Runs `query` and returns the parsed body. Only a 200 counts as success.
    pub async fn try_execute(&self, query: &str) -> Result<serde_json::Value, SqlError> {
        let url = Url::parse_with_params(&self.endpoint, &[("q", query)])?;
        info!(%url, "CartoDB query");

        let resp = self.client.get(url).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(SqlError::Status(resp.status()));
        }

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Same as [`try_execute`](Self::try_execute) but every failure is logged and
    /// turned into `None`, so an empty answer and a dead endpoint look alike to the caller.
    pub async fn execute(&self, query: &str) -> Option<serde_json::Value> {
        match self.try_execute(query).await {
            Ok(body) => Some(body),
            Err(e) => {
                error!(error = %e, query, "CartoDB SQL API error");
                None
            }
        }
    }
}
