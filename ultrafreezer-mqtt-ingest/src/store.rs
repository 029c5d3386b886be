use reqwest::{Client, StatusCode};

use crate::config::StoreConfig;
use crate::point::StoredPoint;

#[derive(Debug, thiserror::Error)]
pub enum StoreWriteError {
    #[error("request to the store failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("the store answered {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// A time-series store accepting one point at a time.
#[async_trait::async_trait]
pub trait PointStore: Send + Sync {
    /// Check that the store is reachable and ready to accept writes.
    async fn health(&self) -> Result<(), StoreWriteError>;

    async fn write(&self, point: &StoredPoint) -> Result<(), StoreWriteError>;
}

/// InfluxDB v2 over HTTP, through a single long-lived client.
pub struct InfluxStore {
    client: Client,
    health_url: String,
    write_url: String,
    authorization: String,
    org: String,
    bucket: String,
}

impl InfluxStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreWriteError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let base = config.url.trim_end_matches('/');

        Ok(Self {
            client,
            health_url: format!("{}/health", base),
            write_url: format!("{}/api/v2/write", base),
            authorization: format!("Token {}", config.token),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
        })
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<(), StoreWriteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreWriteError::Rejected { status, body })
}

#[async_trait::async_trait]
impl PointStore for InfluxStore {
    async fn health(&self) -> Result<(), StoreWriteError> {
        let response = self.client.get(&self.health_url).send().await?;
        ensure_success(response).await
    }

    async fn write(&self, point: &StoredPoint) -> Result<(), StoreWriteError> {
        let response = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "s"),
            ])
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(point.to_line_protocol())
            .send()
            .await?;
        ensure_success(response).await
    }
}
