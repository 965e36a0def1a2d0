//! HTTP object store
//!
//! Talks to an S3-compatible endpoint with plain `HEAD` and `PUT` requests against
//! `<endpoint>/<bucket>/<prefix>/<key>`. Authentication, when configured, is a bearer token.

use super::{prefixed_key, ObjectStore};
use crate::error::StoreError;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT_SECS: u64 = 300;

pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
    prefix: Option<String>,
    token: Option<String>,
    public: bool,
}

impl HttpObjectStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            prefix,
            token: None,
            public: false,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Mark uploaded objects world-readable
    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket.trim_matches('/'),
            prefixed_key(self.prefix.as_deref(), key)
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let url = self.object_url(key);
        let response = self
            .authorize(self.client.head(&url))
            .send()
            .await
            .map_err(|source| StoreError::Http {
                key: key.to_string(),
                source,
            })?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StoreError::transient(
                key,
                format!("unexpected status {} for HEAD {}", status, url),
            )),
        }
    }

    async fn upload(&self, local: &Path, key: &str) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        let file = tokio::fs::File::open(local).await.map_err(io_err)?;
        let length = file.metadata().await.map_err(io_err)?.len();

        let url = self.object_url(key);
        debug!(url = %url, bytes = length, "PUT archive");
        let mut request = self
            .authorize(self.client.put(&url))
            .header(header::CONTENT_LENGTH, length)
            .header(header::CONTENT_TYPE, "application/x-tar")
            .body(reqwest::Body::from(file));
        if self.public {
            request = request.header("x-amz-acl", "public-read");
        }

        let response = request.send().await.map_err(|source| StoreError::Http {
            key: key.to_string(),
            source,
        })?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(StoreError::transient(
                key,
                format!("unexpected status {} for PUT {}", status, url),
            ))
        }
    }
}
