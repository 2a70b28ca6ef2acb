use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use tokio_util::io::StreamReader;

use super::auth::{AuthSession, KeystoneAuth};
use super::types::{
    container_metadata_from_headers, container_metadata_headers, encode_key, listing_query,
    object_metadata_from_headers, BulkDeleteResponse, ListingEntry, AUTH_TOKEN_HEADER,
    LISTING_PAGE_SIZE,
};
use crate::credential::Credential;
use crate::error::DriverError;
use crate::storage::{
    BackendBox, BackendFactory, ContainerItem, ContainerMetadata, FilterSpec, ObjectMetadata,
    ObjectReader, ObjectStorageBackend,
};

/// Objects per bulk-delete request (Swift's default `max_deletes_per_request`)
const BULK_DELETE_BATCH: usize = 10_000;

/// OpenStack Swift backend / Swift 对象存储后端
pub struct SwiftBackend {
    client: Client,
    auth: KeystoneAuth,
}

impl SwiftBackend {
    pub fn new(credential: Credential) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("objectstorage-fs/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            auth: KeystoneAuth::new(client.clone(), credential),
            client,
        })
    }

    fn container_endpoint(session: &AuthSession, container: &str) -> String {
        format!("{}/{}", session.storage_url, urlencoding::encode(container))
    }

    fn object_endpoint(session: &AuthSession, container: &str, key: &str) -> String {
        format!("{}/{}", Self::container_endpoint(session, container), encode_key(key))
    }

    /// Authenticated request; a 401 drops the cached session for the next call
    async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: FnOnce(&Client, &AuthSession) -> RequestBuilder,
    {
        let session = self.auth.session().await?;
        let response = build(&self.client, &session)
            .header(AUTH_TOKEN_HEADER, &session.token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.auth.invalidate().await;
            return Err(anyhow!("Swift rejected the auth token (HTTP 401)"));
        }
        Ok(response)
    }

    async fn expect_success(response: Response, action: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(anyhow!("Swift {} failed: HTTP {} - {}", action, status, text))
    }

    async fn head_object(&self, container: &str, key: &str) -> Result<Option<Response>> {
        let response = self
            .send(|client, session| {
                client.head(Self::object_endpoint(session, container, key))
            })
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::expect_success(response, "HEAD object").await.map(Some)
    }
}

#[async_trait]
impl ObjectStorageBackend for SwiftBackend {
    fn name(&self) -> &str {
        "swift"
    }

    async fn container_url(&self, container: &str) -> Result<String> {
        let session = self.auth.session().await?;
        Ok(Self::container_endpoint(&session, container))
    }

    async fn list_container(&self, container: &str, filter: &FilterSpec) -> Result<Vec<ContainerItem>> {
        let mut items = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page_size = match filter.take_limit {
                Some(limit) => (limit - items.len()).min(LISTING_PAGE_SIZE),
                None => LISTING_PAGE_SIZE,
            };
            let query = listing_query(filter, page_size, marker.as_deref());

            let response = self
                .send(|client, session| {
                    client
                        .get(Self::container_endpoint(session, container))
                        .query(&query)
                })
                .await?;

            if response.status() == StatusCode::NOT_FOUND {
                tracing::debug!("Swift list: container not found: {}", container);
                return Ok(items);
            }

            let response = Self::expect_success(response, "list").await?;
            let entries: Vec<ListingEntry> = if response.status() == StatusCode::NO_CONTENT {
                Vec::new()
            } else {
                response.json().await.context("Invalid Swift listing")?
            };

            let page_len = entries.len();
            marker = entries.last().map(|entry| entry.marker().to_string());
            items.extend(entries.into_iter().map(ContainerItem::from));

            let limit_reached = filter.take_limit.map_or(false, |limit| items.len() >= limit);
            if page_len < page_size || limit_reached {
                break;
            }
        }

        tracing::debug!("Swift list {}: {} items", container, items.len());
        Ok(items)
    }

    async fn object_exists(&self, container: &str, key: &str) -> Result<bool> {
        Ok(self.head_object(container, key).await?.is_some())
    }

    async fn read_object(&self, container: &str, key: &str) -> Result<ObjectReader> {
        let response = self
            .send(|client, session| client.get(Self::object_endpoint(session, container, key)))
            .await?;
        let response = Self::expect_success(response, "GET object").await?;

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(Box::new(StreamReader::new(stream)))
    }

    async fn write_object(&self, container: &str, key: &str, data: Bytes) -> Result<()> {
        let size = data.len();
        let response = self
            .send(move |client, session| {
                client
                    .put(Self::object_endpoint(session, container, key))
                    .header("Content-Length", size.to_string())
                    .body(data)
            })
            .await?;
        Self::expect_success(response, "PUT object").await?;

        tracing::debug!("Swift upload: {}/{} ({} bytes)", container, key, size);
        Ok(())
    }

    async fn delete_object(&self, container: &str, key: &str) -> Result<()> {
        let response = self
            .send(|client, session| client.delete(Self::object_endpoint(session, container, key)))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::expect_success(response, "DELETE object").await?;
        Ok(())
    }

    async fn delete_objects(&self, container: &str, keys: Vec<String>) -> Result<()> {
        for batch in keys.chunks(BULK_DELETE_BATCH) {
            let body = batch
                .iter()
                .map(|key| format!("/{}/{}", urlencoding::encode(container), encode_key(key)))
                .collect::<Vec<_>>()
                .join("\n");

            let response = self
                .send(|client, session| {
                    client
                        .request(Method::POST, format!("{}?bulk-delete", session.storage_url))
                        .header("Content-Type", "text/plain")
                        .header("Accept", "application/json")
                        .body(body)
                })
                .await?;
            let response = Self::expect_success(response, "bulk delete").await?;
            let result: BulkDeleteResponse = response.json().await.context("Invalid bulk delete response")?;

            if !result.errors.is_empty() {
                return Err(anyhow!(
                    "Swift bulk delete partially failed ({}): {:?}",
                    result.response_status,
                    result.errors
                ));
            }
            tracing::debug!(
                "Swift bulk delete in {}: {} deleted, {} not found",
                container,
                result.number_deleted,
                result.number_not_found
            );
        }
        Ok(())
    }

    async fn read_object_metadata(&self, container: &str, key: &str) -> Result<ObjectMetadata> {
        Ok(self
            .head_object(container, key)
            .await?
            .map(|response| object_metadata_from_headers(response.headers()))
            .unwrap_or_default())
    }

    async fn read_container_metadata(&self, container: &str) -> Result<ContainerMetadata> {
        let response = self
            .send(|client, session| client.head(Self::container_endpoint(session, container)))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(ContainerMetadata::default());
        }
        let response = Self::expect_success(response, "HEAD container").await?;
        Ok(container_metadata_from_headers(response.headers()))
    }

    /// PUT creates the container when missing and updates its metadata otherwise
    async fn save_container_metadata(&self, container: &str, metadata: &ContainerMetadata) -> Result<()> {
        let headers = container_metadata_headers(metadata);
        let response = self
            .send(|client, session| {
                headers.iter().fold(
                    client.put(Self::container_endpoint(session, container)),
                    |request, (name, value)| request.header(*name, value),
                )
            })
            .await?;
        Self::expect_success(response, "PUT container").await?;

        tracing::info!("Swift container metadata saved: {}", container);
        Ok(())
    }
}

/// Swift backend factory / Swift 后端工厂
pub struct SwiftBackendFactory;

impl BackendFactory for SwiftBackendFactory {
    fn backend_type(&self) -> &'static str {
        "swift"
    }

    fn create_backend(&self, credential: &Credential) -> crate::error::Result<BackendBox> {
        if credential.url_base.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(DriverError::InvalidConfiguration(
                "connection string has no urlBase".to_string(),
            ));
        }
        if credential.username.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(DriverError::InvalidConfiguration(
                "connection string has no username".to_string(),
            ));
        }

        Ok(Arc::new(SwiftBackend::new(credential.clone())?))
    }
}
