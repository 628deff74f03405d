//! HTTP client for the automation backend.

use crate::catalog::{BlockCatalog, BlockDefinition, BlockSchema};
use crate::config::EditorConfig;
use crate::error::{ApiError, FetchError};
use crate::schema::BlockCategory;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

mod playground;
mod user_defined;

pub use playground::{ExecuteRequest, ExecuteResponse};
pub use user_defined::{UserDefinedBlock, UserDefinedKind};

/// Catalog listings come either wrapped in `{"types": [...]}` or bare.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogResponse {
    Wrapped { types: Vec<BlockDefinition> },
    Bare(Vec<BlockDefinition>),
}

impl CatalogResponse {
    fn into_definitions(self) -> Vec<BlockDefinition> {
        match self {
            CatalogResponse::Wrapped { types } => types,
            CatalogResponse::Bare(types) => types,
        }
    }
}

/// Client for the block catalog, playground and user-defined block endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &EditorConfig) -> Result<Self, FetchError> {
        let invalid = |message: String| FetchError::Transport {
            url: config.api_base_url.clone(),
            message,
        };
        let base_url = Url::parse(&config.api_base_url).map_err(|e| invalid(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("base URL cannot carry a path".to_string()));
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| invalid(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// The endpoint under the base URL made of `segments`. Each segment is
    /// percent-encoded, so names cannot reach into other routes.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<T, FetchError> {
        let response = request.send().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.json::<T>().await.map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn send_empty(&self, request: RequestBuilder, url: &str) -> Result<(), FetchError> {
        let response = request.send().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    /// Runs an automation in the backend playground.
    pub async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResponse, FetchError> {
        let url = self.url(&["playground", "execute"]);
        debug!(%url, format = %request.format, "executing automation");
        self.send(self.client.post(url.clone()).json(request), url.as_str()).await
    }

    pub async fn list_user_defined(
        &self,
        kind: UserDefinedKind,
    ) -> Result<Vec<UserDefinedBlock>, FetchError> {
        let url = self.url(&["user-defined", kind.segment()]);
        self.send(self.client.get(url.clone()), url.as_str()).await
    }

    pub async fn get_user_defined(
        &self,
        kind: UserDefinedKind,
        name: &str,
    ) -> Result<UserDefinedBlock, FetchError> {
        let url = self.url(&["user-defined", kind.segment(), name]);
        self.send(self.client.get(url.clone()), url.as_str()).await
    }

    /// Registers a new definition. Definitions without a name are rejected
    /// before any request is made.
    pub async fn create_user_defined(
        &self,
        kind: UserDefinedKind,
        block: &UserDefinedBlock,
    ) -> Result<UserDefinedBlock, ApiError> {
        block.validate()?;
        let url = self.url(&["user-defined", kind.segment()]);
        Ok(self
            .send(self.client.post(url.clone()).json(block), url.as_str())
            .await?)
    }

    pub async fn update_user_defined(
        &self,
        kind: UserDefinedKind,
        block: &UserDefinedBlock,
    ) -> Result<UserDefinedBlock, ApiError> {
        block.validate()?;
        let url = self.url(&["user-defined", kind.segment(), block.name.as_str()]);
        Ok(self
            .send(self.client.put(url.clone()).json(block), url.as_str())
            .await?)
    }

    pub async fn delete_user_defined(
        &self,
        kind: UserDefinedKind,
        name: &str,
    ) -> Result<(), FetchError> {
        let url = self.url(&["user-defined", kind.segment(), name]);
        self.send_empty(self.client.delete(url.clone()), url.as_str()).await
    }
}

#[async_trait]
impl BlockCatalog for ApiClient {
    async fn list_blocks(
        &self,
        category: BlockCategory,
        include_schema: bool,
    ) -> Result<Vec<BlockDefinition>, FetchError> {
        let url = self.url(&["block", category.tag()]);
        debug!(%url, include_schema, "fetching block catalog");
        let request = self
            .client
            .get(url.clone())
            .query(&[("includeSchema", include_schema)]);
        let response: CatalogResponse = self.send(request, url.as_str()).await?;
        Ok(response.into_definitions())
    }

    async fn block_schema(&self, name: &str) -> Result<BlockSchema, FetchError> {
        let url = self.url(&["block", name, "schema"]);
        debug!(%url, "fetching block schema");
        self.send(self.client.get(url.clone()), url.as_str()).await
    }

    async fn root_schema(&self) -> Result<BlockDefinition, FetchError> {
        let url = self.url(&["automation-definition", "schema"]);
        self.send(self.client.get(url.clone()), url.as_str()).await
    }
}
