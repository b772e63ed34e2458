use super::{StoreError, StoreStats, StoryStore};
use crate::auth::Credential;
use crate::config::CosmosConfig;
use crate::plugins::stories::models::Story;
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const COSMOS_API_VERSION: &str = "2018-12-31";

/// Document-store adapter speaking the Cosmos DB REST dialect. All queries
/// run cross-partition because the deployment's partition key is not
/// reliably known at call time.
pub struct CosmosStore {
    http: reqwest::Client,
    endpoint: String,
    database: String,
    container: String,
    credential: Arc<Credential>,
    /// Partition-key path from collection metadata, fetched once.
    pk_path: OnceCell<Option<String>>,
}

#[derive(Deserialize)]
struct QueryResponse<T> {
    #[serde(rename = "Documents", default = "Vec::new")]
    documents: Vec<T>,
}

#[derive(Deserialize)]
struct CollectionMeta {
    #[serde(rename = "partitionKey")]
    partition_key: Option<PartitionKeyDef>,
}

#[derive(Deserialize)]
struct PartitionKeyDef {
    #[serde(default)]
    paths: Vec<String>,
}

impl CosmosStore {
    pub fn new(config: &CosmosConfig, credential: Arc<Credential>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            container: config.container.clone(),
            credential,
            pk_path: OnceCell::new(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/dbs/{}/colls/{}", self.endpoint, self.database, self.container)
    }

    fn docs_url(&self) -> String {
        format!("{}/docs", self.collection_url())
    }

    fn doc_url(&self, id: &str) -> String {
        format!("{}/docs/{}", self.collection_url(), id)
    }

    /// Authorization header value. The dev key is sent as a resource token,
    /// managed identity as an AAD bearer token; both are verbatim-token
    /// schemes, URL-encoded as the gateway requires.
    async fn auth_header(&self) -> Result<String, StoreError> {
        let raw = match &*self.credential {
            Credential::ApiKey(key) => format!("type=resource&ver=1.0&sig={}", key),
            Credential::ManagedIdentity(provider) => {
                let token = provider
                    .token()
                    .await
                    .map_err(|e| StoreError::Request(format!("token acquisition failed: {}", e)))?;
                format!("type=aad&ver=1.0&sig={}", token)
            }
        };
        Ok(url::form_urlencoded::byte_serialize(raw.as_bytes()).collect())
    }

    async fn request(
        &self,
        method: reqwest::Method,
        url: String,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        // the gateway expects the RFC 1123 date lowercased
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string().to_lowercase();
        Ok(self
            .http
            .request(method, url)
            .header("authorization", self.auth_header().await?)
            .header("x-ms-date", date)
            .header("x-ms-version", COSMOS_API_VERSION))
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let resp = req.send().await.map_err(|e| StoreError::Request(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default().chars().take(300).collect::<String>();
        Err(StoreError::Api { status: status.as_u16(), message })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        parameters: Vec<Value>,
    ) -> Result<Vec<T>, StoreError> {
        let body = json!({ "query": query, "parameters": parameters });
        let req = self
            .request(reqwest::Method::POST, self.docs_url())
            .await?
            .header("content-type", "application/query+json")
            .header("x-ms-documentdb-isquery", "true")
            .header("x-ms-documentdb-query-enablecrosspartition", "true")
            .header("x-ms-max-item-count", "-1")
            .body(serde_json::to_vec(&body).map_err(|e| StoreError::Malformed(e.to_string()))?);
        let resp = self.send(req).await?;
        let parsed: QueryResponse<T> =
            resp.json().await.map_err(|e| StoreError::Malformed(e.to_string()))?;
        Ok(parsed.documents)
    }

    async fn scalar(&self, query: &str) -> Result<u64, StoreError> {
        let values: Vec<Value> = self.query(query, vec![]).await?;
        Ok(values.first().and_then(Value::as_u64).unwrap_or(0))
    }

    async fn fetch_pk_path(&self) -> Result<Option<String>, StoreError> {
        let req = self.request(reqwest::Method::GET, self.collection_url()).await?;
        let resp = self.send(req).await?;
        let meta: CollectionMeta =
            resp.json().await.map_err(|e| StoreError::Malformed(e.to_string()))?;
        Ok(meta.partition_key.and_then(|pk| pk.paths.into_iter().next()))
    }

    /// Partition-key value for a record, following the container's
    /// configured path and defaulting to the id.
    async fn resolve_pk(&self, story: &Story) -> String {
        let path = match self.partition_key_path().await {
            Ok(Some(path)) => path,
            _ => "/id".to_string(),
        };
        let doc = serde_json::to_value(story).unwrap_or(Value::Null);
        let pointer = if path.starts_with('/') { path } else { format!("/{}", path) };
        doc.pointer(&pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| story.id.clone())
    }
}

fn pk_header(value: &str) -> String {
    format!("[{}]", Value::String(value.to_string()))
}

#[async_trait]
impl StoryStore for CosmosStore {
    async fn check_connection(&self) -> bool {
        match self.fetch_pk_path().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "store connection check failed");
                false
            }
        }
    }

    async fn upsert(&self, story: &Story) -> Result<(), StoreError> {
        let pk = self.resolve_pk(story).await;
        let req = self
            .request(reqwest::Method::POST, self.docs_url())
            .await?
            .header("x-ms-documentdb-is-upsert", "true")
            .header("x-ms-documentdb-partitionkey", pk_header(&pk))
            .json(story);
        self.send(req).await?;
        debug!(story_id = %story.id, "story upserted");
        Ok(())
    }

    async fn list(&self, limit: u64, offset: u64) -> Result<(Vec<Story>, u64), StoreError> {
        let total = self.scalar("SELECT VALUE COUNT(1) FROM c").await?;
        let stories = self
            .query(
                "SELECT * FROM c ORDER BY c.created_at DESC OFFSET @offset LIMIT @limit",
                vec![
                    json!({"name": "@offset", "value": offset}),
                    json!({"name": "@limit", "value": limit}),
                ],
            )
            .await?;
        Ok((stories, total))
    }

    async fn get(&self, id: &str) -> Result<Option<Story>, StoreError> {
        // cross-partition query instead of a point read: a point read needs
        // the very partition key we cannot assume
        let mut stories: Vec<Story> = self
            .query(
                "SELECT * FROM c WHERE c.id = @id",
                vec![json!({"name": "@id", "value": id})],
            )
            .await?;
        Ok(if stories.is_empty() { None } else { Some(stories.remove(0)) })
    }

    async fn delete(&self, id: &str, partition_key: &str) -> Result<(), StoreError> {
        let req = self
            .request(reqwest::Method::DELETE, self.doc_url(id))
            .await?
            .header("x-ms-documentdb-partitionkey", pk_header(partition_key));
        self.send(req).await?;
        Ok(())
    }

    async fn partition_key_path(&self) -> Result<Option<String>, StoreError> {
        match self.pk_path.get() {
            Some(cached) => Ok(cached.clone()),
            None => {
                let path = self.fetch_pk_path().await?;
                let _ = self.pk_path.set(path.clone());
                Ok(path)
            }
        }
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let total = self.scalar("SELECT VALUE COUNT(1) FROM c").await?;
        let text = self
            .scalar("SELECT VALUE COUNT(1) FROM c WHERE c.story_type = 'text'")
            .await?;
        let image = self
            .scalar("SELECT VALUE COUNT(1) FROM c WHERE c.story_type = 'image'")
            .await?;
        let total_words = match self.scalar("SELECT VALUE SUM(c.word_count) FROM c").await {
            Ok(n) => n,
            Err(e) => {
                // SUM over an empty container comes back as no value
                warn!(error = %e, "word-count aggregate unavailable");
                0
            }
        };
        Ok(StoreStats { total, text, image, total_words })
    }
}
