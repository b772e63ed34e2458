use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vibestory_api::auth::Credential;
use vibestory_api::config::CosmosConfig;
use vibestory_api::plugins::stories::models::Story;
use vibestory_api::store::{CosmosStore, StoreError, StoryStore};

const DOCS_PATH: &str = "/dbs/vibestory/colls/stories/docs";
const COLL_PATH: &str = "/dbs/vibestory/colls/stories";

fn test_store(mock: &MockServer) -> CosmosStore {
    let config = CosmosConfig {
        endpoint: mock.uri(),
        database: "vibestory".into(),
        container: "stories".into(),
    };
    CosmosStore::new(&config, Arc::new(Credential::ApiKey("store-key".into())))
}

fn sample_story() -> Story {
    Story::new_text(
        "Sample".into(),
        "words words words".into(),
        "general".into(),
        "neutral".into(),
        "short".into(),
        "p".into(),
    )
}

async fn mock_collection_meta(mock: &MockServer, pk_path: &str) {
    Mock::given(method("GET"))
        .and(path(COLL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "stories",
            "partitionKey": { "paths": [pk_path], "kind": "Hash" }
        })))
        .mount(mock)
        .await;
}

#[tokio::test]
async fn upsert_sends_partition_key_and_upsert_headers() -> anyhow::Result<()> {
    let mock = MockServer::start().await;
    mock_collection_meta(&mock, "/id").await;
    let story = sample_story();
    Mock::given(method("POST"))
        .and(path(DOCS_PATH))
        .and(header("x-ms-documentdb-is-upsert", "true"))
        .and(header(
            "x-ms-documentdb-partitionkey",
            format!("[\"{}\"]", story.id).as_str(),
        ))
        .and(header("x-ms-version", "2018-12-31"))
        .and(header_exists("authorization"))
        .and(header_exists("x-ms-date"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&mock)
        .await;

    let store = test_store(&mock);
    store.upsert(&story).await?;
    Ok(())
}

#[tokio::test]
async fn list_runs_cross_partition_queries() -> anyhow::Result<()> {
    let mock = MockServer::start().await;
    let story = sample_story();
    Mock::given(method("POST"))
        .and(path(DOCS_PATH))
        .and(header("x-ms-documentdb-isquery", "true"))
        .and(header("x-ms-documentdb-query-enablecrosspartition", "true"))
        .and(body_partial_json(json!({"query": "SELECT VALUE COUNT(1) FROM c"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"Documents": [1], "_count": 1})),
        )
        .mount(&mock)
        .await;
    Mock::given(method("POST"))
        .and(path(DOCS_PATH))
        .and(body_partial_json(json!({
            "query": "SELECT * FROM c ORDER BY c.created_at DESC OFFSET @offset LIMIT @limit"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Documents": [serde_json::to_value(&story)?],
            "_count": 1
        })))
        .mount(&mock)
        .await;

    let store = test_store(&mock);
    let (stories, total) = store.list(10, 0).await?;
    assert_eq!(total, 1);
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].id, story.id);
    Ok(())
}

#[tokio::test]
async fn get_returns_none_for_missing_id() -> anyhow::Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DOCS_PATH))
        .and(body_partial_json(json!({"query": "SELECT * FROM c WHERE c.id = @id"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"Documents": [], "_count": 0})),
        )
        .mount(&mock)
        .await;

    let store = test_store(&mock);
    assert_eq!(store.get("nope").await?, None);
    Ok(())
}

#[tokio::test]
async fn delete_with_wrong_partition_key_surfaces_the_status() -> anyhow::Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(404).set_body_string("document not found"))
        .mount(&mock)
        .await;

    let store = test_store(&mock);
    let err = store.delete("some-id", "wrong-key").await.expect_err("must fail");
    match err {
        StoreError::Api { status, .. } => assert_eq!(status, 404),
        other => panic!("unexpected error: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn partition_key_path_comes_from_collection_metadata() -> anyhow::Result<()> {
    let mock = MockServer::start().await;
    mock_collection_meta(&mock, "/genre").await;

    let store = test_store(&mock);
    assert_eq!(store.partition_key_path().await?, Some("/genre".to_string()));
    assert!(store.check_connection().await);
    Ok(())
}

#[tokio::test]
async fn api_key_is_sent_as_resource_token() -> anyhow::Result<()> {
    let mock = MockServer::start().await;
    // url-encoded form of type=resource&ver=1.0&sig=store-key
    Mock::given(method("GET"))
        .and(path(COLL_PATH))
        .and(header(
            "authorization",
            "type%3Dresource%26ver%3D1.0%26sig%3Dstore-key",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "stories"})))
        .expect(1)
        .mount(&mock)
        .await;

    let store = test_store(&mock);
    assert_eq!(store.partition_key_path().await?, None);
    Ok(())
}

#[tokio::test]
async fn list_surfaces_the_upstream_status() -> anyhow::Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DOCS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock)
        .await;

    let store = test_store(&mock);
    let err = store.list(10, 0).await.expect_err("store is down");
    match err {
        StoreError::Api { status, .. } => assert_eq!(status, 503),
        other => panic!("unexpected error: {:?}", other),
    }
    Ok(())
}
