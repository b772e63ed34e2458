mod common;

use chrono::{Duration, Utc};
use common::spawn_story_app;
use reqwest::StatusCode;
use serde_json::Value;
use vibestory_api::plugins::stories::models::Story;
use vibestory_api::store::{MemoryStore, StoryStore};

fn seeded_story(i: i64) -> Story {
    let mut story = Story::new_text(
        format!("Story {}", i),
        "a few words of content".into(),
        "general".into(),
        "neutral".into(),
        "short".into(),
        format!("prompt {}", i),
    );
    // stagger creation times so ordering is deterministic
    story.created_at = Utc::now() - Duration::minutes(i);
    story
}

#[tokio::test]
async fn list_pages_are_ordered_and_bounded() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    for i in 0..25 {
        store.upsert(&seeded_story(i)).await?;
    }
    let app = spawn_story_app(store).await?;
    let client = reqwest::Client::new();

    // default limit 10
    let res = client.get(format!("{}/api/stories", app.base)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["total"], 25);
    let stories = body["stories"].as_array().unwrap();
    assert_eq!(stories.len(), 10);
    // newest first: story 0 has the most recent created_at
    assert_eq!(stories[0]["title"], "Story 0");
    assert_eq!(stories[9]["title"], "Story 9");

    // explicit limit and offset
    let res = client
        .get(format!("{}/api/stories?limit=5&offset=20", app.base))
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["total"], 25);
    let stories = body["stories"].as_array().unwrap();
    assert_eq!(stories.len(), 5);
    assert_eq!(stories[0]["title"], "Story 20");

    // offset beyond the end: empty page, total unchanged
    let res = client
        .get(format!("{}/api/stories?limit=10&offset=25", app.base))
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["total"], 25);
    assert!(body["stories"].as_array().unwrap().is_empty());

    // limit is clamped to its bounds
    let res = client
        .get(format!("{}/api/stories?limit=500", app.base))
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["stories"].as_array().unwrap().len(), 25);

    app.server_handle.abort();
    let _ = app.server_handle.await;
    Ok(())
}

#[tokio::test]
async fn stats_aggregate_both_story_types() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let mut text = seeded_story(1);
    text.word_count = 10;
    store.upsert(&text).await?;
    let mut image = Story::new_image(
        "Seen".into(),
        "one two three four".into(),
        "fantasy".into(),
        "creative".into(),
        "short".into(),
        "pic.jpg".into(),
        None,
    );
    image.word_count = 20;
    store.upsert(&image).await?;

    let app = spawn_story_app(store).await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/api/stories/stats", app.base)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["total"], 2);
    assert_eq!(body["text"], 1);
    assert_eq!(body["image"], 1);
    assert_eq!(body["avg_words"], 15);

    app.server_handle.abort();
    let _ = app.server_handle.await;
    Ok(())
}
