mod common;

use common::{mock_chat, spawn_story_app};
use reqwest::multipart;
use reqwest::StatusCode;
use serde_json::Value;
use vibestory_api::store::MemoryStore;

fn image_part() -> multipart::Part {
    multipart::Part::bytes(vec![0xFF, 0xD8, 0xFF, 0xE0])
        .file_name("holiday.jpg")
        .mime_str("image/jpeg")
        .expect("mime")
}

#[tokio::test]
async fn image_upload_produces_an_image_story() -> anyhow::Result<()> {
    let app = spawn_story_app(MemoryStore::new()).await?;
    mock_chat(&app.mock, r#"{"title":"By The Sea","content":"Waves rolled in slowly."}"#).await;
    let client = reqwest::Client::new();

    let form = multipart::Form::new()
        .part("image", image_part())
        .text("theme", "adventure")
        .text("tone", "playful")
        .text("image_description", "a beach at dawn");
    let res = client
        .post(format!("{}/api/stories/image", app.base))
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["story"]["story_type"], "image");
    assert_eq!(body["story"]["genre"], "adventure");
    assert_eq!(body["story"]["tone"], "playful");
    assert_eq!(body["story"]["image_description"], "a beach at dawn");
    assert_eq!(body["story"]["word_count"], 4);
    assert!(body["story"]["prompt"].is_null());

    // the upload landed on disk under the stored filename
    let filename = body["story"]["image_filename"].as_str().unwrap();
    assert!(filename.ends_with(".jpg"));
    assert!(app.media.uploads_dir().join(filename).exists());

    app.server_handle.abort();
    let _ = app.server_handle.await;
    Ok(())
}

#[tokio::test]
async fn non_image_upload_is_rejected() -> anyhow::Result<()> {
    let app = spawn_story_app(MemoryStore::new()).await?;
    let client = reqwest::Client::new();

    let part = multipart::Part::text("not an image")
        .file_name("notes.txt")
        .mime_str("text/plain")
        .expect("mime");
    let form = multipart::Form::new().part("image", part);
    let res = client
        .post(format!("{}/api/stories/image", app.base))
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    app.server_handle.abort();
    let _ = app.server_handle.await;
    Ok(())
}

#[tokio::test]
async fn missing_image_field_is_rejected() -> anyhow::Result<()> {
    let app = spawn_story_app(MemoryStore::new()).await?;
    let client = reqwest::Client::new();

    let form = multipart::Form::new().text("theme", "horror");
    let res = client
        .post(format!("{}/api/stories/image", app.base))
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "missing_image");

    app.server_handle.abort();
    let _ = app.server_handle.await;
    Ok(())
}

#[tokio::test]
async fn failed_generation_cleans_up_the_upload() -> anyhow::Result<()> {
    let app = spawn_story_app(MemoryStore::new()).await?;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path(common::chat_path()))
        .respond_with(wiremock::ResponseTemplate::new(500))
        .mount(&app.mock)
        .await;
    let client = reqwest::Client::new();

    let form = multipart::Form::new().part("image", image_part());
    let res = client
        .post(format!("{}/api/stories/image", app.base))
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    // nothing left behind in the uploads directory
    let mut entries = tokio::fs::read_dir(app.media.uploads_dir()).await?;
    assert!(entries.next_entry().await?.is_none());

    app.server_handle.abort();
    let _ = app.server_handle.await;
    Ok(())
}
