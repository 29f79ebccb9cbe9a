//! End-to-end tests for profiles, avatars and the dashboard

mod common;

use common::{
    TestClient, TestServer, AVATAR_MAX_SIZE_BYTES, CATEGORY_GENERAL, OTHER_USERNAME, PNG_BYTES,
    TEST_USERNAME,
};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_profile_requires_session() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    assert_eq!(
        client.get_profile().await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        client.update_profile(json!({"bio": "hi"})).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        client.get_dashboard().await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_update_profile() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let profile: Value = client.get_profile().await.json().await.unwrap();
    assert_eq!(profile["username"], TEST_USERNAME);
    assert!(profile["bio"].is_null());

    let response = client
        .update_profile(json!({
            "username": "renamed",
            "full_name": "Test Person",
            "bio": "  Building things  ",
        }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let profile: Value = response.json().await.unwrap();
    assert_eq!(profile["username"], "renamed");
    assert_eq!(profile["full_name"], "Test Person");
    assert_eq!(profile["bio"], "Building things");

    // Fields left out stay untouched, empty strings clear them
    let profile: Value = client
        .update_profile(json!({"bio": ""}))
        .await
        .json()
        .await
        .unwrap();
    assert!(profile["bio"].is_null());
    assert_eq!(profile["full_name"], "Test Person");
    assert_eq!(profile["username"], "renamed");
}

#[tokio::test]
async fn test_update_profile_username_rules() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .update_profile(json!({"username": OTHER_USERNAME}))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client.update_profile(json!({"username": "a b"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["field"], "username");

    // Keeping the current name is not a conflict
    let response = client
        .update_profile(json!({"username": TEST_USERNAME}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_avatar_upload() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client.upload_avatar(PNG_BYTES, "me.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    let profile: Value = response.json().await.unwrap();
    let avatar_url = profile["avatar_url"].as_str().unwrap().to_string();
    assert!(avatar_url.starts_with(&format!("{}/media/avatars/", server.base_url)));
    assert!(avatar_url.ends_with(".png"));

    let response = client.get_absolute(&avatar_url).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.bytes().await.unwrap().as_ref(), PNG_BYTES);

    let profile: Value = client.get_profile().await.json().await.unwrap();
    assert_eq!(profile["avatar_url"], avatar_url.as_str());
}

#[tokio::test]
async fn test_stored_avatar_fills_missing_profile_url() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;
    let profile: Value = client.get_profile().await.json().await.unwrap();
    assert!(profile["avatar_url"].is_null());
    let user_id = profile["user_id"].as_u64().unwrap();

    // An object in the bucket that the profile row does not know about yet
    let user_dir = server.media_path.join("avatars").join(user_id.to_string());
    std::fs::create_dir_all(&user_dir).unwrap();
    std::fs::write(user_dir.join("1000.png"), PNG_BYTES).unwrap();
    let expected = format!("{}/media/avatars/{}/1000.png", server.base_url, user_id);

    let profile: Value = client.get_profile().await.json().await.unwrap();
    assert_eq!(profile["avatar_url"], expected.as_str());

    let page: Value = client
        .get_public_profile(TEST_USERNAME)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page["profile"]["avatar_url"], expected.as_str());
}

#[tokio::test]
async fn test_avatar_upload_rejects_bad_files() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .upload_avatar(b"definitely not an image", "notes.txt")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["field"], "file");

    let mut oversize = PNG_BYTES.to_vec();
    oversize.resize(AVATAR_MAX_SIZE_BYTES + 1, 0);
    let response = client.upload_avatar(&oversize, "big.png").await;
    assert!(
        response.status() == StatusCode::BAD_REQUEST
            || response.status() == StatusCode::PAYLOAD_TOO_LARGE
    );

    let profile: Value = client.get_profile().await.json().await.unwrap();
    assert!(profile["avatar_url"].is_null());
}

#[tokio::test]
async fn test_dashboard_reflects_activity() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;
    let other = TestClient::authenticated_other(server.base_url.clone()).await;

    let thread_id = client
        .create_thread_id(CATEGORY_GENERAL, "My first thread", "hello")
        .await;
    let reply_id = client.create_reply_id(&thread_id, "bump", None).await;
    other.vote_thread(&thread_id, "up").await;
    other.vote_reply(&reply_id, "up").await;
    client.vote_thread(&thread_id, "up").await;

    let response = client.get_dashboard().await;
    assert_eq!(response.status(), StatusCode::OK);
    let dashboard: Value = response.json().await.unwrap();
    assert_eq!(dashboard["profile"]["username"], TEST_USERNAME);
    assert_eq!(dashboard["stats"]["threads"], 1);
    assert_eq!(dashboard["stats"]["replies"], 1);
    assert_eq!(dashboard["stats"]["upvotes"], 3);
    assert_eq!(dashboard["stats"]["upvotes_cast"], 1);
    assert_eq!(dashboard["recent_threads"][0]["id"], thread_id.as_str());

    let other_dashboard: Value = other.get_dashboard().await.json().await.unwrap();
    assert_eq!(other_dashboard["stats"]["threads"], 0);
    assert_eq!(other_dashboard["stats"]["upvotes"], 0);
    assert_eq!(other_dashboard["stats"]["upvotes_cast"], 2);
}

#[tokio::test]
async fn test_public_profile() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;
    client
        .create_thread_id(CATEGORY_GENERAL, "Public work", "see")
        .await;

    let anonymous = TestClient::new(server.base_url.clone());
    let response = anonymous.get_public_profile(TEST_USERNAME).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["profile"]["username"], TEST_USERNAME);
    assert_eq!(page["stats"]["threads"], 1);
    assert_eq!(page["recent_threads"][0]["title"], "Public work");

    let response = anonymous.get_public_profile("ghost").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
