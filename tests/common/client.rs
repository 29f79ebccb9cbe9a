//! HTTP client for end-to-end tests
//!
//! Wraps reqwest and provides one method per server endpoint.
//! When API routes or request formats change, update only this file.
#![allow(dead_code)]

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true) // Automatically handle session cookies
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client logged in as the regular test user
    pub async fn authenticated(base_url: String) -> Self {
        Self::authenticated_as(base_url, TEST_EMAIL, TEST_PASS).await
    }

    /// Creates a client logged in as the second test user
    pub async fn authenticated_other(base_url: String) -> Self {
        Self::authenticated_as(base_url, OTHER_EMAIL, OTHER_PASS).await
    }

    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated_as(base_url: String, email: &str, password: &str) -> Self {
        let client = Self::new(base_url);

        let response = client.login(email, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Authentication of {} failed: {:?}",
            email,
            response.text().await
        );

        client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .unwrap_or_else(|e| panic!("GET {} failed: {}", path, e))
    }

    async fn post_json(&self, path: &str, body: Value) -> Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap_or_else(|e| panic!("POST {} failed: {}", path, e))
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/signup
    pub async fn sign_up(&self, email: &str, password: &str, username: Option<&str>) -> Response {
        self.post_json(
            "/v1/auth/signup",
            json!({ "email": email, "password": password, "username": username }),
        )
        .await
    }

    /// POST /v1/auth/login
    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.post_json(
            "/v1/auth/login",
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.get("/v1/auth/logout").await
    }

    /// GET /v1/auth/session
    pub async fn get_session(&self) -> Response {
        self.get("/v1/auth/session").await
    }

    // ========================================================================
    // Forum Endpoints
    // ========================================================================

    /// GET /v1/forum/categories
    pub async fn list_categories(&self) -> Response {
        self.get("/v1/forum/categories").await
    }

    /// GET /v1/forum/categories/{slug}
    pub async fn get_category(&self, slug: &str) -> Response {
        self.get(&format!("/v1/forum/categories/{}", slug)).await
    }

    /// GET /v1/forum/threads?{query}
    pub async fn list_threads(&self, query: &str) -> Response {
        self.get(&format!("/v1/forum/threads?{}", query)).await
    }

    /// POST /v1/forum/threads
    pub async fn create_thread(&self, category: &str, title: &str, content: &str) -> Response {
        self.post_json(
            "/v1/forum/threads",
            json!({ "category": category, "title": title, "content": content }),
        )
        .await
    }

    /// Creates a thread and returns its id
    ///
    /// # Panics
    ///
    /// Panics if the thread is not created.
    pub async fn create_thread_id(&self, category: &str, title: &str, content: &str) -> String {
        let response = self.create_thread(category, title, content).await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let body: Value = response.json().await.expect("Invalid thread json");
        body["id"].as_str().expect("Thread without id").to_string()
    }

    /// GET /v1/forum/threads/{id}
    pub async fn get_thread(&self, id: &str) -> Response {
        self.get(&format!("/v1/forum/threads/{}", id)).await
    }

    /// POST /v1/forum/threads/{id}/replies
    pub async fn create_reply(
        &self,
        thread_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Response {
        self.post_json(
            &format!("/v1/forum/threads/{}/replies", thread_id),
            json!({ "content": content, "parent_id": parent_id }),
        )
        .await
    }

    /// Creates a reply and returns its id
    pub async fn create_reply_id(
        &self,
        thread_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> String {
        let response = self.create_reply(thread_id, content, parent_id).await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let body: Value = response.json().await.expect("Invalid reply json");
        body["id"].as_str().expect("Reply without id").to_string()
    }

    /// GET /v1/forum/replies/{id}/children
    pub async fn get_child_replies(&self, reply_id: &str) -> Response {
        self.get(&format!("/v1/forum/replies/{}/children", reply_id))
            .await
    }

    /// POST /v1/forum/threads/{id}/vote
    pub async fn vote_thread(&self, id: &str, direction: &str) -> Response {
        self.post_json(
            &format!("/v1/forum/threads/{}/vote", id),
            json!({ "direction": direction }),
        )
        .await
    }

    /// POST /v1/forum/replies/{id}/vote
    pub async fn vote_reply(&self, id: &str, direction: &str) -> Response {
        self.post_json(
            &format!("/v1/forum/replies/{}/vote", id),
            json!({ "direction": direction }),
        )
        .await
    }

    /// GET /v1/forum/search?{query}
    pub async fn search(&self, query: &str) -> Response {
        self.get(&format!("/v1/forum/search?{}", query)).await
    }

    // ========================================================================
    // User Endpoints
    // ========================================================================

    /// GET /v1/user/profile
    pub async fn get_profile(&self) -> Response {
        self.get("/v1/user/profile").await
    }

    /// PUT /v1/user/profile
    pub async fn update_profile(&self, update: Value) -> Response {
        self.client
            .put(self.url("/v1/user/profile"))
            .json(&update)
            .send()
            .await
            .expect("Update profile request failed")
    }

    /// POST /v1/user/avatar
    pub async fn upload_avatar(&self, bytes: &[u8], file_name: &str) -> Response {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        self.client
            .post(self.url("/v1/user/avatar"))
            .multipart(form)
            .send()
            .await
            .expect("Avatar upload request failed")
    }

    /// GET /v1/user/dashboard
    pub async fn get_dashboard(&self) -> Response {
        self.get("/v1/user/dashboard").await
    }

    /// GET /v1/user/profiles/{username}
    pub async fn get_public_profile(&self, username: &str) -> Response {
        self.get(&format!("/v1/user/profiles/{}", username)).await
    }

    /// GET on an absolute url, e.g. an avatar url handed out by the server
    pub async fn get_absolute(&self, url: &str) -> Response {
        self.client
            .get(url)
            .send()
            .await
            .unwrap_or_else(|e| panic!("GET {} failed: {}", url, e))
    }
}
