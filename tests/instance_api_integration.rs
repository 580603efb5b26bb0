use projectdesk::config::{AppConfig, ConfigDefaults};
use projectdesk::store::{InMemoryResponseCache, InstanceStore, MemoryStore, ResponseCache};
use projectdesk::{build_app, seed};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

const ADMIN: &str = "admin-user";

// Test client wrapper for making API calls
struct TestClient {
    client: Client,
    base_url: String,
    user_id: Option<String>,
}

impl TestClient {
    fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            user_id: None,
        }
    }

    fn as_user(&self, user_id: &str) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            user_id: Some(user_id.to_string()),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.user_id {
            Some(user_id) => builder.header("x-user-id", user_id),
            None => builder,
        }
    }

    async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.request(reqwest::Method::GET, path).send().await
    }

    async fn post(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.request(reqwest::Method::POST, path).json(&json).send().await
    }

    async fn patch(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.request(reqwest::Method::PATCH, path).json(&json).send().await
    }

    async fn patch_raw(&self, path: &str, body: &'static str) -> reqwest::Result<reqwest::Response> {
        self.request(reqwest::Method::PATCH, path)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
    }
}

/// Serve the app on an ephemeral port backed by the in-memory store
async fn spawn_app(defaults: ConfigDefaults) -> (TestClient, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let cache: Arc<dyn ResponseCache> = Arc::new(InMemoryResponseCache::default());
    let app = build_app(store.clone(), cache, defaults, &AppConfig::default());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (TestClient::new(format!("http://{}", addr)), store)
}

async fn spawn_registered_app() -> (TestClient, Arc<MemoryStore>) {
    let (client, store) = spawn_app(ConfigDefaults::from_pairs(&[])).await;
    seed::register_instance(&*store, "Acme").await.unwrap();
    seed::grant_instance_admin(&*store, ADMIN).await.unwrap();
    (client, store)
}

#[tokio::test]
async fn test_health_check() {
    let (client, _) = spawn_app(ConfigDefaults::default()).await;
    let response = client.get("/health").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_instance_config_before_registration() {
    let (client, _) = spawn_app(ConfigDefaults::default()).await;

    let response = client.get("/instance-config").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"is_activated": false, "is_setup_done": false}));

    let response = client.post("/signup-screen-visited", json!({})).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Instance is not configured");
}

#[tokio::test]
async fn test_instance_config_merges_defaults_and_overrides() {
    let (client, store) = spawn_app(ConfigDefaults::from_pairs(&[
        ("IS_GITHUB_ENABLED", "1"),
        ("GITHUB_APP_NAME", "acme-bot"),
        ("FILE_SIZE_LIMIT", "1024"),
    ]))
    .await;
    seed::register_instance(&*store, "Acme").await.unwrap();
    seed::grant_instance_admin(&*store, ADMIN).await.unwrap();

    let body: Value = client.get("/instance-config").await.unwrap().json().await.unwrap();
    assert_eq!(body["instance"]["instance_name"], "Acme");
    assert_eq!(body["instance"]["workspaces_exist"], false);
    assert_eq!(body["config"]["is_github_enabled"], true);
    assert_eq!(body["config"]["is_google_enabled"], false);
    assert_eq!(body["config"]["github_app_name"], "acme-bot");
    assert_eq!(body["config"]["is_magic_login_enabled"], true);
    assert_eq!(body["config"]["file_size_limit"], 1024.0);

    // An override row wins over the environment, and the write drops the cached response
    let response = client
        .as_user(ADMIN)
        .patch(
            "/instance-config/configurations",
            json!({"IS_GITHUB_ENABLED": "0", "is_google_enabled": "1"}),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = client.get("/instance-config").await.unwrap().json().await.unwrap();
    assert_eq!(body["config"]["is_github_enabled"], false);
    assert_eq!(body["config"]["is_google_enabled"], true);
}

#[tokio::test]
async fn test_instance_config_is_served_from_cache() {
    let (client, store) = spawn_registered_app().await;

    let first: Value = client.get("/instance-config").await.unwrap().json().await.unwrap();
    assert_eq!(first["instance"]["instance_name"], "Acme");

    // A direct store write bypasses invalidation, so the cached response is still served
    let mut instance = store.get_instance().await.unwrap().into_instance().unwrap();
    instance.instance_name = "Renamed behind the cache".to_string();
    store.save_instance(&instance).await.unwrap();

    let second: Value = client.get("/instance-config").await.unwrap().json().await.unwrap();
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_signup_screen_visited_invalidates_cache() {
    let (client, _) = spawn_registered_app().await;

    let body: Value = client.get("/instance-config").await.unwrap().json().await.unwrap();
    assert_eq!(body["instance"]["is_signup_screen_visited"], false);

    for _ in 0..2 {
        let response = client.post("/signup-screen-visited", json!({})).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let body: Value = client.get("/instance-config").await.unwrap().json().await.unwrap();
    assert_eq!(body["instance"]["is_signup_screen_visited"], true);
}

#[tokio::test]
async fn test_patch_instance_config_requires_admin() {
    let (client, _) = spawn_registered_app().await;

    let response = client
        .patch("/instance-config", json!({"instance_name": "Nope"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .as_user("regular-user")
        .patch("/instance-config", json!({"instance_name": "Nope"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .as_user("regular-user")
        .get("/instance-config/configurations")
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_admin_body_checks_permission_first() {
    let (client, _) = spawn_registered_app().await;

    for path in ["/instance-config", "/instance-config/configurations"] {
        let response = client.patch_raw(path, "{not json").await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = client.as_user(ADMIN).patch_raw(path, "{not json").await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_patch_instance_config_updates_and_invalidates() {
    let (client, _) = spawn_registered_app().await;
    let admin = client.as_user(ADMIN);

    let before: Value = client.get("/instance-config").await.unwrap().json().await.unwrap();
    assert_eq!(before["instance"]["instance_name"], "Acme");

    let response = admin
        .patch(
            "/instance-config",
            json!({"instance_name": "Acme Corp", "is_telemetry_enabled": false, "instance_id": "ignored"}),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["instance_name"], "Acme Corp");
    assert_eq!(updated["is_telemetry_enabled"], false);
    assert_eq!(updated["instance_id"], before["instance"]["instance_id"]);

    let after: Value = client.get("/instance-config").await.unwrap().json().await.unwrap();
    assert_eq!(after["instance"]["instance_name"], "Acme Corp");

    let response = admin
        .patch("/instance-config", json!({"is_setup_done": "yes"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["fields"]["is_setup_done"].is_array());
}

#[tokio::test]
async fn test_project_identifier_lifecycle() {
    let (client, _) = spawn_registered_app().await;

    let response = client
        .post("/workspaces", json!({"name": "Acme", "slug": "acme"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let workspace: Value = response.json().await.unwrap();
    let workspace_id = workspace["id"].as_str().unwrap().to_string();

    let response = client
        .post("/workspaces", json!({"name": "Acme again", "slug": "acme"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let projects_path = format!("/workspaces/{}/projects", workspace_id);
    let response = client
        .post(&projects_path, json!({"name": "Website", "identifier": " web "}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let website: Value = response.json().await.unwrap();
    assert_eq!(website["identifier"], "WEB");

    // Same identifier in the same workspace is rejected
    let response = client
        .post(&projects_path, json!({"name": "Other", "identifier": "web"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Project Identifier is taken");

    let response = client
        .post(&projects_path, json!({"name": "Blank", "identifier": "   "}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Project Identifier is required");

    let response = client
        .post(&projects_path, json!({"name": "Mobile", "identifier": "APP"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Rename onto a held identifier fails, onto a free one succeeds
    let project_path = format!("{}/{}", projects_path, website["id"].as_str().unwrap());
    let response = client.patch(&project_path, json!({"identifier": "app"})).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Project Identifier is already taken");

    let response = client
        .patch(&project_path, json!({"identifier": "site", "name": "Site"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let renamed: Value = response.json().await.unwrap();
    assert_eq!(renamed["identifier"], "SITE");
    assert_eq!(renamed["name"], "Site");

    let lookup_path = format!("/workspaces/{}/project-identifiers", workspace_id);
    let body: Value = client
        .get(&format!("{}?name=web", lookup_path))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["exists"], false);

    let body: Value = client
        .get(&format!("{}?name=site", lookup_path))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["exists"], true);
    assert_eq!(body["identifiers"][0]["project_id"], website["id"]);

    let body: Value = client.get(&projects_path).await.unwrap().json().await.unwrap();
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn test_unknown_workspace_and_project() {
    let (client, _) = spawn_registered_app().await;

    let response = client
        .post("/workspaces/missing/projects", json!({"name": "X", "identifier": "X"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.get("/workspaces/missing/projects/nope").await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
