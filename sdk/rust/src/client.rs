use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Status code and JSON body of a response. Error statuses are not errors
/// here; callers inspect `status`.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The machine-readable `status` field, if any.
    pub fn status_label(&self) -> Option<&str> {
        self.body.get("status").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<ApiResponse, reqwest::Error> {
        self.get("/api/health").await
    }

    pub async fn list_users(&self) -> Result<ApiResponse, reqwest::Error> {
        self.get("/api/users").await
    }

    pub async fn register(&self, registration: &Registration) -> Result<ApiResponse, reqwest::Error> {
        self.post("/api/register", &json!(registration)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<ApiResponse, reqwest::Error> {
        self.post("/api/login", &json!({ "email": email, "password": password }))
            .await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<ApiResponse, reqwest::Error> {
        self.post("/api/forgot-password", &json!({ "email": email }))
            .await
    }

    pub async fn create_test_user(&self) -> Result<ApiResponse, reqwest::Error> {
        self.post("/api/test-user", &json!({})).await
    }

    async fn get(&self, path: &str) -> Result<ApiResponse, reqwest::Error> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        read(resp).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, reqwest::Error> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        read(resp).await
    }
}

async fn read(resp: Response) -> Result<ApiResponse, reqwest::Error> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    // Non-JSON bodies (e.g. a proxy error page) are kept as a string.
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Ok(ApiResponse { status, body })
}
