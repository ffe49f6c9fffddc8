//! Typed HTTP client for the reporting API.
//!
//! The client holds no session. Every protected call takes the bearer token
//! explicitly, so one `ApiClient` can act for several users at once.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use luct_types::api::{
    CreateReportRequest, ErrorResponse, FeedbackRequest, HealthResponse, LoginRequest,
    LoginResponse, MessageResponse, RegisterRequest, RegisterResponse, UpdateUserRequest,
};
use luct_types::{Class, Report, Role, User};

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status and an `{error}` body.
    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:5000`. The
    /// `/api` prefix is added per request.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let url = format!("{}/api{}", self.base_url, path);
        debug!("{} {}", method, url);
        let builder = self.http.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // -- Public --

    pub async fn health(&self) -> Result<HealthResponse> {
        json(self.request(Method::GET, "/health", None).send().await?).await
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse> {
        let resp = self.request(Method::POST, "/register", None).json(req).send().await?;
        json(resp).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let resp = self.request(Method::POST, "/login", None).json(&req).send().await?;
        json(resp).await
    }

    // -- Accounts --

    pub async fn profile(&self, token: &str) -> Result<User> {
        self.get(token, "/profile").await
    }

    pub async fn get_user(&self, token: &str, id: i64) -> Result<User> {
        self.get(token, &format!("/user/{id}")).await
    }

    pub async fn list_users(&self, token: &str, role: Role) -> Result<Vec<User>> {
        self.get(token, &format!("/users/{role}")).await
    }

    pub async fn update_user(
        &self,
        token: &str,
        id: i64,
        changes: &UpdateUserRequest,
    ) -> Result<MessageResponse> {
        self.send_json(Method::PUT, token, &format!("/user/{id}"), changes).await
    }

    pub async fn delete_user(&self, token: &str, id: i64) -> Result<MessageResponse> {
        let resp = self
            .request(Method::DELETE, &format!("/user/{id}"), Some(token))
            .send()
            .await?;
        json(resp).await
    }

    // -- Reports --

    pub async fn list_classes(&self, token: &str) -> Result<Vec<Class>> {
        self.get(token, "/lecturer/classes").await
    }

    pub async fn submit_report(&self, token: &str, report: &CreateReportRequest) -> Result<Report> {
        self.send_json(Method::POST, token, "/lecturer/reports", report).await
    }

    pub async fn lecturer_reports(&self, token: &str, search: Option<&str>) -> Result<Vec<Report>> {
        self.search(token, "/lecturer/reports", search).await
    }

    pub async fn prl_reports(&self, token: &str, search: Option<&str>) -> Result<Vec<Report>> {
        self.search(token, "/prl/reports", search).await
    }

    pub async fn pl_reports(&self, token: &str, search: Option<&str>) -> Result<Vec<Report>> {
        self.search(token, "/pl/reports", search).await
    }

    pub async fn add_feedback(&self, token: &str, report_id: i64, feedback: &str) -> Result<Report> {
        let body = FeedbackRequest {
            feedback: feedback.to_string(),
        };
        self.send_json(Method::POST, token, &format!("/prl/reports/{report_id}/feedback"), &body)
            .await
    }

    pub async fn approve_report(&self, token: &str, report_id: i64) -> Result<Report> {
        let resp = self
            .request(Method::POST, &format!("/pl/reports/{report_id}/approve"), Some(token))
            .send()
            .await?;
        json(resp).await
    }

    /// Raw CSV text of every report.
    pub async fn export_reports(&self, token: &str) -> Result<String> {
        let resp = self.request(Method::GET, "/reports/export", Some(token)).send().await?;
        Ok(check(resp).await?.text().await?)
    }

    async fn get<T: DeserializeOwned>(&self, token: &str, path: &str) -> Result<T> {
        json(self.request(Method::GET, path, Some(token)).send().await?).await
    }

    async fn search<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        search: Option<&str>,
    ) -> Result<T> {
        let mut builder = self.request(Method::GET, path, Some(token));
        if let Some(term) = search {
            builder = builder.query(&[("search", term)]);
        }
        json(builder.send().await?).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        token: &str,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self.request(method, path, Some(token)).json(body).send().await?;
        json(resp).await
    }
}

/// Turn a non-success response into `ClientError::Api`, keeping the
/// server's `{error}` message when the body has one.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|e| e.error)
        .unwrap_or(text);
    Err(ClientError::Api { status, message })
}

async fn json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    Ok(check(resp).await?.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = ApiClient::new("http://localhost:5000/");
        assert_eq!(client.base_url, "http://localhost:5000");
    }

    #[test]
    fn api_error_reports_status() {
        let err = ClientError::Api {
            status: StatusCode::FORBIDDEN,
            message: "Insufficient permissions".into(),
        };
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(err.to_string(), "403 Forbidden: Insufficient permissions");
    }
}
