//! REST client for the team monitoring API.

use crate::config::ClientConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use teamwatch_core::{
    Message, MessageFilter, MessageFlow, MessagePage, Stats, Task, TaskFilter, Team, TeamDetail,
    TeamMessageFilter,
};
use teamwatch_sync::FetchError;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(String),
}

impl From<ApiClientError> for FetchError {
    fn from(err: ApiClientError) -> Self {
        match err {
            ApiClientError::Status { status, message } => FetchError::Status { status, message },
            ApiClientError::Http(err) if err.is_decode() => FetchError::Decode(err.to_string()),
            ApiClientError::Http(err) => match err.status() {
                Some(status) => FetchError::status(status.as_u16(), err.to_string()),
                None => FetchError::Network(err.to_string()),
            },
            ApiClientError::Serde(err) => FetchError::Decode(err.to_string()),
            ApiClientError::Config(message) => FetchError::Network(message),
        }
    }
}

/// Read side of the dashboard API as the screens consume it.
///
/// [`RestClient`] is the production implementation; tests substitute an
/// in-process one.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn teams(&self) -> Result<Vec<Team>, FetchError>;
    async fn team(&self, name: &str) -> Result<TeamDetail, FetchError>;
    async fn team_messages(
        &self,
        name: &str,
        filter: &TeamMessageFilter,
    ) -> Result<MessagePage, FetchError>;
    async fn message_flow(&self, name: &str, agent: Option<&str>)
        -> Result<MessageFlow, FetchError>;
    async fn team_tasks(&self, name: &str) -> Result<Vec<Task>, FetchError>;
    async fn messages(&self, filter: &MessageFilter) -> Result<Vec<Message>, FetchError>;
    async fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, FetchError>;
    async fn stats(&self) -> Result<Stats, FetchError>;
    /// Ask the server to re-read team data from disk.
    async fn sync(&self) -> Result<(), FetchError>;
}

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: Url,
    auth_header: HeaderMap,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let base_url =
            Url::parse(&config.api_base_url).map_err(|e| ApiClientError::Config(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiClientError::Config(format!(
                "api_base_url cannot be a base: {}",
                base_url
            )));
        }
        let auth_header = build_auth_headers(config.auth.token.as_deref())?;
        Ok(Self {
            client,
            base_url,
            auth_header,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn fetch_teams(&self) -> Result<Vec<Team>, ApiClientError> {
        self.get_json::<_, ()>(&["api", "teams"], None).await
    }

    pub async fn fetch_team(&self, name: &str) -> Result<TeamDetail, ApiClientError> {
        self.get_json::<_, ()>(&["api", "teams", name], None).await
    }

    pub async fn fetch_team_messages(
        &self,
        name: &str,
        filter: &TeamMessageFilter,
    ) -> Result<MessagePage, ApiClientError> {
        let filter = filter.clone().clamped();
        self.get_json(&["api", "teams", name, "messages"], Some(&filter))
            .await
    }

    pub async fn fetch_message_flow(
        &self,
        name: &str,
        agent: Option<&str>,
    ) -> Result<MessageFlow, ApiClientError> {
        let query: Vec<(&str, &str)> = agent.map(|a| ("agent", a)).into_iter().collect();
        self.get_json(&["api", "teams", name, "message-flow"], Some(&query))
            .await
    }

    pub async fn fetch_team_tasks(&self, name: &str) -> Result<Vec<Task>, ApiClientError> {
        self.get_json::<_, ()>(&["api", "teams", name, "tasks"], None)
            .await
    }

    pub async fn fetch_messages(
        &self,
        filter: &MessageFilter,
    ) -> Result<Vec<Message>, ApiClientError> {
        let filter = filter.clone().normalized();
        self.get_json(&["api", "messages"], Some(&filter)).await
    }

    pub async fn fetch_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ApiClientError> {
        let filter = filter.clone().normalized();
        self.get_json(&["api", "tasks"], Some(&filter)).await
    }

    pub async fn fetch_stats(&self) -> Result<Stats, ApiClientError> {
        self.get_json::<_, ()>(&["api", "stats"], None).await
    }

    /// `POST /api/sync`. Only success or failure matters.
    pub async fn trigger_sync(&self) -> Result<(), ApiClientError> {
        let url = self.endpoint(&["api", "sync"])?;
        let response = self
            .client
            .post(url)
            .headers(self.auth_header.clone())
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await?;
        Err(ApiClientError::Status {
            status: status.as_u16(),
            message: error_message(status.as_u16(), &text),
        })
    }

    /// Base URL with `segments` appended, each percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiClientError::Config("api_base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T, Q>(&self, segments: &[&str], query: Option<&Q>) -> Result<T, ApiClientError>
    where
        T: DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        let mut request = self.client.get(url).headers(self.auth_header.clone());
        if let Some(query) = query {
            request = request.query(query);
        }
        let response = request.send().await?;
        self.parse_response(response).await
    }

    async fn parse_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiClientError> {
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            Ok(serde_json::from_str(&text)?)
        } else {
            Err(ApiClientError::Status {
                status: status.as_u16(),
                message: error_message(status.as_u16(), &text),
            })
        }
    }
}

#[async_trait]
impl DashboardApi for RestClient {
    async fn teams(&self) -> Result<Vec<Team>, FetchError> {
        Ok(self.fetch_teams().await?)
    }

    async fn team(&self, name: &str) -> Result<TeamDetail, FetchError> {
        Ok(self.fetch_team(name).await?)
    }

    async fn team_messages(
        &self,
        name: &str,
        filter: &TeamMessageFilter,
    ) -> Result<MessagePage, FetchError> {
        Ok(self.fetch_team_messages(name, filter).await?)
    }

    async fn message_flow(
        &self,
        name: &str,
        agent: Option<&str>,
    ) -> Result<MessageFlow, FetchError> {
        Ok(self.fetch_message_flow(name, agent).await?)
    }

    async fn team_tasks(&self, name: &str) -> Result<Vec<Task>, FetchError> {
        Ok(self.fetch_team_tasks(name).await?)
    }

    async fn messages(&self, filter: &MessageFilter) -> Result<Vec<Message>, FetchError> {
        Ok(self.fetch_messages(filter).await?)
    }

    async fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, FetchError> {
        Ok(self.fetch_tasks(filter).await?)
    }

    async fn stats(&self) -> Result<Stats, FetchError> {
        Ok(self.fetch_stats().await?)
    }

    async fn sync(&self) -> Result<(), FetchError> {
        Ok(self.trigger_sync().await?)
    }
}

/// Human-readable message for a failed response.
///
/// Prefers the `detail`, `error` or `message` field of a JSON body, then the
/// raw body, then the status line.
pub fn error_message(status: u16, body: &str) -> String {
    if let Ok(serde_json::Value::Object(fields)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "error", "message"] {
            if let Some(serde_json::Value::String(message)) = fields.get(key) {
                return message.clone();
            }
        }
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("request failed")
        .to_string()
}

fn build_auth_headers(token: Option<&str>) -> Result<HeaderMap, ApiClientError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        let value = format!("Bearer {}", token);
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&value).map_err(|e| ApiClientError::Config(e.to_string()))?,
        );
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> RestClient {
        let mut config = ClientConfig::from_toml(
            r#"
api_base_url = "http://localhost:8000"
ws_endpoint = "ws://localhost:8000/ws"
request_timeout_ms = 5000
[cache]
default_ttl_ms = 300000
[reconnect]
initial_ms = 1000
max_ms = 30000
max_attempts = 5
"#,
        )
        .unwrap();
        config.api_base_url = base.to_string();
        RestClient::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_encodes_team_names() {
        let rest = client("http://localhost:8000");
        let url = rest.endpoint(&["api", "teams", "red team", "messages"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/teams/red%20team/messages");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let rest = client("http://localhost:8000/dashboard/");
        let url = rest.endpoint(&["api", "stats"]).unwrap();
        assert_eq!(url.path(), "/dashboard/api/stats");
    }

    #[test]
    fn test_error_message_sources() {
        assert_eq!(error_message(404, r#"{"detail":"Team not found"}"#), "Team not found");
        assert_eq!(error_message(500, r#"{"error":"boom"}"#), "boom");
        assert_eq!(error_message(502, "bad gateway body"), "bad gateway body");
        assert_eq!(error_message(503, ""), "Service Unavailable");
    }

    #[test]
    fn test_status_maps_to_fetch_error() {
        let err = FetchError::from(ApiClientError::Status {
            status: 404,
            message: "Team not found".to_string(),
        });
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), "HTTP 404: Team not found");
    }

    #[test]
    fn test_decode_maps_to_decode_error() {
        let json_err = serde_json::from_str::<Vec<Team>>("{").unwrap_err();
        let err = FetchError::from(ApiClientError::Serde(json_err));
        assert!(matches!(err, FetchError::Decode(_)));
        assert_eq!(err.status_code(), 0);
    }

    #[test]
    fn test_bearer_header() {
        let headers = build_auth_headers(Some("t0k")).unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer t0k");
        assert!(build_auth_headers(None).unwrap().is_empty());
    }
}
