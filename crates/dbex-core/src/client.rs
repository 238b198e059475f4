use std::thread;
use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;

const DBEX_VERSION: &str = env!("CARGO_PKG_VERSION");
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 250;

/// Typed failure of one workspace API call. `NotFound` is split out
/// because several kinds treat a vanished object as a per-object warning
/// rather than a driver failure.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("resource not found: {path}")]
    NotFound { path: String },
    #[error("workspace API returned {status} for {path}: {message}")]
    Http {
        status: u16,
        path: String,
        message: String,
    },
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Thin blocking client for the Databricks REST API. One instance is
/// shared by all listing workers of a run.
pub struct WorkspaceClient {
    http: Client,
    base: String,
    token: String,
}

impl WorkspaceClient {
    pub fn new(host: &str, token: &str) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(format!("dbex/{DBEX_VERSION}"))
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base: host.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// GET `path` with query parameters, retrying throttled and transient
    /// server failures a bounded number of times.
    pub fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        let url = format!("{}{path}", self.base);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.token)
                .query(query)
                .send();
            let response = match response {
                Ok(response) => response,
                Err(source) => {
                    return Err(ApiError::Transport {
                        path: path.to_string(),
                        source,
                    })
                }
            };
            let status = response.status();
            if retryable(status) && attempt < RETRY_ATTEMPTS {
                tracing::debug!(%path, %status, attempt, "retrying throttled request");
                thread::sleep(Duration::from_millis(RETRY_BASE_DELAY_MS * u64::from(attempt)));
                continue;
            }
            if status == StatusCode::NOT_FOUND {
                return Err(ApiError::NotFound {
                    path: path.to_string(),
                });
            }
            if !status.is_success() {
                let message = response
                    .text()
                    .ok()
                    .and_then(|body| extract_error_message(&body))
                    .unwrap_or_else(|| status.to_string());
                return Err(ApiError::Http {
                    status: status.as_u16(),
                    path: path.to_string(),
                    message,
                });
            }
            return response.json().map_err(|source| ApiError::Transport {
                path: path.to_string(),
                source,
            });
        }
    }
}

fn retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::SERVICE_UNAVAILABLE
        || status == StatusCode::BAD_GATEWAY
}

/// API errors carry `{"error_code": ..., "message": ...}`; fall back to the
/// raw body when the payload is not that shape.
fn extract_error_message(body: &str) -> Option<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => value
            .get("message")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .or_else(|| Some(body.to_string())),
        Err(_) if body.is_empty() => None,
        Err(_) => Some(body.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use serde_json::json;

    fn client_for(server: &Server) -> WorkspaceClient {
        WorkspaceClient::new(&server.url_str(""), "dapi-test").expect("client")
    }

    #[test]
    fn get_returns_parsed_json() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/repos"))
                .respond_with(json_encoded(json!({"repos": [{"id": 1}]}))),
        );
        let value = client_for(&server).get("/api/2.0/repos", &[]).unwrap();
        assert_eq!(value["repos"][0]["id"], 1);
    }

    #[test]
    fn missing_objects_classify_as_not_found() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.1/clusters/get"))
                .respond_with(status_code(404)),
        );
        let err = client_for(&server)
            .get("/api/2.1/clusters/get", &[("cluster_id", "gone")])
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn throttling_is_retried_until_success() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.2/jobs/list"))
                .times(2)
                .respond_with(cycle![status_code(429), json_encoded(json!({"jobs": []}))]),
        );
        let value = client_for(&server).get("/api/2.2/jobs/list", &[]).unwrap();
        assert_eq!(value["jobs"], json!([]));
    }

    #[test]
    fn api_error_message_is_surfaced() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/pipelines"))
                .respond_with(
                    status_code(403).body(r#"{"error_code":"PERMISSION_DENIED","message":"nope"}"#),
                ),
        );
        let err = client_for(&server).get("/api/2.0/pipelines", &[]).unwrap_err();
        match err {
            ApiError::Http { status, message, .. } => {
                assert_eq!(status, 403);
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
