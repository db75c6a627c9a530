//! Access to the DocSync org-chart endpoints.

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};

use crate::config::EditorConfig;
use crate::error::{LibError, Result};
use crate::models::{
    AssignManagerPayload, EmployeeId, EmployeeListResponse, EmployeeRecord, RemoveManagerPayload,
};

pub const ORG_CHART_DATA_PATH: &str = "/api/org-chart/data";
pub const ORG_CHART_ASSIGN_PATH: &str = "/api/org-chart/assign";
pub const ORG_CHART_REMOVE_PATH: &str = "/api/org-chart/remove";

/// The persistence side of the editor. The back end is the system of record;
/// the editor only reads employees and changes their manager.
#[async_trait]
pub trait HierarchyBackend: Send + Sync {
    async fn fetch_employees(&self) -> Result<Vec<EmployeeRecord>>;

    /// `None` makes the employee a root.
    async fn assign_manager(
        &self,
        employee_id: EmployeeId,
        manager_id: Option<EmployeeId>,
    ) -> Result<()>;

    async fn remove_manager(&self, employee_id: EmployeeId) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct RestBackend {
    http: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl RestBackend {
    pub fn new(config: &EditorConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| LibError::unknown("Failed to create HTTP client", anyhow!(err)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, self.url(path))
            .header("Accept", "application/json");
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> Result<Response> {
        let response = builder.send().await.map_err(|err| {
            tracing::warn!(path, error = %err, "org chart request failed to send");
            LibError::from(err)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(path, %status, "org chart request rejected");
        Err(status_error(status, &body))
    }
}

#[async_trait]
impl HierarchyBackend for RestBackend {
    async fn fetch_employees(&self) -> Result<Vec<EmployeeRecord>> {
        let response = self
            .send(self.request(Method::GET, ORG_CHART_DATA_PATH), ORG_CHART_DATA_PATH)
            .await?;
        let listing: EmployeeListResponse = response.json().await?;
        let records = listing.into_records();
        tracing::debug!(count = records.len(), "fetched employees");
        Ok(records)
    }

    async fn assign_manager(
        &self,
        employee_id: EmployeeId,
        manager_id: Option<EmployeeId>,
    ) -> Result<()> {
        let payload = AssignManagerPayload {
            doctor_id: employee_id,
            manager_id,
        };
        self.send(
            self.request(Method::POST, ORG_CHART_ASSIGN_PATH)
                .json(&payload),
            ORG_CHART_ASSIGN_PATH,
        )
        .await?;
        Ok(())
    }

    async fn remove_manager(&self, employee_id: EmployeeId) -> Result<()> {
        let payload = RemoveManagerPayload {
            doctor_id: employee_id,
        };
        self.send(
            self.request(Method::POST, ORG_CHART_REMOVE_PATH)
                .json(&payload),
            ORG_CHART_REMOVE_PATH,
        )
        .await?;
        Ok(())
    }
}

/// Maps a non-success status to the error taxonomy. Conflicts and validation
/// failures are the back end refusing the move itself; anything else is a
/// failure to persist it.
pub fn status_error(status: StatusCode, body: &str) -> LibError {
    let detail = anyhow!(
        "org chart API error {}: {}",
        status,
        body.chars().take(200).collect::<String>()
    );
    match status {
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            LibError::invalid_move(
                "backend_conflict",
                "The server refused this reporting change",
                detail,
            )
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LibError::forbidden("You are not allowed to change the org chart", detail)
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            LibError::timeout("The server took too long to respond", detail)
        }
        _ => LibError::persistence("The server could not save this change", detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn conflicts_map_to_invalid_move() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::CONFLICT,
            StatusCode::UNPROCESSABLE_ENTITY,
        ] {
            let err = status_error(status, "manager would create a loop");
            assert_eq!(err.kind, ErrorKind::InvalidMove);
            assert_eq!(err.code, "backend_conflict");
        }
    }

    #[test]
    fn server_failures_map_to_persistence() {
        let err = status_error(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(err.kind, ErrorKind::Persistence);
        assert!(err.is_retryable());

        let err = status_error(StatusCode::GATEWAY_TIMEOUT, "");
        assert_eq!(err.kind, ErrorKind::Timeout);

        let err = status_error(StatusCode::FORBIDDEN, "");
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }

    #[test]
    fn error_detail_is_truncated() {
        let body = "x".repeat(1_000);
        let err = status_error(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert!(err.source.to_string().len() < 300);
    }

    #[test]
    fn urls_join_without_double_slashes() {
        let config = EditorConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..EditorConfig::default()
        };
        let backend = RestBackend::new(&config).expect("client should build");
        assert_eq!(backend.base_url(), "http://localhost:8080");
        assert_eq!(
            backend.url(ORG_CHART_ASSIGN_PATH),
            "http://localhost:8080/api/org-chart/assign"
        );
    }
}
