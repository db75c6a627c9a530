use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::json;

use crate::client::HierarchyBackend;
use crate::controller::InteractionController;
use crate::error::{ErrorKind, LibError};
use crate::gestures::Gesture;
use crate::models::EmployeeId;
use crate::session::SessionUser;

#[derive(Debug)]
pub struct AppError(pub LibError);

impl From<LibError> for AppError {
    fn from(value: LibError) -> Self {
        Self(value)
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.kind {
            ErrorKind::MalformedData => StatusCode::BAD_GATEWAY,
            ErrorKind::InvalidMove => StatusCode::CONFLICT,
            ErrorKind::Network => StatusCode::BAD_GATEWAY,
            ErrorKind::Persistence => StatusCode::BAD_GATEWAY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(
                kind = ?self.0.kind,
                code = self.0.code,
                error = %self.0.source,
                "org chart request failed"
            );
        } else {
            tracing::debug!(
                kind = ?self.0.kind,
                code = self.0.code,
                error = %self.0.source,
                "org chart request refused"
            );
        }
        (
            status,
            Json(json!({
                "error": {
                    "code": self.0.code,
                    "message": self.0.public,
                    "retryable": self.0.is_retryable(),
                }
            })),
        )
            .into_response()
    }
}

pub trait HasEditor {
    fn editor(&self) -> InteractionController<dyn HierarchyBackend>;
}

async fn chart_handler<S>(State(app): State<S>) -> impl IntoResponse
where
    S: HasEditor + Clone + Send + Sync + 'static,
{
    Json(app.editor().chart_view().await)
}

async fn unassigned_handler<S>(State(app): State<S>) -> impl IntoResponse
where
    S: HasEditor + Clone + Send + Sync + 'static,
{
    Json(app.editor().unassigned().await)
}

async fn gesture_handler<S>(
    State(app): State<S>,
    Json(gesture): Json<Gesture>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasEditor + Clone + Send + Sync + 'static,
{
    let outcome = app.editor().handle_gesture(gesture).await?;
    Ok(Json(outcome))
}

async fn reload_handler<S>(State(app): State<S>) -> Result<impl IntoResponse, AppError>
where
    S: HasEditor + Clone + Send + Sync + 'static,
{
    let report = app.editor().reload().await?;
    Ok(Json(report))
}

async fn move_state_handler<S>(
    State(app): State<S>,
    Path(employee_id): Path<i64>,
) -> impl IntoResponse
where
    S: HasEditor + Clone + Send + Sync + 'static,
{
    let editor = app.editor();
    let employee_id = EmployeeId(employee_id);
    Json(json!({
        "employeeId": employee_id,
        "state": editor.move_state(employee_id).await,
        "lastResolution": editor.last_resolution(employee_id).await,
    }))
}

async fn sign_in_handler<S>(
    State(app): State<S>,
    Json(user): Json<SessionUser>,
) -> impl IntoResponse
where
    S: HasEditor + Clone + Send + Sync + 'static,
{
    app.editor().session().populate(user);
    StatusCode::NO_CONTENT
}

async fn sign_out_handler<S>(State(app): State<S>) -> impl IntoResponse
where
    S: HasEditor + Clone + Send + Sync + 'static,
{
    app.editor().session().clear();
    StatusCode::NO_CONTENT
}

pub fn routes<S>() -> Router<S>
where
    S: HasEditor + Clone + Send + Sync + 'static,
{
    tracing::info!("Registering route /org-chart [GET]");
    tracing::info!("Registering route /org-chart/unassigned [GET]");
    tracing::info!("Registering route /org-chart/gestures [POST]");
    tracing::info!("Registering route /org-chart/reload [POST]");
    tracing::info!("Registering route /org-chart/moves/{{employee_id}} [GET]");
    tracing::info!("Registering route /org-chart/session [PUT,DELETE]");

    Router::new()
        .route("/org-chart", get(chart_handler::<S>))
        .route("/org-chart/unassigned", get(unassigned_handler::<S>))
        .route("/org-chart/gestures", post(gesture_handler::<S>))
        .route("/org-chart/reload", post(reload_handler::<S>))
        .route(
            "/org-chart/moves/{employee_id}",
            get(move_state_handler::<S>),
        )
        .route(
            "/org-chart/session",
            put(sign_in_handler::<S>).delete(sign_out_handler::<S>),
        )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::EditorConfig;
    use crate::error::Result;
    use crate::models::EmployeeRecord;
    use crate::session::{Role, SessionContext};

    struct FixedBackend {
        records: Value,
    }

    #[async_trait]
    impl HierarchyBackend for FixedBackend {
        async fn fetch_employees(&self) -> Result<Vec<EmployeeRecord>> {
            Ok(serde_json::from_value(self.records.clone()).expect("valid records"))
        }

        async fn assign_manager(
            &self,
            _employee_id: EmployeeId,
            _manager_id: Option<EmployeeId>,
        ) -> Result<()> {
            Ok(())
        }

        async fn remove_manager(&self, _employee_id: EmployeeId) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Clone)]
    struct TestApp {
        editor: InteractionController<dyn HierarchyBackend>,
    }

    impl HasEditor for TestApp {
        fn editor(&self) -> InteractionController<dyn HierarchyBackend> {
            self.editor.clone()
        }
    }

    async fn test_router(role: Role) -> Router {
        let backend: Arc<dyn HierarchyBackend> = Arc::new(FixedBackend {
            records: json!([
                {"id": 1, "firstName": "Amara", "managerId": null},
                {"id": 2, "firstName": "Ben", "managerId": 1},
                {"id": 3, "firstName": "Chen", "managerId": null}
            ]),
        });
        let session = SessionContext::signed_in(SessionUser {
            id: 7,
            username: "admin".to_string(),
            role: Role::Admin,
        });
        let editor = InteractionController::new(backend, session, &EditorConfig::default());
        editor.reload().await.expect("reload should succeed");
        editor.session().populate(SessionUser {
            id: 8,
            username: "console".to_string(),
            role,
        });
        routes::<TestApp>().with_state(TestApp { editor })
    }

    fn gesture_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/org-chart/gestures")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build")
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = resp
            .into_body()
            .collect()
            .await
            .expect("body should read")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("body should be json")
    }

    #[tokio::test]
    async fn gesture_endpoint_commits_move() {
        let router = test_router(Role::Admin).await;

        let resp = router
            .oneshot(gesture_request(json!({
                "type": "drop_on_node",
                "employeeId": 3,
                "targetId": 2
            })))
            .await
            .expect("router should respond");

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert!(body["moveId"].is_string());
        assert_eq!(
            body["move"],
            json!({"child": 3, "parent": 2, "kind": "assign"})
        );
        assert_eq!(body["state"], "committed");
    }

    #[tokio::test]
    async fn gesture_endpoint_reports_cycles_as_conflicts() {
        let router = test_router(Role::Admin).await;

        let resp = router
            .oneshot(gesture_request(json!({
                "type": "connect",
                "sourceId": 2,
                "targetId": 1
            })))
            .await
            .expect("router should respond");

        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "cycle");
        assert_eq!(body["error"]["retryable"], false);
    }

    #[tokio::test]
    async fn gesture_endpoint_refuses_non_admins() {
        let router = test_router(Role::Doctor).await;

        let resp = router
            .oneshot(gesture_request(json!({
                "type": "delete_edge",
                "employeeId": 2
            })))
            .await
            .expect("router should respond");

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_json(resp).await;
        assert!(body["error"]["message"].is_string());
    }

    #[test]
    fn error_kinds_map_to_statuses() {
        let cases = [
            (
                LibError::invalid_move("cycle", "no", anyhow!("x")),
                StatusCode::CONFLICT,
            ),
            (
                LibError::forbidden("no", anyhow!("x")),
                StatusCode::FORBIDDEN,
            ),
            (
                LibError::timeout("slow", anyhow!("x")),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                LibError::persistence("down", anyhow!("x")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                LibError::unknown("oops", anyhow!("x")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError(err).into_response().status(), status);
        }
    }
}
