use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::get;
use axum::{Json, Router};
use docsync_orgchart::api::HasEditor;
use docsync_orgchart::prelude::*;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct ShellApp {
    editor: InteractionController<dyn HierarchyBackend>,
}

impl HasEditor for ShellApp {
    fn editor(&self) -> InteractionController<dyn HierarchyBackend> {
        self.editor.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EditorConfig::from_env().context("invalid DOCSYNC_* configuration")?;
    let bind_addr: SocketAddr = config
        .shell_bind
        .parse()
        .with_context(|| format!("invalid DOCSYNC_SHELL_BIND '{}'", config.shell_bind))?;

    let backend: Arc<dyn HierarchyBackend> =
        Arc::new(RestBackend::new(&config).context("failed to build org chart client")?);

    let session = SessionContext::new();
    if env_flag("DOCSYNC_SHELL_DEV_ADMIN") {
        session.populate(SessionUser {
            id: 0,
            username: "dev-admin".to_string(),
            role: Role::Admin,
        });
    }

    let editor = InteractionController::new(backend, session, &config);
    match editor.reload().await {
        Ok(report) if !report.is_clean() => {
            tracing::warn!(anomalies = report.anomalies.len(), "loaded org chart with repairs");
        }
        Ok(_) => {}
        Err(err) => {
            tracing::warn!(error = %err, "initial org chart load failed; POST /org-chart/reload to retry");
        }
    }

    let mut events = editor.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::info!(
                    move_id = %event.move_id,
                    employee_id = %event.child,
                    manager_id = ?event.parent,
                    state = ?event.state,
                    "move state changed"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "move event listener fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app_state = ShellApp { editor };
    let api_v1 = Router::new()
        .route("/healthz", get(health_handler))
        .merge(docsync_orgchart::api::routes::<ShellApp>());
    let app = Router::new().nest("/api/v1", api_v1).with_state(app_state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", bind_addr))?;

    println!("org chart shell listening on http://{}", bind_addr);
    println!("api base path: /api/v1");
    println!("org chart back end: {}", config.base_url);
    println!("set DOCSYNC_SHELL_DEV_ADMIN=true to start signed in as an administrator");

    axum::serve(listener, app)
        .await
        .context("org chart shell failed")
}

fn env_flag(name: &str) -> bool {
    match env::var(name) {
        Ok(value) => {
            let normalized = value.trim().to_ascii_lowercase();
            normalized == "1" || normalized == "true" || normalized == "yes"
        }
        Err(_) => false,
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true
    }))
}
