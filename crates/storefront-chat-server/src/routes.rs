//! HTTP routes for the chat widget.
//!
//! Every endpoint shares one [`Assistant`]. The chat pipeline runs in a
//! spawned task so a panic inside it becomes a 500 instead of a dropped
//! connection.

use crate::render::{render, SERVER_ERROR_HTML};
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use storefront_chat::{Assistant, FetchError, VERSION};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

/// Items shown by the home-specials probe.
const HOME_SAMPLE: usize = 8;
/// Items shown by the category probes.
const CATEGORY_SAMPLE: usize = 10;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
}

impl AppState {
    pub fn new(assistant: Arc<Assistant>) -> Self {
        Self { assistant }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct IntentParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Build the router with the CORS allow-list applied.
pub fn router(state: AppState, origins: &[String]) -> Router {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/chat", post(chat))
        .route("/intent", get(intent))
        .route("/probe", get(probe))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

/// Serve the router until the process is stopped.
pub async fn start(addr: &str, app: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("chat server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn chat(State(state): State<AppState>, body: Option<Json<ChatRequest>>) -> Response {
    let q = body.map(|Json(req)| req.q).unwrap_or_default();
    let assistant = state.assistant.clone();

    match tokio::spawn(async move { assistant.respond(&q).await }).await {
        Ok(result) => {
            let html = render(&result);
            Json(json!({ "html": html, "result": result })).into_response()
        }
        Err(e) => {
            error!(error = %e, "chat pipeline failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "html": SERVER_ERROR_HTML })),
            )
                .into_response()
        }
    }
}

async fn intent(State(state): State<AppState>, Query(params): Query<IntentParams>) -> Json<serde_json::Value> {
    let intent = state.assistant.classify(&params.q);
    Json(json!({ "q": params.q, "intent": intent }))
}

async fn probe(State(state): State<AppState>, Query(params): Query<ProbeParams>) -> Response {
    let kind = params.kind.unwrap_or_else(|| "sterile".to_string());
    let assistant = &state.assistant;
    let harvester = assistant.harvester();
    let links = assistant.links();

    let body = match kind.as_str() {
        "course" => {
            let course_url = assistant.course_url().await;
            json!({ "ok": true, "type": kind, "course_url": course_url })
        }
        "shipping" => json!({ "ok": true, "type": kind, "url": links.shipping }),
        "homespecials" => match harvester.harvest_home_kits().await {
            Ok(kits) => {
                let sample: Vec<_> = kits.iter().take(HOME_SAMPLE).collect();
                json!({ "ok": true, "type": kind, "count": kits.len(), "sample": sample })
            }
            Err(e) => return probe_failed(&kind, e),
        },
        "kit" => {
            let html = render(&assistant.respond("piercing kit").await);
            json!({ "ok": true, "type": kind, "html": html })
        }
        other => {
            let url = match other {
                "prokits" => &links.pro_kits,
                "safekits" => &links.safe_kits,
                _ => &links.sterilized,
            };
            match harvester.harvest_category(url).await {
                Ok(items) => {
                    let sample: Vec<_> = items.iter().take(CATEGORY_SAMPLE).collect();
                    json!({ "ok": true, "type": kind, "count": items.len(), "sample": sample })
                }
                Err(e) => return probe_failed(&kind, e),
            }
        }
    };
    Json(body).into_response()
}

fn probe_failed(kind: &str, error: FetchError) -> Response {
    warn!(kind, error = %error, "harvest diagnostics failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "ok": false, "type": kind, "error": error.to_string() })),
    )
        .into_response()
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "docs": state.assistant.docs().len(),
        "version": VERSION,
    }))
}
