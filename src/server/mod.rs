//! HTTP surface: canned chat endpoint, crop prediction and highlighting.

pub mod chat;


use crate::config::Settings;
use crate::crop::{self, CropParams};
use crate::highlight::HighlightClient;
use crate::llm::{CompanionError, ErrorBody};
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Shared server state
#[derive(Clone)]
pub struct AppState {
    pub highlighter: Arc<HighlightClient>,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            highlighter: Arc::new(HighlightClient::new(
                settings.highlight_url.clone(),
                settings.highlight_host.clone(),
                settings.rapid_api_key.clone(),
            )),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

fn error_response(error: &CompanionError) -> Response {
    let status = match error {
        CompanionError::Validation(_) => StatusCode::BAD_REQUEST,
        CompanionError::Upstream(_) | CompanionError::Transport(_) => StatusCode::BAD_GATEWAY,
        CompanionError::InvalidState(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: error.user_message(),
        }),
    )
        .into_response()
}

async fn predict_crop(Json(body): Json<Value>) -> Response {
    match crop::predict(&CropParams::from_json(&body)) {
        Ok(crop) => Json(json!({ "prediction": crop })).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
struct HighlightBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    language: String,
}

async fn highlight(State(state): State<AppState>, Json(body): Json<HighlightBody>) -> Response {
    match state.highlighter.highlight(&body.code, &body.language).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            warn!("Highlighting failed: {}", e);
            error_response(&e)
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/integrations/chat-gpt/conversationgpt4",
            post(chat::handle_chat),
        )
        .route("/api/predict-crop", post(predict_crop))
        .route("/api/highlight", post(highlight))
        .with_state(state)
}

/// Serve until the process is stopped
pub async fn serve(settings: &Settings, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(AppState::from_settings(settings))).await?;
    Ok(())
}
