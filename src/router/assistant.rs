//! Writing assistant routes. Answer `503` while the assistant is disabled.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::assistant::{ChatMessage, CorrectionStyle};
use crate::error::Result;
use crate::router::Valid;

#[derive(Debug, Deserialize, Validate)]
pub struct ChatBody {
    #[serde(default)]
    history: Vec<ChatMessage>,
    #[validate(length(min = 1, max = 4096))]
    message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CorrectBody {
    #[validate(length(min = 1, max = 20_000))]
    text: String,
    style: CorrectionStyle,
}

#[derive(Debug, Serialize)]
pub struct Reply {
    text: String,
}

async fn chat(
    State(state): State<AppState>,
    Valid(body): Valid<ChatBody>,
) -> Result<Json<Reply>> {
    let text = state.assistant.chat(&body.history, &body.message)?;
    Ok(Json(Reply { text }))
}

async fn correct(
    State(state): State<AppState>,
    Valid(body): Valid<CorrectBody>,
) -> Result<Json<Reply>> {
    let text = state.assistant.correct_text(&body.text, body.style)?;
    Ok(Json(Reply { text }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/correct", post(correct))
}
