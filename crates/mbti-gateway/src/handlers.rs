use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mbti_core::{Exchange, Mbti, TurnError};

use super::server::AppState;

#[derive(serde::Deserialize)]
pub(crate) struct SetMbtiRequest {
    #[serde(default)]
    pub session: Option<String>,
    pub mbti: String,
}

#[derive(serde::Serialize)]
struct SetMbtiResponse {
    reply: String,
    session: String,
}

#[derive(serde::Deserialize)]
pub(crate) struct ChatRequest {
    pub session: String,
    pub message: String,
}

#[derive(serde::Serialize)]
struct ChatResponse {
    reply: String,
    history: Vec<Exchange>,
}

#[derive(serde::Deserialize)]
pub(crate) struct ResetRequest {
    pub session: String,
}

#[derive(serde::Serialize)]
struct ReplyOnly {
    reply: String,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    sessions: usize,
}

pub(crate) async fn set_mbti_handler(
    State(state): State<AppState>,
    Json(req): Json<SetMbtiRequest>,
) -> Response {
    let code: Mbti = match req.mbti.parse() {
        Ok(code) => code,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ReplyOnly {
                    reply: TurnError::from(e).user_message(),
                }),
            )
                .into_response();
        }
    };

    let id = req
        .session
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let handle = state.sessions.get_or_create(&id).await;
    let reply = state
        .orchestrator
        .select_persona(&mut *handle.lock().await, code);
    Json(SetMbtiResponse { reply, session: id }).into_response()
}

pub(crate) async fn chat_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Response {
    let Some(handle) = state.sessions.get(&req.session).await else {
        tracing::debug!(session = %req.session, "chat on unknown session");
        return Json(ChatResponse {
            reply: TurnError::PersonaNotSet.user_message(),
            history: Vec::new(),
        })
        .into_response();
    };

    let mut session = handle.lock().await;
    let reply = state.orchestrator.reply(&mut session, &req.message).await;
    Json(ChatResponse {
        reply,
        history: session.history().to_vec(),
    })
    .into_response()
}

pub(crate) async fn reset_handler(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> Response {
    let Some(handle) = state.sessions.get(&req.session).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ReplyOnly {
                reply: "Unknown session.".into(),
            }),
        )
            .into_response();
    };
    state.orchestrator.reset(&mut *handle.lock().await);
    Json(ReplyOnly {
        reply: "Conversation cleared.".into(),
    })
    .into_response()
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        sessions: state.sessions.len().await,
    })
}
