//! HTTP route handlers for the chat API.

use std::sync::PoisonError;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get, post};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use twin::core::lead::RecruiterLead;
use twin::core::types::Turn;
use twin::session::{LeadNotice, Session, TurnOutcome};
use uuid::Uuid;

use crate::state::{AppState, ChangeEvent, SessionHandle};

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", delete(delete_session))
        .route("/sessions/{id}/messages", post(post_message))
        .route("/sessions/{id}/history", get(get_history))
        .route("/sessions/{id}/leads", get(get_leads))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Serialize)]
struct SessionCreated {
    session_id: Uuid,
}

/// POST /api/sessions - start a conversation with empty history.
async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let session_id = state.create_session();
    info!(%session_id, "session created");
    (StatusCode::CREATED, Json(SessionCreated { session_id }))
}

/// DELETE /api/sessions/:id - abandon a conversation and its history.
async fn delete_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if state.remove_session(id) {
        info!(session_id = %id, "session removed");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Deserialize)]
struct MessageRequest {
    message: String,
}

#[derive(Serialize)]
struct MessageResponse {
    reply: String,
    outcome: TurnOutcome,
    lead_notice: Option<LeadNotice>,
    model_calls: u32,
    tool_calls: u32,
}

/// POST /api/sessions/:id/messages - run one turn.
///
/// The turn blocks on the model server, so it runs on the blocking pool.
/// Messages to the same session are serialized by the session lock.
async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, StatusCode> {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let session = state.session(id).ok_or(StatusCode::NOT_FOUND)?;

    let agent = state.agent.clone();
    let reply = tokio::task::spawn_blocking(move || {
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        agent.respond(&mut session, &message)
    })
    .await
    .map_err(|err| {
        warn!(error = %err, "turn task failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if let Some(LeadNotice::Captured { lead }) = &reply.lead {
        let _ = state.event_tx.send(ChangeEvent::LeadCaptured {
            session_id: id,
            company: lead.company.clone(),
        });
    }
    let _ = state.event_tx.send(ChangeEvent::TurnCompleted {
        session_id: id,
        outcome: reply.outcome,
    });

    Ok(Json(MessageResponse {
        reply: reply.text,
        outcome: reply.outcome,
        lead_notice: reply.lead,
        model_calls: reply.model_calls,
        tool_calls: reply.tool_calls,
    }))
}

#[derive(Serialize)]
struct HistoryResponse {
    turns: Vec<Turn>,
}

/// GET /api/sessions/:id/history - full transcript, oldest first.
async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, StatusCode> {
    let session = state.session(id).ok_or(StatusCode::NOT_FOUND)?;
    let turns = read_session(session, |session| session.history().turns().to_vec()).await?;
    Ok(Json(HistoryResponse { turns }))
}

#[derive(Serialize)]
struct LeadsResponse {
    leads: Vec<RecruiterLead>,
}

/// GET /api/sessions/:id/leads - leads captured in this conversation.
async fn get_leads(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadsResponse>, StatusCode> {
    let session = state.session(id).ok_or(StatusCode::NOT_FOUND)?;
    let leads = read_session(session, |session| session.leads().to_vec()).await?;
    Ok(Json(LeadsResponse { leads }))
}

/// Read a session on the blocking pool, since a running turn holds its lock.
async fn read_session<T, F>(session: SessionHandle, read: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Session) -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let session = session.lock().unwrap_or_else(PoisonError::into_inner);
        read(&session)
    })
    .await
    .map_err(|err| {
        warn!(error = %err, "session read failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
