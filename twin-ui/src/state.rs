//! Shared application state for the chat server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::broadcast;
use twin::io::model::ChatModel;
use twin::io::sink::LeadSink;
use twin::session::{Agent, Session, TurnOutcome, TurnReply};
use uuid::Uuid;

/// Events broadcast to SSE clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    TurnCompleted {
        session_id: Uuid,
        outcome: TurnOutcome,
    },
    LeadCaptured {
        session_id: Uuid,
        company: String,
    },
}

/// Object-safe view of an agent, so handlers don't carry its type parameters.
pub trait Responder: Send + Sync {
    fn respond(&self, session: &mut Session, message: &str) -> TurnReply;
}

impl<M, S> Responder for Agent<M, S>
where
    M: ChatModel + Send + Sync,
    S: LeadSink + Send + Sync,
{
    fn respond(&self, session: &mut Session, message: &str) -> TurnReply {
        self.run_turn(session, message)
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Agent shared by every session; read-only.
    pub agent: Arc<dyn Responder>,
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
    /// Broadcast sender for conversation events.
    pub event_tx: Arc<broadcast::Sender<ChangeEvent>>,
}

impl AppState {
    pub fn new(agent: Arc<dyn Responder>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            agent,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            event_tx: Arc::new(event_tx),
        }
    }

    pub fn create_session(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(Mutex::new(Session::new())));
        id
    }

    pub fn session(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Drop a session and its history. Returns false if it did not exist.
    pub fn remove_session(&self, id: Uuid) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }
}
