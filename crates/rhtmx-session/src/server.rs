// File: src/server.rs
// Purpose: Accept connections and track the listener task of every session

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::app::App;
use crate::bootstrap::bootstrap;
use crate::error::SessionError;
use crate::handshake::InitialClientMessage;
use crate::session::Session;
use crate::transport::{ConnectionInfo, Transport};

struct RegisteredSession {
    session: Arc<Session>,
    listener: JoinHandle<()>,
}

/// Live sessions and their listener tasks
///
/// A session is present from the moment its listener is spawned until it
/// closes.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, RegisteredSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the session's message loop and records it
    pub(crate) async fn register(self: &Arc<Self>, session: Arc<Session>) {
        // Held across spawn so the listener cannot deregister before insert
        let mut sessions = self.sessions.lock().await;

        let id = session.id();
        let registry = Arc::clone(self);
        let listening = Arc::clone(&session);

        let listener = tokio::spawn(async move {
            if let Err(err) = listening.serve().await {
                tracing::warn!(session = %id, error = %err, "Session loop ended with an error");
            }
            registry.after_session_closed(id).await;
        });

        sessions.insert(id, RegisteredSession { session, listener });
    }

    /// Forgets a session and stops its listener
    ///
    /// Returns false if the session was not registered.
    pub async fn after_session_closed(&self, id: Uuid) -> bool {
        let Some(entry) = self.sessions.lock().await.remove(&id) else {
            return false;
        };

        entry.session.close();
        entry.listener.abort();
        tracing::debug!(session = %id, "Session deregistered");
        true
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .await
            .get(&id)
            .map(|entry| Arc::clone(&entry.session))
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.sessions.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Closes every registered session
    pub async fn close_all(&self) {
        let entries: Vec<RegisteredSession> =
            self.sessions.lock().await.drain().map(|(_, entry)| entry).collect();

        for entry in entries {
            entry.session.close();
            entry.listener.abort();
        }
    }
}

/// Entry point for new client connections
#[derive(Clone)]
pub struct AppServer {
    app: Arc<App>,
    registry: Arc<SessionRegistry>,
}

impl AppServer {
    pub fn new(app: Arc<App>) -> Self {
        Self {
            app,
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Reads the handshake from `transport`, then creates the session
    ///
    /// Malformed handshake fields fall back to their defaults one by one. A
    /// first message that is not an object is replaced by defaults entirely.
    pub async fn accept(
        &self,
        transport: Arc<dyn Transport>,
        connection: ConnectionInfo,
    ) -> Result<Arc<Session>, SessionError> {
        let raw = transport.receive_message().await?;

        let initial = InitialClientMessage::from_value_lenient(raw);
        if initial.is_none() {
            tracing::warn!("Client sent a handshake that is not an object, using defaults");
        }

        self.create_session(initial, transport, connection).await
    }

    /// Creates, initializes and registers a session
    ///
    /// Fails if the initial route cannot be resolved; nothing is registered
    /// in that case.
    pub async fn create_session(
        &self,
        initial: Option<InitialClientMessage>,
        transport: Arc<dyn Transport>,
        connection: ConnectionInfo,
    ) -> Result<Arc<Session>, SessionError> {
        let initial = initial.unwrap_or_else(InitialClientMessage::from_defaults);
        bootstrap(&self.app, &self.registry, initial, transport, connection).await
    }

    /// Closes a session and cancels its listener
    pub async fn close_session(&self, id: Uuid) -> bool {
        self.registry.after_session_closed(id).await
    }
}
