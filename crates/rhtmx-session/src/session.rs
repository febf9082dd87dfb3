// File: src/session.rs
// Purpose: Per-client session state, navigation and the message loop

use dashmap::DashMap;
use rhtmx_router::{NavigationError, Resolution, ResolvedRoute};
use serde_json::{Map, Value};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::AbortHandle;
use url::Url;
use uuid::Uuid;

use crate::app::{App, PageContext, PageRef};
use crate::error::{SessionError, TransportError};
use crate::locale::LocaleBundle;
use crate::messages::{ClientMessage, InboundMessage};
use crate::theme::Theme;
use crate::transport::{ConnectionInfo, Transport};

// ============================================================================
// Supporting types
// ============================================================================

/// Browser viewport in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSize {
    pub width: f64,
    pub height: f64,
}

/// The page chain a session is currently showing
///
/// Unset (no URL, no pages) until the first internal route resolves.
#[derive(Clone, Default)]
pub struct ActiveRoute {
    pub pages: Vec<PageRef>,
    pub url: Option<Url>,
    pub params: HashMap<String, String>,
    pub remainder: String,
}

impl ActiveRoute {
    pub fn is_set(&self) -> bool {
        self.url.is_some()
    }

    pub fn page_names(&self) -> Vec<&str> {
        self.pages.iter().map(|page| page.name()).collect()
    }
}

impl From<ResolvedRoute<PageRef>> for ActiveRoute {
    fn from(route: ResolvedRoute<PageRef>) -> Self {
        Self {
            pages: route.pages,
            url: Some(route.url),
            params: route.params,
            remainder: route.remainder,
        }
    }
}

impl fmt::Debug for ActiveRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveRoute")
            .field("pages", &self.page_names())
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("params", &self.params)
            .field("remainder", &self.remainder)
            .finish()
    }
}

/// Work scheduled onto a session's own task from elsewhere
pub enum SessionCommand {
    /// Navigate like `Session::navigate_to`
    Navigate { url: String, replace: bool },
    /// Run a closure against the session, then re-sync the client
    Mutate(Box<dyn FnOnce(&Session) + Send>),
    Close,
}

impl fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate { url, replace } => f
                .debug_struct("Navigate")
                .field("url", url)
                .field("replace", replace)
                .finish(),
            Self::Mutate(_) => f.write_str("Mutate(..)"),
            Self::Close => f.write_str("Close"),
        }
    }
}

/// Cloneable, `Send` handle for talking to a session from other tasks
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    closed: Arc<AtomicBool>,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Fails with `SessionError::Closed` once the session has been closed
    pub fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }

    pub fn navigate(&self, url: impl Into<String>, replace: bool) -> Result<(), SessionError> {
        self.send(SessionCommand::Navigate {
            url: url.into(),
            replace,
        })
    }

    pub fn mutate<F>(&self, f: F) -> Result<(), SessionError>
    where
        F: FnOnce(&Session) + Send + 'static,
    {
        self.send(SessionCommand::Mutate(Box::new(f)))
    }

    pub fn close(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryUpdate {
    Push,
    Replace,
    /// The browser already shows the URL (back/forward)
    Keep,
}

/// Values a session is constructed from
pub(crate) struct SessionParts {
    pub app: Arc<App>,
    pub transport: Arc<dyn Transport>,
    pub connection: ConnectionInfo,
    pub base_url: Url,
    pub locale: LocaleBundle,
    pub theme: Theme,
    pub window_size: WindowSize,
    pub user_settings: Map<String, Value>,
}

// ============================================================================
// Session
// ============================================================================

/// One connected client
///
/// Shared as `Arc<Session>`. State that changes after bootstrap sits behind
/// locks or atomics so guards and page builders can read it through `&Session`.
pub struct Session {
    id: Uuid,
    app: Arc<App>,
    transport: Arc<dyn Transport>,
    connection: ConnectionInfo,
    base_url: Url,
    locale: LocaleBundle,
    user_settings: Map<String, Value>,
    theme: RwLock<Theme>,
    window_size: RwLock<WindowSize>,
    attachments: DashMap<TypeId, Box<dyn Any + Send + Sync>>,
    active: RwLock<ActiveRoute>,
    dirty: AtomicBool,
    closed: Arc<AtomicBool>,
    tasks: Arc<DashMap<u64, AbortHandle>>,
    next_task: AtomicU64,
    commands_tx: mpsc::UnboundedSender<SessionCommand>,
    commands_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionCommand>>>,
}

impl Session {
    pub(crate) fn new(parts: SessionParts) -> Arc<Self> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Arc::new(Self {
            id: Uuid::new_v4(),
            app: parts.app,
            transport: parts.transport,
            connection: parts.connection,
            base_url: parts.base_url,
            locale: parts.locale,
            user_settings: parts.user_settings,
            theme: RwLock::new(parts.theme),
            window_size: RwLock::new(parts.window_size),
            attachments: DashMap::new(),
            active: RwLock::new(ActiveRoute::default()),
            dirty: AtomicBool::new(false),
            closed: Arc::new(AtomicBool::new(false)),
            tasks: Arc::new(DashMap::new()),
            next_task: AtomicU64::new(0),
            commands_tx,
            commands_rx: Mutex::new(Some(commands_rx)),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    pub fn locale(&self) -> &LocaleBundle {
        &self.locale
    }

    /// Origin root of the URL the client connected to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn connection(&self) -> &ConnectionInfo {
        &self.connection
    }

    /// Persisted settings document from the handshake
    pub fn user_settings(&self) -> &Map<String, Value> {
        &self.user_settings
    }

    pub async fn theme(&self) -> Theme {
        self.theme.read().await.clone()
    }

    pub async fn window_size(&self) -> WindowSize {
        *self.window_size.read().await
    }

    pub async fn active_route(&self) -> ActiveRoute {
        self.active.read().await.clone()
    }

    pub async fn active_url(&self) -> Option<Url> {
        self.active.read().await.url.clone()
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id,
            closed: Arc::clone(&self.closed),
            commands: self.commands_tx.clone(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Attachments
    // ========================================================================

    /// Stores `value`, replacing any earlier value of the same type
    pub fn attach<T: Send + Sync + 'static>(&self, value: T) {
        self.attachments.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn has_attachment<T: Send + Sync + 'static>(&self) -> bool {
        self.attachments.contains_key(&TypeId::of::<T>())
    }

    /// A clone of the attached `T`
    pub fn attachment<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.with_attachment(|value: &T| value.clone())
    }

    pub fn with_attachment<T, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R>
    where
        T: Send + Sync + 'static,
    {
        let entry = self.attachments.get(&TypeId::of::<T>())?;
        entry.value().downcast_ref::<T>().map(f)
    }

    /// Removes and returns the attached `T`
    pub fn detach<T: Send + Sync + 'static>(&self) -> Option<T> {
        let (_, value) = self.attachments.remove(&TypeId::of::<T>())?;
        value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    // ========================================================================
    // Dirty tracking
    // ========================================================================

    /// Requests a full state sync after the current command finishes
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    // ========================================================================
    // Background tasks
    // ========================================================================

    /// Spawns a task owned by this session
    ///
    /// The task is aborted when the session closes. Tasks spawned after close
    /// are dropped without running.
    pub fn create_task<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            tracing::debug!(session = %self.id, "Not spawning task on closed session");
            return;
        }

        let key = self.next_task.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);
        let (registered_tx, registered_rx) = oneshot::channel::<()>();

        // The body waits until its abort handle is in the map, so its own
        // removal can never run before the insert
        let handle = tokio::spawn(async move {
            if registered_rx.await.is_err() {
                return;
            }
            future.await;
            tasks.remove(&key);
        });

        self.tasks.insert(key, handle.abort_handle());

        // close() may have cleared the map between the check above and the insert
        if self.is_closed() {
            if let Some((_, task)) = self.tasks.remove(&key) {
                task.abort();
            }
            return;
        }

        let _ = registered_tx.send(());
    }

    /// Keeps `value` alive for `timeout`, or until the session closes
    pub fn keep_alive<T: Send + 'static>(&self, value: T, timeout: Duration) {
        self.create_task(async move {
            tokio::time::sleep(timeout).await;
            drop(value);
        });
    }

    /// Number of session-owned tasks still running
    pub fn background_task_count(&self) -> usize {
        self.tasks.len()
    }

    // ========================================================================
    // Talking to the client
    // ========================================================================

    pub async fn send(&self, message: &ClientMessage) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let value = serde_json::to_value(message).map_err(|e| TransportError::Io(e.to_string()))?;
        self.transport.send_message(value).await?;
        Ok(())
    }

    pub async fn evaluate_javascript(&self, code: impl Into<String>) -> Result<(), SessionError> {
        self.send(&ClientMessage::EvaluateJavaScript { code: code.into() })
            .await
    }

    /// Switches theme and pushes its variables to the client
    pub async fn apply_theme(&self, theme: Theme) -> Result<(), SessionError> {
        *self.theme.write().await = theme.clone();
        self.send(&ClientMessage::ApplyTheme { theme }).await
    }

    /// Rebuilds every active page and sends a full state sync
    pub async fn refresh(&self) -> Result<(), SessionError> {
        let active = self.active_route().await;
        self.dirty.store(false, Ordering::SeqCst);

        let pages = match &active.url {
            Some(url) => {
                let ctx = PageContext {
                    session: self,
                    url,
                    params: &active.params,
                    remainder: &active.remainder,
                };
                active.pages.iter().map(|page| page.build(&ctx)).collect()
            }
            None => Vec::new(),
        };

        self.send(&ClientMessage::UpdateState {
            url: active.url.as_ref().map(Url::to_string),
            pages,
            params: active.params,
        })
        .await
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Resolves `target` against the app's routes with this session's guards
    pub async fn resolve(&self, target: &Url) -> Result<Resolution<PageRef>, NavigationError> {
        self.app.router().resolve(self, &self.base_url, target).await
    }

    pub(crate) async fn set_active(&self, route: ResolvedRoute<PageRef>) {
        *self.active.write().await = ActiveRoute::from(route);
    }

    /// Navigates to `url`, relative to the base URL or absolute
    ///
    /// The active route only changes once resolution succeeded. With
    /// `replace` the current browser history entry is overwritten instead of
    /// a new one being pushed.
    pub async fn navigate_to(&self, url: &str, replace: bool) -> Result<(), SessionError> {
        let target = self.base_url.join(url).map_err(|e| NavigationError::Failed {
            url: url.to_string(),
            reason: format!("invalid URL: {e}"),
        })?;

        let history = if replace {
            HistoryUpdate::Replace
        } else {
            HistoryUpdate::Push
        };

        self.navigate(target, history).await
    }

    async fn navigate(&self, target: Url, history: HistoryUpdate) -> Result<(), SessionError> {
        match self.resolve(&target).await? {
            Resolution::External(url) => {
                tracing::debug!(session = %self.id, %url, "Leaving application");
                self.send(&ClientMessage::navigate_external(url.as_str())).await
            }
            Resolution::Internal(route) => {
                let url = route.url.clone();
                let redirected = url != target;
                self.set_active(route).await;

                let instruction = match history {
                    HistoryUpdate::Push => Some(ClientMessage::push_url(url.as_str())),
                    HistoryUpdate::Replace => Some(ClientMessage::replace_url(url.as_str())),
                    HistoryUpdate::Keep if redirected => Some(ClientMessage::replace_url(url.as_str())),
                    HistoryUpdate::Keep => None,
                };
                if let Some(instruction) = instruction {
                    self.send(&instruction).await?;
                }

                tracing::debug!(session = %self.id, %url, "Navigated");
                self.refresh().await
            }
        }
    }

    // ========================================================================
    // Message loop
    // ========================================================================

    /// Handles client messages and commands until either side closes
    ///
    /// Navigation failures are logged and the loop keeps going. A transport
    /// failure ends the loop with an error. The session is closed on return.
    pub async fn serve(self: Arc<Self>) -> Result<(), SessionError> {
        let Some(mut commands) = self.commands_rx.lock().await.take() else {
            // Closed before the loop started, or a second call
            return if self.is_closed() {
                Ok(())
            } else {
                Err(SessionError::Closed)
            };
        };

        tracing::debug!(session = %self.id, "Session listening");

        let result: Result<(), SessionError> = loop {
            let step = tokio::select! {
                message = self.transport.receive_message() => match message {
                    Ok(message) => self.handle_message(message).await,
                    Err(TransportError::Closed) => break Ok(()),
                    Err(err) => break Err(err.into()),
                },
                command = commands.recv() => match command {
                    None | Some(SessionCommand::Close) => break Ok(()),
                    Some(command) => self.apply_command(command).await,
                },
            };

            let step = match step {
                Ok(()) if self.take_dirty() => self.refresh().await,
                other => other,
            };

            match step {
                Ok(()) => {}
                Err(SessionError::Navigation(err)) => {
                    tracing::warn!(session = %self.id, error = %err, "Navigation failed");
                }
                Err(err) => break Err(err),
            }
        };

        self.close();
        result
    }

    async fn handle_message(&self, raw: Value) -> Result<(), SessionError> {
        let message: InboundMessage = match serde_json::from_value(raw.clone()) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(session = %self.id, error = %err, message = %raw, "Ignoring unknown client message");
                return Ok(());
            }
        };

        match message {
            InboundMessage::OnUrlChange { url } => {
                let target = self.base_url.join(&url).map_err(|e| NavigationError::Failed {
                    url: url.clone(),
                    reason: format!("invalid URL: {e}"),
                })?;
                self.navigate(target, HistoryUpdate::Keep).await
            }
            InboundMessage::OnWindowSizeChange { width, height } => {
                *self.window_size.write().await = WindowSize { width, height };
                Ok(())
            }
            InboundMessage::Ping => self.send(&ClientMessage::Pong).await,
        }
    }

    async fn apply_command(&self, command: SessionCommand) -> Result<(), SessionError> {
        match command {
            SessionCommand::Navigate { url, replace } => self.navigate_to(&url, replace).await,
            SessionCommand::Mutate(mutate) => {
                mutate(self);
                self.mark_dirty();
                Ok(())
            }
            SessionCommand::Close => Ok(()),
        }
    }

    /// Closes the session
    ///
    /// Aborts every background task and stops the message loop. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let aborted = self.tasks.len();
        for task in self.tasks.iter() {
            task.value().abort();
        }
        self.tasks.clear();

        // Wake a running loop. If the loop never took the receiver, drop it
        // here so queued and future commands fail instead of piling up.
        let _ = self.commands_tx.send(SessionCommand::Close);
        if let Ok(mut receiver) = self.commands_rx.try_lock() {
            receiver.take();
        }

        tracing::debug!(session = %self.id, aborted_tasks = aborted, "Session closed");
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("base_url", &self.base_url.as_str())
            .field("languages", &self.locale.preferred_languages)
            .field("closed", &self.is_closed())
            .finish()
    }
}
