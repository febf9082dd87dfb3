// File: src/app.rs
// Purpose: Application definition shared by every session

use futures::future::BoxFuture;
use futures::FutureExt;
use rhtmx_router::{RouteNode, RouteTreeError, Router};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use url::Url;

use crate::config::SessionConfig;
use crate::session::Session;
use crate::theme::ThemeConfig;

// ============================================================================
// Pages
// ============================================================================

/// What a page builder gets to look at
pub struct PageContext<'a> {
    pub session: &'a Session,
    /// Active URL, after guard rewrites
    pub url: &'a Url,
    pub params: &'a HashMap<String, String>,
    /// Path segments no route consumed
    pub remainder: &'a str,
}

impl<'a> PageContext<'a> {
    pub fn param(&self, name: &str) -> Option<&'a str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Produces the client-side description of one page in the active chain
pub trait PageBuilder: Send + Sync {
    fn name(&self) -> &str;

    fn build(&self, ctx: &PageContext<'_>) -> Value;
}

/// Page payload stored in the route tree
pub type PageRef = Arc<dyn PageBuilder>;

/// Route node type used by applications
pub type SessionRoute = RouteNode<Session, PageRef>;

struct FnPage<F> {
    name: String,
    build: F,
}

impl<F> PageBuilder for FnPage<F>
where
    F: Fn(&PageContext<'_>) -> Value + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self, ctx: &PageContext<'_>) -> Value {
        (self.build)(ctx)
    }
}

/// Wraps a closure as a page
///
/// # Examples
///
/// ```
/// use rhtmx_session::{page_fn, SessionRoute};
/// use serde_json::json;
///
/// let profile = page_fn("profile", |ctx| json!({ "user": ctx.param("user_id") }));
/// let route = SessionRoute::page("users/{user_id}", profile).unwrap();
/// assert_eq!(route.page_ref().map(|p| p.name()), Some("profile"));
/// ```
pub fn page_fn<F>(name: impl Into<String>, build: F) -> PageRef
where
    F: Fn(&PageContext<'_>) -> Value + Send + Sync + 'static,
{
    Arc::new(FnPage {
        name: name.into(),
        build,
    })
}

// ============================================================================
// App
// ============================================================================

type StartHook = Arc<dyn Fn(Arc<Session>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
type SettingsLoader = Box<dyn Fn(&Session, &Map<String, Value>) + Send + Sync>;
type AttachmentFactory = Box<dyn Fn(&Session) + Send + Sync>;

/// Everything sessions of one application share
pub struct App {
    name: String,
    router: Router<Session, PageRef>,
    theme: ThemeConfig,
    on_session_start: Option<StartHook>,
    settings_loaders: Vec<SettingsLoader>,
    default_attachments: Vec<AttachmentFactory>,
    config: SessionConfig,
}

impl App {
    pub fn builder(name: impl Into<String>) -> AppBuilder {
        AppBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn router(&self) -> &Router<Session, PageRef> {
        &self.router
    }

    pub fn theme(&self) -> &ThemeConfig {
        &self.theme
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Attaches one value per registered settings section
    pub(crate) fn load_user_settings(&self, session: &Session) {
        for loader in &self.settings_loaders {
            loader(session, session.user_settings());
        }
    }

    /// Attaches defaults for types nobody attached yet
    pub(crate) fn apply_default_attachments(&self, session: &Session) {
        for factory in &self.default_attachments {
            factory(session);
        }
    }

    /// Runs `on_session_start` to completion
    ///
    /// A failing hook is logged and does not prevent the session from
    /// starting. A slow one is reported.
    pub(crate) async fn fire_session_start(&self, session: &Arc<Session>) {
        let Some(hook) = &self.on_session_start else {
            return;
        };

        let started = tokio::time::Instant::now();
        let result = hook(Arc::clone(session)).await;
        let elapsed = started.elapsed();

        if let Err(err) = result {
            tracing::error!(session = %session.id(), error = ?err, "on_session_start failed");
        }

        if elapsed > self.config.start_warning_threshold() {
            tracing::warn!(
                session = %session.id(),
                seconds = elapsed.as_secs(),
                "Session startup was delayed by on_session_start. Move long-running work into a background task."
            );
        }
    }
}

/// Builder for `App`
pub struct AppBuilder {
    name: String,
    routes: Vec<SessionRoute>,
    theme: ThemeConfig,
    on_session_start: Option<StartHook>,
    settings_loaders: Vec<SettingsLoader>,
    default_attachments: Vec<AttachmentFactory>,
    config: SessionConfig,
}

impl AppBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: Vec::new(),
            theme: ThemeConfig::default(),
            on_session_start: None,
            settings_loaders: Vec::new(),
            default_attachments: Vec::new(),
            config: SessionConfig::default(),
        }
    }

    pub fn with_route(mut self, route: SessionRoute) -> Self {
        self.routes.push(route);
        self
    }

    pub fn with_routes<I>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = SessionRoute>,
    {
        self.routes.extend(routes);
        self
    }

    pub fn with_theme(mut self, theme: ThemeConfig) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Hook awaited for every new session before its first route resolves
    pub fn on_session_start<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<Session>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_session_start = Some(Arc::new(move |session| hook(session).boxed()));
        self
    }

    /// Loads `T` from the `section` key of the client's persisted settings
    ///
    /// Missing or malformed sections fall back to `T::default()`.
    pub fn with_user_settings<T>(mut self, section: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Default + Send + Sync + 'static,
    {
        let section = section.into();

        self.settings_loaders.push(Box::new(move |session, document| {
            let settings = match document.get(&section) {
                None => T::default(),
                Some(raw) => serde_json::from_value::<T>(raw.clone()).unwrap_or_else(|err| {
                    tracing::warn!(
                        session = %session.id(),
                        section = %section,
                        error = %err,
                        "Malformed user settings section, using defaults"
                    );
                    T::default()
                }),
            };
            session.attach(settings);
        }));
        self
    }

    /// Attaches a clone of `value` to sessions that have no `T` yet
    pub fn with_default_attachment<T>(mut self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.default_attachments.push(Box::new(move |session| {
            if !session.has_attachment::<T>() {
                session.attach(value.clone());
            }
        }));
        self
    }

    /// Validates the route tree and builds the app
    pub fn build(self) -> Result<Arc<App>, RouteTreeError> {
        let router = Router::new(self.routes)?.with_max_redirects(self.config.max_redirects);

        Ok(Arc::new(App {
            name: self.name,
            router,
            theme: self.theme,
            on_session_start: self.on_session_start,
            settings_loaders: self.settings_loaders,
            default_attachments: self.default_attachments,
            config: self.config,
        }))
    }
}
