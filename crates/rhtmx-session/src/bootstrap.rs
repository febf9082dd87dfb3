// File: src/bootstrap.rs
// Purpose: Turn a client handshake into a running, registered session

use rhtmx_router::{base_url_of, Resolution};
use std::sync::Arc;
use std::time::Instant;
use url::Url;
use uuid::Uuid;

use crate::app::{App, PageRef};
use crate::error::SessionError;
use crate::handshake::InitialClientMessage;
use crate::locale::LocaleBundle;
use crate::messages::ClientMessage;
use crate::server::SessionRegistry;
use crate::session::{Session, SessionParts, WindowSize};
use crate::theme::Theme;
use crate::transport::{ConnectionInfo, Transport};

/// Where session creation currently is
///
/// Stages advance strictly in declaration order. `Aborted` is only reachable
/// from route resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapStage {
    ReceivedHandshake,
    LocaleNormalized,
    SessionConstructed,
    AttachmentsApplied,
    StartEventFired,
    RouteResolved,
    ThemeApplied,
    FirstSyncSent,
    Listening,
    Aborted(String),
}

struct Progress {
    stage: BootstrapStage,
    session: Option<Uuid>,
    started: Instant,
}

impl Progress {
    fn new() -> Self {
        Self {
            stage: BootstrapStage::ReceivedHandshake,
            session: None,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: BootstrapStage) {
        tracing::debug!(
            session = ?self.session,
            from = ?self.stage,
            to = ?next,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Session bootstrap"
        );
        self.stage = next;
    }
}

/// Builds, initializes and registers a session
///
/// On route resolution failure the half-built session is closed (its
/// background tasks cancelled) and never registered.
pub(crate) async fn bootstrap(
    app: &Arc<App>,
    registry: &Arc<SessionRegistry>,
    initial: InitialClientMessage,
    transport: Arc<dyn Transport>,
    connection: ConnectionInfo,
) -> Result<Arc<Session>, SessionError> {
    let mut progress = Progress::new();

    let locale = LocaleBundle::negotiate(&initial, app.config());
    progress.advance(BootstrapStage::LocaleNormalized);

    let theme = app.theme().resolve(initial.prefers_light_theme).clone();
    let requested = connection.url.clone();

    let session = Session::new(SessionParts {
        app: Arc::clone(app),
        transport,
        base_url: base_url_of(&connection.url),
        connection,
        locale,
        theme: theme.clone(),
        window_size: WindowSize {
            width: initial.window_width,
            height: initial.window_height,
        },
        user_settings: initial.user_settings,
    });
    progress.session = Some(session.id());
    progress.advance(BootstrapStage::SessionConstructed);

    app.load_user_settings(&session);
    app.apply_default_attachments(&session);
    progress.advance(BootstrapStage::AttachmentsApplied);

    app.fire_session_start(&session).await;
    progress.advance(BootstrapStage::StartEventFired);

    let resolution = match session.resolve(&requested).await {
        Ok(resolution) => resolution,
        Err(err) => {
            progress.advance(BootstrapStage::Aborted(err.to_string()));
            session.close();
            return Err(err.into());
        }
    };
    progress.advance(BootstrapStage::RouteResolved);

    if let Err(err) = deliver_initial_state(&session, resolution, &requested, theme, &mut progress).await {
        session.close();
        return Err(err);
    }

    registry.register(Arc::clone(&session)).await;
    progress.advance(BootstrapStage::Listening);

    tracing::info!(
        session = %session.id(),
        url = %requested,
        language = session.locale().primary_language(),
        "Session started"
    );

    Ok(session)
}

async fn deliver_initial_state(
    session: &Session,
    resolution: Resolution<PageRef>,
    requested: &Url,
    theme: Theme,
    progress: &mut Progress,
) -> Result<(), SessionError> {
    match resolution {
        Resolution::External(url) => {
            session.send(&ClientMessage::navigate_external(url.as_str())).await?;
        }
        Resolution::Internal(route) => {
            // Guards may have moved us; keep the address bar in step
            if &route.url != requested {
                session.send(&ClientMessage::replace_url(route.url.as_str())).await?;
            }
            session.set_active(route).await;
        }
    }

    session.apply_theme(theme).await?;
    progress.advance(BootstrapStage::ThemeApplied);

    session.refresh().await?;
    progress.advance(BootstrapStage::FirstSyncSent);

    Ok(())
}
