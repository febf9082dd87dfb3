//! # RHTMX Session
//!
//! Server side of a live RHTMX client connection:
//!
//! - **Handshake**: the client reports languages, number and date formats,
//!   timezone, window size, theme preference and persisted settings
//! - **Bootstrap**: those values are validated, a `Session` is built, the
//!   app's start hook runs, guards resolve the requested URL and the first
//!   full state sync goes out
//! - **Message loop**: each session then runs on its own task, answering
//!   client messages and commands sent through a `SessionHandle`
//!
//! ## Example
//!
//! ```rust
//! use rhtmx_session::{page_fn, App, AppServer, ChannelTransport, ConnectionInfo, SessionRoute};
//! use serde_json::json;
//! use std::sync::Arc;
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::builder("hello")
//!         .with_route(SessionRoute::page("", page_fn("home", |_| json!({ "text": "Hello" })))?)
//!         .build()?;
//!
//!     let server = AppServer::new(app);
//!     let (transport, mut client) = ChannelTransport::pair();
//!     let connection = ConnectionInfo::new(Url::parse("http://localhost:8000/")?);
//!
//!     let session = server.create_session(None, Arc::new(transport), connection).await?;
//!     assert!(session.active_url().await.is_some());
//!
//!     // applyTheme, then the first updateState
//!     let _theme = client.recv().await;
//!     let sync = client.recv().await.unwrap();
//!     assert_eq!(sync["method"], "updateState");
//!     Ok(())
//! }
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod app;
mod bootstrap;
pub mod config;
mod error;
pub mod handshake;
pub mod locale;
pub mod logging;
pub mod messages;
pub mod server;
pub mod session;
pub mod theme;
pub mod transport;

pub use app::{page_fn, App, AppBuilder, PageBuilder, PageContext, PageRef, SessionRoute};
pub use bootstrap::BootstrapStage;
pub use config::SessionConfig;
pub use error::{SessionError, TransportError};
pub use handshake::InitialClientMessage;
pub use locale::LocaleBundle;
pub use messages::{ClientMessage, InboundMessage};
pub use server::{AppServer, SessionRegistry};
pub use session::{ActiveRoute, Session, SessionCommand, SessionHandle, WindowSize};
pub use theme::{Theme, ThemeConfig};
pub use transport::{ChannelTransport, ClientEnd, ConnectionInfo, Transport};

pub use rhtmx_router::{GuardContext, GuardOutcome, NavigationError, Resolution};
