// File: examples/demo.rs
// Purpose: Drive one in-memory session end to end and print what the client sees

use anyhow::Result;
use rhtmx_session::{
    logging, page_fn, App, AppServer, ChannelTransport, ConnectionInfo, GuardOutcome,
    SessionConfig, SessionRoute, Theme, ThemeConfig,
};
use serde_json::json;
use std::sync::Arc;
use url::Url;

#[derive(Clone)]
struct CurrentUser(Option<String>);

#[tokio::main]
async fn main() -> Result<()> {
    let config = SessionConfig::load_default()?;
    logging::init(&config);

    let app = App::builder("demo")
        .with_config(config)
        .with_theme(ThemeConfig::LightDark(Theme::light(), Theme::dark()))
        .with_default_attachment(CurrentUser(None))
        .on_session_start(|session| async move {
            tracing::info!(session = %session.id(), "Hello from on_session_start");
            Ok(())
        })
        .with_routes([
            SessionRoute::page("login", page_fn("login", |_| json!({ "form": "login" })))?,
            SessionRoute::page("users/{user_id}", page_fn("profile", |ctx| json!({ "user": ctx.param("user_id") })))?
                .with_guard_fn(|ctx| match ctx.session().attachment::<CurrentUser>() {
                    Some(CurrentUser(Some(_))) => GuardOutcome::Accept,
                    _ => GuardOutcome::redirect("/login"),
                }),
            SessionRoute::page("", page_fn("home", |_| json!({ "text": "Welcome" })))?,
        ])
        .build()?;

    let server = AppServer::new(app);
    let (transport, mut client) = ChannelTransport::pair();

    client.send(json!({
        "preferredLanguages": ["en-GB", "en"],
        "timezone": "Europe/London",
        "prefersLightTheme": false
    }))?;

    let connection = ConnectionInfo::new(Url::parse("http://localhost:3000/users/42")?)
        .with_header("User-Agent", "demo");
    let session = server.accept(Arc::new(transport), connection).await?;

    for message in client.drain() {
        println!("{}", serde_json::to_string_pretty(&message)?);
    }

    session.attach(CurrentUser(Some("ada".to_string())));
    session.navigate_to("/users/42", false).await?;

    while let Ok(Some(message)) =
        tokio::time::timeout(std::time::Duration::from_millis(100), client.recv()).await
    {
        println!("{}", serde_json::to_string_pretty(&message)?);
    }

    server.close_session(session.id()).await;
    Ok(())
}
