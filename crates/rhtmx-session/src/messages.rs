// File: src/messages.rs
// Purpose: JSON messages exchanged with the client after the handshake

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::theme::Theme;

/// Server → client messages
///
/// Serialized as `{"method": "...", "params": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Run a snippet in the browser
    EvaluateJavaScript { code: String },

    /// Replace the page's theme variables
    ApplyTheme { theme: Theme },

    /// Full state sync of the active page chain
    UpdateState {
        /// `None` when the session has no internal page
        url: Option<String>,
        pages: Vec<Value>,
        params: HashMap<String, String>,
    },

    /// Heartbeat reply
    Pong,
}

impl ClientMessage {
    /// Leave the application for `url`
    pub fn navigate_external(url: &str) -> Self {
        Self::EvaluateJavaScript {
            code: format!("window.location.href = {};", js_string(url)),
        }
    }

    /// Rewrite the address bar without a reload or a new history entry
    pub fn replace_url(url: &str) -> Self {
        Self::EvaluateJavaScript {
            code: format!("window.history.replaceState(null, \"\", {});", js_string(url)),
        }
    }

    /// Add a history entry for `url` without a reload
    pub fn push_url(url: &str) -> Self {
        Self::EvaluateJavaScript {
            code: format!("window.history.pushState(null, \"\", {});", js_string(url)),
        }
    }
}

/// Quotes `s` as a JavaScript string literal
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Client → server messages handled by the session loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum InboundMessage {
    /// Browser back/forward moved to `url`
    OnUrlChange { url: String },

    OnWindowSizeChange { width: f64, height: f64 },

    /// Heartbeat
    Ping,
}
