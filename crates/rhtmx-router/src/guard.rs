//! Navigation guards
//!
//! A guard is attached to a `RouteNode` and runs every time navigation
//! passes through that node. Guards run strictly in root-to-leaf order, one at
//! a time, so a guard always observes whatever earlier guards did to the
//! session.

use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use crate::route::RouteNode;

/// What a guard decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Let navigation continue
    Accept,
    /// Navigate somewhere else instead. Relative targets are joined against
    /// the session's base URL; absolute targets may point off-site.
    RedirectTo(String),
    /// Reject navigation with a reason
    Abort(String),
}

impl GuardOutcome {
    pub fn redirect(target: impl Into<String>) -> Self {
        Self::RedirectTo(target.into())
    }

    pub fn abort(reason: impl Into<String>) -> Self {
        Self::Abort(reason.into())
    }
}

/// Match state handed to a guard
///
/// `chain` and `params` only cover the nodes from the root up to and
/// including the node the guard belongs to.
pub struct GuardContext<'a, S, P> {
    pub(crate) session: &'a S,
    pub(crate) url: &'a Url,
    pub(crate) chain: &'a [&'a RouteNode<S, P>],
    pub(crate) params: &'a HashMap<String, String>,
}

impl<'a, S, P> GuardContext<'a, S, P> {
    pub fn session(&self) -> &'a S {
        self.session
    }

    /// Absolute URL currently being navigated to
    pub fn url(&self) -> &'a Url {
        self.url
    }

    pub fn chain(&self) -> &'a [&'a RouteNode<S, P>] {
        self.chain
    }

    /// The node this guard is attached to
    pub fn node(&self) -> Option<&'a RouteNode<S, P>> {
        self.chain.last().copied()
    }

    pub fn params(&self) -> &'a HashMap<String, String> {
        self.params
    }

    pub fn param(&self, name: &str) -> Option<&'a str> {
        self.params.get(name).map(String::as_str)
    }

    /// Page payloads matched so far, root first
    pub fn pages(&self) -> Vec<&'a P> {
        self.chain.iter().filter_map(|node| node.page_ref()).collect()
    }
}

/// A navigation guard
///
/// Implementations should be quick: the router awaits each guard before
/// evaluating the next, and there is no timeout.
#[async_trait]
pub trait Guard<S, P>: Send + Sync {
    async fn evaluate(&self, ctx: &GuardContext<'_, S, P>) -> GuardOutcome;
}

/// Adapts a synchronous closure into a `Guard`
pub struct FnGuard<F>(F);

/// Wraps a synchronous closure as a guard
///
/// # Examples
///
/// ```
/// use rhtmx_router::{guard_fn, GuardContext, GuardOutcome, RouteNode};
///
/// let logged_in = guard_fn(|ctx: &GuardContext<'_, bool, &'static str>| {
///     if *ctx.session() {
///         GuardOutcome::Accept
///     } else {
///         GuardOutcome::redirect("/login")
///     }
/// });
/// let admin = RouteNode::page("admin", "admin").unwrap().with_guard(logged_in);
/// assert!(admin.guard().is_some());
/// ```
pub fn guard_fn<S, P, F>(f: F) -> FnGuard<F>
where
    F: Fn(&GuardContext<'_, S, P>) -> GuardOutcome + Send + Sync,
{
    FnGuard(f)
}

#[async_trait]
impl<S, P, F> Guard<S, P> for FnGuard<F>
where
    S: Sync,
    P: Sync,
    F: Fn(&GuardContext<'_, S, P>) -> GuardOutcome + Send + Sync,
{
    async fn evaluate(&self, ctx: &GuardContext<'_, S, P>) -> GuardOutcome {
        (self.0)(ctx)
    }
}
