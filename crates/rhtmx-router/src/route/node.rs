/// Route-tree nodes
///
/// A node pairs a `UrlPattern` with its ordered children, an optional guard
/// and an optional page payload. Trees are assembled once with the builder
/// methods below and are read-only afterwards.

use std::fmt;
use std::sync::Arc;

use crate::error::InvalidPatternError;
use crate::guard::{FnGuard, Guard, GuardContext, GuardOutcome};
use crate::route::pattern::UrlPattern;

/// One node of the route tree
///
/// `S` is the session type guards receive, `P` the page payload (typically a
/// handle to a page builder).
pub struct RouteNode<S, P> {
    pattern: UrlPattern,
    children: Vec<RouteNode<S, P>>,
    guard: Option<Arc<dyn Guard<S, P>>>,
    page: Option<P>,
    name: Option<String>,
}

impl<S, P> RouteNode<S, P> {
    /// Creates a node without a page (a grouping node)
    pub fn new(pattern: &str) -> Result<Self, InvalidPatternError> {
        Ok(Self {
            pattern: UrlPattern::new(pattern)?,
            children: Vec::new(),
            guard: None,
            page: None,
            name: None,
        })
    }

    /// Creates a node that renders `page`
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_router::RouteNode;
    ///
    /// let node = RouteNode::<(), _>::page("users/{user_id}", "user-profile").unwrap();
    /// assert_eq!(node.pattern().as_str(), "users/{user_id}");
    /// assert_eq!(node.page_ref(), Some(&"user-profile"));
    /// ```
    pub fn page(pattern: &str, page: P) -> Result<Self, InvalidPatternError> {
        Ok(Self::new(pattern)?.with_page(page))
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    pub fn with_page(mut self, page: P) -> Self {
        self.page = Some(page);
        self
    }

    /// Appends a child. Children are tried in the order they are added.
    pub fn with_child(mut self, child: RouteNode<S, P>) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = RouteNode<S, P>>,
    {
        self.children.extend(children);
        self
    }

    /// Attaches a guard, replacing any previous one
    pub fn with_guard<G>(mut self, guard: G) -> Self
    where
        G: Guard<S, P> + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    /// Attaches a synchronous closure as the guard
    pub fn with_guard_fn<F>(self, f: F) -> Self
    where
        F: Fn(&GuardContext<'_, S, P>) -> GuardOutcome + Send + Sync + 'static,
        FnGuard<F>: Guard<S, P>,
    {
        self.with_guard(crate::guard::guard_fn(f))
    }

    /// Names the node so URLs can be generated with `Router::url_for`
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn pattern(&self) -> &UrlPattern {
        &self.pattern
    }

    pub fn children(&self) -> &[RouteNode<S, P>] {
        &self.children
    }

    pub fn guard(&self) -> Option<&Arc<dyn Guard<S, P>>> {
        self.guard.as_ref()
    }

    pub fn page_ref(&self) -> Option<&P> {
        self.page.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl<S, P: Clone> Clone for RouteNode<S, P> {
    fn clone(&self) -> Self {
        Self {
            pattern: self.pattern.clone(),
            children: self.children.clone(),
            guard: self.guard.clone(),
            page: self.page.clone(),
            name: self.name.clone(),
        }
    }
}

impl<S, P> fmt::Debug for RouteNode<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteNode")
            .field("pattern", &self.pattern.as_str())
            .field("name", &self.name)
            .field("has_page", &self.page.is_some())
            .field("has_guard", &self.guard.is_some())
            .field("children", &self.children)
            .finish()
    }
}
