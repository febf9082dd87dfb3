//! # RHTMX Router
//!
//! Hierarchical page routing for RHTMX sessions:
//! - Literal segments (`users`)
//! - Single-segment parameters (`users/{user_id}`)
//! - Rest-of-path parameters (`files/{rest:path}`)
//! - Nested route trees, each level matching a prefix and handing the
//!   remainder to its children
//! - Navigation guards that can accept, redirect or abort
//!
//! ## Matching
//!
//! At every level children are tried in declaration order and the first
//! structural match wins. There is no backtracking, so a sibling that could
//! never be reached is rejected when the `Router` is built. Trailing segments
//! that no node consumed are not an error; they are reported as `remainder` and
//! left to the page layer (usually to render a not-found view).
//!
//! ## Resolution
//!
//! `Router::resolve` matches an absolute URL, then runs the guards of every
//! matched node root-to-leaf. A redirect restarts resolution against the new
//! URL, up to a bounded number of redirects. URLs outside the session's base
//! URL come back as `Resolution::External`.
//!
//! ## Example
//!
//! ```
//! use rhtmx_router::{RouteNode, Router};
//!
//! let router: Router<(), &str> = Router::new(vec![
//!     RouteNode::page("users/{user_id}", "user")?
//!         .with_child(RouteNode::page("edit", "edit-user")?),
//!     RouteNode::page("files/{rest:path}", "files")?,
//! ])?;
//!
//! let chain = router.match_path("users/42/edit");
//! assert_eq!(chain.params["user_id"], "42");
//! assert_eq!(chain.pages(), vec![&"user", &"edit-user"]);
//! assert_eq!(chain.remainder, "");
//! # Ok::<(), rhtmx_router::RouteTreeError>(())
//! ```

use std::collections::HashMap;

use url::Url;

// ============================================================================
// Module Declarations
// ============================================================================

mod error;
mod guard;
pub mod path;
pub mod route;

pub use error::{InvalidPatternError, NavigationError, PatternErrorKind, RouteTreeError};
pub use guard::{guard_fn, FnGuard, Guard, GuardContext, GuardOutcome};
pub use path::{base_url_of, normalize_path, relative_path, same_origin};
pub use route::{PatternMatch, PatternSegmentType, RouteNode, UrlPattern};

/// Redirect bound used unless `Router::with_max_redirects` says otherwise
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

// ============================================================================
// Core Types
// ============================================================================

/// Structural match of a path against the route tree, before guards run
#[derive(Debug)]
pub struct RouteChain<'r, S, P> {
    /// Matched nodes, root first
    pub nodes: Vec<&'r RouteNode<S, P>>,
    /// Percent-decoded parameters of all matched nodes
    pub params: HashMap<String, String>,
    /// Trailing part of the path no node consumed
    pub remainder: String,
}

impl<'r, S, P> RouteChain<'r, S, P> {
    /// Page payloads of the matched nodes, root first
    pub fn pages(&self) -> Vec<&'r P> {
        self.nodes.iter().filter_map(|node| node.page_ref()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the deepest match swallowed the rest of the path
    pub fn ends_in_catch_all(&self) -> bool {
        self.nodes
            .last()
            .map(|node| node.pattern().has_catch_all())
            .unwrap_or(false)
    }
}

/// Result of a successful internal resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute<P> {
    /// Page payloads of the matched nodes, root first
    pub pages: Vec<P>,
    /// Every parameter declared by a matched node, exactly once
    pub params: HashMap<String, String>,
    /// Absolute URL after any guard redirects
    pub url: Url,
    /// Unconsumed trailing path
    pub remainder: String,
    /// Number of guard redirects that were followed
    pub redirects: usize,
}

/// Where navigation ended up
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<P> {
    /// A page of this application
    Internal(ResolvedRoute<P>),
    /// A URL outside the application; the client must navigate there itself
    External(Url),
}

impl<P> Resolution<P> {
    /// The final absolute URL, internal or not
    pub fn url(&self) -> &Url {
        match self {
            Self::Internal(route) => &route.url,
            Self::External(url) => url,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }
}

// ============================================================================
// Router
// ============================================================================

/// Immutable route tree shared by every session
pub struct Router<S, P> {
    routes: Vec<RouteNode<S, P>>,
    max_redirects: usize,
}

impl<S, P> Router<S, P> {
    /// Builds a router from the top-level routes
    ///
    /// Fails if a route can never be reached because an earlier sibling
    /// shadows it, or if a parameter name repeats along a root-to-leaf path.
    pub fn new(routes: Vec<RouteNode<S, P>>) -> Result<Self, RouteTreeError> {
        validate_level(&routes, &mut Vec::new())?;

        Ok(Self {
            routes,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        })
    }

    /// Sets how many guard redirects one navigation may follow
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    pub fn routes(&self) -> &[RouteNode<S, P>] {
        &self.routes
    }

    /// Matches a relative path against the tree without running guards
    ///
    /// `path` is normalized first, so leading or doubled slashes are fine.
    pub fn match_path(&self, path: &str) -> RouteChain<'_, S, P> {
        let mut nodes = Vec::new();
        let mut params = HashMap::new();
        let mut rest = normalize_path(path).into_owned();
        let mut level = self.routes.as_slice();

        while !level.is_empty() {
            let hit = level.iter().find_map(|node| {
                let m = node.pattern().match_path(&rest);
                m.matched
                    .then(|| (node, m.params, m.remainder.to_string()))
            });

            let Some((node, captured, remainder)) = hit else {
                break;
            };

            params.extend(captured.into_iter().map(|(name, raw)| {
                let value = match urlencoding::decode(&raw) {
                    Ok(decoded) => decoded.into_owned(),
                    Err(_) => raw.clone(),
                };
                (name, value)
            }));

            nodes.push(node);
            rest = remainder;
            level = node.children();
        }

        RouteChain {
            nodes,
            params,
            remainder: rest,
        }
    }

    /// Generates a path for the node named `name`
    ///
    /// The patterns from the root down to the named node are expanded with
    /// `params` and joined. Returns `None` if no node has that name or a
    /// parameter is missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_router::{RouteNode, Router};
    /// use std::collections::HashMap;
    ///
    /// let router: Router<(), ()> = Router::new(vec![
    ///     RouteNode::new("users/{user_id}")?
    ///         .with_child(RouteNode::new("posts/{post_id}")?.with_name("post")),
    /// ])?;
    ///
    /// let params = HashMap::from([
    ///     ("user_id".to_string(), "7".to_string()),
    ///     ("post_id".to_string(), "99".to_string()),
    /// ]);
    /// assert_eq!(router.url_for("post", &params).as_deref(), Some("/users/7/posts/99"));
    /// # Ok::<(), rhtmx_router::RouteTreeError>(())
    /// ```
    pub fn url_for(&self, name: &str, params: &HashMap<String, String>) -> Option<String> {
        let chain = find_named(&self.routes, name)?;

        let parts = chain
            .iter()
            .filter(|node| !node.pattern().is_empty())
            .map(|node| node.pattern().expand(params))
            .collect::<Option<Vec<_>>>()?;

        Some(format!("/{}", parts.join("/")))
    }

    /// Resolves `target` for `session`, running guards along the way
    ///
    /// Guards run one after another, root to leaf. A redirect restarts the
    /// whole resolution against the new URL. A target whose scheme, host or
    /// port differs from `base_url` is returned as `Resolution::External`
    /// without matching. A same-origin path outside the base path is matched
    /// from the origin root.
    pub async fn resolve(
        &self,
        session: &S,
        base_url: &Url,
        target: &Url,
    ) -> Result<Resolution<P>, NavigationError>
    where
        S: Sync,
        P: Clone + Sync,
    {
        let mut target = target.clone();
        let mut redirects = 0;

        'resolve: loop {
            if !same_origin(base_url, &target) {
                tracing::debug!(url = %target, "Navigation target is outside the application");
                return Ok(Resolution::External(target));
            }
            let path = relative_path(base_url, &target)
                .unwrap_or_else(|| normalize_path(target.path()).into_owned());

            let chain = self.match_path(&path);
            let mut params = HashMap::new();

            for (depth, node) in chain.nodes.iter().enumerate() {
                for name in node.pattern().parameter_names() {
                    if let Some(value) = chain.params.get(name) {
                        params.insert(name.clone(), value.clone());
                    }
                }

                let Some(guard) = node.guard() else {
                    continue;
                };

                let ctx = GuardContext {
                    session,
                    url: &target,
                    chain: &chain.nodes[..=depth],
                    params: &params,
                };
                let outcome = guard.evaluate(&ctx).await;

                match outcome {
                    GuardOutcome::Accept => {}
                    GuardOutcome::Abort(reason) => {
                        tracing::debug!(url = %target, %reason, "Guard aborted navigation");
                        return Err(NavigationError::Failed {
                            url: target.to_string(),
                            reason,
                        });
                    }
                    GuardOutcome::RedirectTo(next) => {
                        let next_url =
                            base_url
                                .join(&next)
                                .map_err(|e| NavigationError::InvalidRedirect {
                                    target: next.clone(),
                                    reason: e.to_string(),
                                })?;

                        redirects += 1;
                        if redirects > self.max_redirects {
                            return Err(NavigationError::TooManyRedirects {
                                limit: self.max_redirects,
                                last: next_url.to_string(),
                            });
                        }

                        tracing::debug!(
                            from = %target,
                            to = %next_url,
                            pattern = node.pattern().as_str(),
                            "Guard redirected navigation"
                        );
                        target = next_url;
                        continue 'resolve;
                    }
                }
            }

            return Ok(Resolution::Internal(ResolvedRoute {
                pages: chain.pages().into_iter().cloned().collect(),
                params: chain.params,
                url: target,
                remainder: chain.remainder,
                redirects,
            }));
        }
    }
}

impl<S, P> std::fmt::Debug for Router<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("max_redirects", &self.max_redirects)
            .finish()
    }
}

// ============================================================================
// Tree validation
// ============================================================================

fn validate_level<S, P>(
    siblings: &[RouteNode<S, P>],
    ancestor_params: &mut Vec<String>,
) -> Result<(), RouteTreeError> {
    for (idx, node) in siblings.iter().enumerate() {
        if let Some(earlier) = siblings[..idx]
            .iter()
            .find(|earlier| earlier.pattern().shadows(node.pattern()))
        {
            return Err(RouteTreeError::UnreachableRoute {
                pattern: node.pattern().as_str().to_string(),
                shadowed_by: earlier.pattern().as_str().to_string(),
            });
        }

        let mut declared: Vec<&String> = node.pattern().parameter_names().iter().collect();
        declared.sort();

        if let Some(name) = declared.iter().find(|name| ancestor_params.contains(**name)) {
            return Err(RouteTreeError::DuplicateParameter {
                name: name.to_string(),
                pattern: node.pattern().as_str().to_string(),
            });
        }

        let depth = ancestor_params.len();
        ancestor_params.extend(declared.into_iter().cloned());
        validate_level(node.children(), ancestor_params)?;
        ancestor_params.truncate(depth);
    }

    Ok(())
}

fn find_named<'r, S, P>(nodes: &'r [RouteNode<S, P>], name: &str) -> Option<Vec<&'r RouteNode<S, P>>> {
    nodes.iter().find_map(|node| {
        if node.name() == Some(name) {
            return Some(vec![node]);
        }

        find_named(node.children(), name).map(|mut chain| {
            chain.insert(0, node);
            chain
        })
    })
}
