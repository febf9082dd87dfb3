//! Error types for route-tree construction and navigation

/// Why a pattern string was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternErrorKind {
    #[error("patterns cannot start with a slash")]
    LeadingSlash,
    #[error("segments cannot be empty")]
    EmptySegment,
    #[error("segment `{0}` contains `{{` or `}}` but is not a path parameter")]
    StrayBrace(String),
    #[error("path parameter `{0}` starts with `{{` but does not end with `}}`")]
    UnclosedParameter(String),
    #[error("path parameter `{0}` has an empty or invalid name")]
    InvalidParameterName(String),
    #[error("path parameter `{0}` is declared more than once")]
    DuplicateParameter(String),
    #[error("catch-all parameter `{0}` must be the last segment")]
    CatchAllNotLast(String),
}

/// A URL pattern could not be compiled
///
/// Raised while the route tree is assembled at application startup, never
/// while serving a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid URL pattern `{pattern}`: {kind}")]
pub struct InvalidPatternError {
    pub pattern: String,
    pub kind: PatternErrorKind,
}

impl InvalidPatternError {
    pub fn new(pattern: impl Into<String>, kind: PatternErrorKind) -> Self {
        Self {
            pattern: pattern.into(),
            kind,
        }
    }
}

/// The route tree as a whole is misconfigured
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteTreeError {
    #[error(transparent)]
    InvalidPattern(#[from] InvalidPatternError),

    #[error("path parameter `{name}` in route `{pattern}` is already declared by a parent route")]
    DuplicateParameter { name: String, pattern: String },

    #[error("route `{pattern}` can never match: the earlier sibling `{shadowed_by}` matches every path it does")]
    UnreachableRoute { pattern: String, shadowed_by: String },
}

/// Navigation could not be completed
///
/// Returned to whoever started the navigation (session creation or an
/// explicit in-session navigation). The session's active route is untouched
/// when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    /// A guard aborted the navigation
    #[error("navigation to `{url}` failed: {reason}")]
    Failed { url: String, reason: String },

    /// Guards kept redirecting past the configured bound
    #[error("navigation exceeded {limit} redirects (last target: `{last}`)")]
    TooManyRedirects { limit: usize, last: String },

    /// A guard redirected to something that is not a URL
    #[error("guard redirected to invalid URL `{target}`: {reason}")]
    InvalidRedirect { target: String, reason: String },
}
