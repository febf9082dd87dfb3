/// Pattern parsing and matching for route segments
///
/// A pattern is a `/`-separated list of segments written FastAPI-style:
///
/// - literal text: `users`
/// - single-segment parameters: `{user_id}`
/// - rest-of-path parameters: `{rest:path}` (only as the final segment)
///
/// Patterns never start with a slash. They are matched against a *prefix* of
/// the candidate path; whatever is left over is handed to nested routes.

use std::collections::{HashMap, HashSet};

use crate::error::{InvalidPatternError, PatternErrorKind};

/// Suffix that turns a parameter into a rest-of-path capture
const CATCH_ALL_SUFFIX: &str = ":path";

/// Represents the different kinds of pattern segments
///
/// # Examples
///
/// ```
/// use rhtmx_router::route::pattern::{classify_segment, PatternSegmentType};
///
/// assert_eq!(
///     classify_segment("about"),
///     Ok(PatternSegmentType::Static("about".to_string()))
/// );
/// assert_eq!(
///     classify_segment("{id}"),
///     Ok(PatternSegmentType::Required("id".to_string()))
/// );
/// assert_eq!(
///     classify_segment("{rest:path}"),
///     Ok(PatternSegmentType::CatchAll("rest".to_string()))
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegmentType {
    /// Literal text, matched exactly and case-sensitively
    Static(String),
    /// Single-segment parameter: `{name}`
    Required(String),
    /// Rest-of-path parameter: `{name:path}`
    CatchAll(String),
}

impl PatternSegmentType {
    /// Parameter name declared by this segment, if any
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Self::Static(_) => None,
            Self::Required(name) | Self::CatchAll(name) => Some(name),
        }
    }
}

/// Classifies one raw segment (pure function)
///
/// # Parsing Rules (evaluated in order)
///
/// 1. Empty segments are rejected
/// 2. Segments not starting with `{` are literals and may not contain braces
/// 3. Parameters must end with `}`
/// 4. `{name:path}` is a catch-all, anything else in braces is a single capture
pub fn classify_segment(segment: &str) -> Result<PatternSegmentType, PatternErrorKind> {
    if segment.is_empty() {
        return Err(PatternErrorKind::EmptySegment);
    }

    if !segment.starts_with('{') {
        if segment.contains(&['{', '}'][..]) {
            return Err(PatternErrorKind::StrayBrace(segment.to_string()));
        }
        return Ok(PatternSegmentType::Static(segment.to_string()));
    }

    let inner = segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| PatternErrorKind::UnclosedParameter(segment.to_string()))?;

    match inner.strip_suffix(CATCH_ALL_SUFFIX) {
        Some(name) => validate_param_name(name, segment).map(PatternSegmentType::CatchAll),
        None => validate_param_name(inner, segment).map(PatternSegmentType::Required),
    }
}

fn validate_param_name(name: &str, segment: &str) -> Result<String, PatternErrorKind> {
    let valid = !name.is_empty() && !name.contains(&['{', '}', ':'][..]);

    if valid {
        Ok(name.to_string())
    } else {
        Err(PatternErrorKind::InvalidParameterName(segment.to_string()))
    }
}

/// Result of matching a pattern against a candidate path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch<'a> {
    /// Whether the pattern matched a prefix of the path
    pub matched: bool,
    /// Captured parameters, raw (not percent-decoded)
    pub params: HashMap<String, String>,
    /// Unconsumed suffix of the path, without a leading `/`
    pub remainder: &'a str,
}

impl<'a> PatternMatch<'a> {
    fn miss(path: &'a str) -> Self {
        Self {
            matched: false,
            params: HashMap::new(),
            remainder: path,
        }
    }
}

/// A compiled URL pattern
///
/// Immutable after construction. Owned by exactly one `RouteNode`.
///
/// # Examples
///
/// ```
/// use rhtmx_router::UrlPattern;
///
/// let pattern = UrlPattern::new("users/{user_id}").unwrap();
/// let m = pattern.match_path("users/42/edit");
///
/// assert!(m.matched);
/// assert_eq!(m.params.get("user_id"), Some(&"42".to_string()));
/// assert_eq!(m.remainder, "edit");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern {
    source: String,
    segments: Vec<PatternSegmentType>,
    param_names: HashSet<String>,
}

impl UrlPattern {
    /// Compiles a pattern string
    ///
    /// The empty pattern is valid: it declares no parameters and matches any
    /// path without consuming anything.
    pub fn new(pattern: &str) -> Result<Self, InvalidPatternError> {
        let fail = |kind| InvalidPatternError::new(pattern, kind);

        if pattern.starts_with('/') {
            return Err(fail(PatternErrorKind::LeadingSlash));
        }

        if pattern.is_empty() {
            return Ok(Self {
                source: String::new(),
                segments: Vec::new(),
                param_names: HashSet::new(),
            });
        }

        let segments = pattern
            .split('/')
            .map(classify_segment)
            .collect::<Result<Vec<_>, _>>()
            .map_err(fail)?;

        let mut param_names = HashSet::new();
        let last = segments.len() - 1;

        for (idx, segment) in segments.iter().enumerate() {
            if let PatternSegmentType::CatchAll(name) = segment {
                if idx != last {
                    return Err(fail(PatternErrorKind::CatchAllNotLast(name.clone())));
                }
            }

            if let Some(name) = segment.param_name() {
                if !param_names.insert(name.to_string()) {
                    return Err(fail(PatternErrorKind::DuplicateParameter(name.to_string())));
                }
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
            param_names,
        })
    }

    /// The pattern text this was compiled from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[PatternSegmentType] {
        &self.segments
    }

    /// Names of all declared path parameters
    pub fn parameter_names(&self) -> &HashSet<String> {
        &self.param_names
    }

    /// Whether the pattern ends in a `{name:path}` capture
    pub fn has_catch_all(&self) -> bool {
        matches!(self.segments.last(), Some(PatternSegmentType::CatchAll(_)))
    }

    /// Whether this is the empty (match-everything) pattern
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Matches this pattern against a prefix of `path`
    ///
    /// `path` must be the bare path: no scheme or host, no leading `/`, no
    /// query string. Passing anything else is a programming error.
    pub fn match_path<'a>(&self, path: &'a str) -> PatternMatch<'a> {
        debug_assert!(!path.starts_with('/'), "path must not start with a slash: {path}");
        debug_assert!(!path.contains('?'), "path must not contain a query string: {path}");
        debug_assert!(!path.contains("://"), "path must not contain a scheme: {path}");

        let mut params = HashMap::new();
        let mut rest = path;

        for segment in &self.segments {
            if let PatternSegmentType::CatchAll(name) = segment {
                if rest.is_empty() {
                    return PatternMatch::miss(path);
                }
                params.insert(name.clone(), rest.to_string());
                rest = "";
                continue;
            }

            let (head, tail) = rest.split_once('/').unwrap_or((rest, ""));
            if head.is_empty() {
                return PatternMatch::miss(path);
            }

            match segment {
                PatternSegmentType::Static(literal) if literal == head => {}
                PatternSegmentType::Required(name) => {
                    params.insert(name.clone(), head.to_string());
                }
                _ => return PatternMatch::miss(path),
            }

            rest = tail;
        }

        PatternMatch {
            matched: true,
            params,
            remainder: rest.strip_prefix('/').unwrap_or(rest),
        }
    }

    /// Convenience wrapper returning only whether the pattern matched
    pub fn is_match(&self, path: &str) -> bool {
        self.match_path(path).matched
    }

    /// Builds a concrete path from parameter values
    ///
    /// Values are percent-encoded; catch-all values keep their `/`
    /// separators. Returns `None` if a declared parameter is missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_router::UrlPattern;
    /// use std::collections::HashMap;
    ///
    /// let pattern = UrlPattern::new("files/{rest:path}").unwrap();
    /// let params = HashMap::from([("rest".to_string(), "a/b c".to_string())]);
    ///
    /// assert_eq!(pattern.expand(&params).as_deref(), Some("files/a/b%20c"));
    /// ```
    pub fn expand(&self, params: &HashMap<String, String>) -> Option<String> {
        self.segments
            .iter()
            .map(|segment| match segment {
                PatternSegmentType::Static(literal) => Some(literal.clone()),
                PatternSegmentType::Required(name) => {
                    params.get(name).map(|value| urlencoding::encode(value).into_owned())
                }
                PatternSegmentType::CatchAll(name) => params.get(name).map(|value| {
                    value
                        .split('/')
                        .map(|piece| urlencoding::encode(piece).into_owned())
                        .collect::<Vec<_>>()
                        .join("/")
                }),
            })
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join("/"))
    }

    /// Returns true if every path matched by `later` is already matched by
    /// `self`, i.e. `later` is unreachable when declared after `self` among
    /// siblings.
    pub(crate) fn shadows(&self, later: &UrlPattern) -> bool {
        let last = self.segments.len().saturating_sub(1);

        for (idx, earlier_seg) in self.segments.iter().enumerate() {
            let Some(later_seg) = later.segments.get(idx) else {
                return false;
            };

            match (earlier_seg, later_seg) {
                (PatternSegmentType::CatchAll(_), _) => return true,
                (_, PatternSegmentType::CatchAll(_)) => {
                    return matches!(earlier_seg, PatternSegmentType::Required(_)) && idx == last;
                }
                (PatternSegmentType::Required(_), _) => {}
                (PatternSegmentType::Static(a), PatternSegmentType::Static(b)) if a == b => {}
                _ => return false,
            }
        }

        true
    }
}

impl std::fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for UrlPattern {
    type Err = InvalidPatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_classify_static() {
        assert_eq!(
            classify_segment("about"),
            Ok(PatternSegmentType::Static("about".to_string()))
        );
    }

    #[test]
    fn test_classify_required() {
        assert_eq!(
            classify_segment("{id}"),
            Ok(PatternSegmentType::Required("id".to_string()))
        );
    }

    #[test]
    fn test_classify_catch_all() {
        assert_eq!(
            classify_segment("{rest:path}"),
            Ok(PatternSegmentType::CatchAll("rest".to_string()))
        );
    }

    #[rstest]
    #[case("", PatternErrorKind::EmptySegment)]
    #[case("ab}c", PatternErrorKind::StrayBrace("ab}c".to_string()))]
    #[case("a{b", PatternErrorKind::StrayBrace("a{b".to_string()))]
    #[case("{id", PatternErrorKind::UnclosedParameter("{id".to_string()))]
    #[case("{}", PatternErrorKind::InvalidParameterName("{}".to_string()))]
    #[case("{:path}", PatternErrorKind::InvalidParameterName("{:path}".to_string()))]
    #[case("{id:int}", PatternErrorKind::InvalidParameterName("{id:int}".to_string()))]
    fn test_classify_rejects(#[case] segment: &str, #[case] expected: PatternErrorKind) {
        assert_eq!(classify_segment(segment), Err(expected));
    }

    #[test]
    fn test_remainder_strips_single_slash() {
        let pattern = UrlPattern::new("users").unwrap();
        let m = pattern.match_path("users/42");
        assert_eq!(m.remainder, "42");
    }

    #[test]
    fn test_literal_does_not_match_longer_segment() {
        let pattern = UrlPattern::new("users").unwrap();
        assert!(!pattern.is_match("usersettings"));
    }

    #[test]
    fn test_param_rejects_empty_segment() {
        let pattern = UrlPattern::new("users/{id}").unwrap();
        let m = pattern.match_path("users//edit");
        assert!(!m.matched);
        assert_eq!(m.remainder, "users//edit");
    }

    #[test]
    fn test_shadowing() {
        let p = |s: &str| UrlPattern::new(s).unwrap();

        assert!(p("{id}").shadows(&p("settings")));
        assert!(!p("settings").shadows(&p("{id}")));
        assert!(p("users").shadows(&p("users/{id}")));
        assert!(!p("users/{id}").shadows(&p("users")));
        assert!(p("").shadows(&p("about")));
        assert!(!p("about").shadows(&p("")));
        assert!(p("files/{rest:path}").shadows(&p("files/{name}")));
        assert!(p("files/{name}").shadows(&p("files/{rest:path}")));
        assert!(!p("files/{name}/raw").shadows(&p("files/{rest:path}")));
        assert!(!p("docs").shadows(&p("blog")));
    }
}
