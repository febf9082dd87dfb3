/// Path utilities for turning absolute URLs into router input
///
/// All functions are **pure**: given same input, always produce same output with no side effects.

use std::borrow::Cow;

use url::Url;

/// Validates if a relative path is in canonical form
///
/// # Rules
///
/// - Must not start or end with `/`
/// - Must not contain `//` or `\`
///
/// The empty path is canonical.
///
/// # Examples
///
/// ```
/// use rhtmx_router::path::is_canonical_path;
///
/// assert!(is_canonical_path(""));
/// assert!(is_canonical_path("about"));
/// assert!(is_canonical_path("users/123"));
///
/// assert!(!is_canonical_path("/about")); // Leading /
/// assert!(!is_canonical_path("about/")); // Trailing /
/// assert!(!is_canonical_path("about//page")); // Double //
/// assert!(!is_canonical_path("about\\page")); // Backslash
/// ```
pub fn is_canonical_path(path: &str) -> bool {
    if path.is_empty() {
        return true;
    }

    !path.starts_with('/')
        && !path.ends_with('/')
        && !path.contains("//")
        && !path.contains('\\')
}

/// Normalize a path into the relative form the router matches against
///
/// Returns `Cow::Borrowed` when the input is already canonical.
///
/// # Examples
///
/// ```
/// use rhtmx_router::path::normalize_path;
/// use std::borrow::Cow;
///
/// assert!(matches!(normalize_path("about"), Cow::Borrowed("about")));
///
/// assert_eq!(normalize_path("/about/"), "about");
/// assert_eq!(normalize_path("\\users\\123"), "users/123");
/// assert_eq!(normalize_path("/path//to///page"), "path/to/page");
/// assert_eq!(normalize_path("/"), "");
/// ```
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if is_canonical_path(path) {
        return Cow::Borrowed(path);
    }

    let normalized = path
        .replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    Cow::Owned(normalized)
}

/// Whether two URLs share scheme, host and port
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

/// Returns `target`'s path relative to `base`, ready for matching
///
/// Returns `None` when `target` lives outside of `base` (different origin, or
/// a path that is not below the base path). Query and fragment are dropped.
///
/// # Examples
///
/// ```
/// use rhtmx_router::path::relative_path;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/").unwrap();
///
/// let target = Url::parse("https://example.com/users/42?tab=posts").unwrap();
/// assert_eq!(relative_path(&base, &target).as_deref(), Some("users/42"));
///
/// let target = Url::parse("https://other.org/users/42").unwrap();
/// assert_eq!(relative_path(&base, &target), None);
/// ```
pub fn relative_path(base: &Url, target: &Url) -> Option<String> {
    if !same_origin(base, target) {
        return None;
    }

    let base_path = base.path().trim_end_matches('/');
    let rest = target.path().strip_prefix(base_path)?;

    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    Some(normalize_path(rest).into_owned())
}

/// Strips path, query and fragment, leaving the origin root
///
/// # Examples
///
/// ```
/// use rhtmx_router::path::base_url_of;
/// use url::Url;
///
/// let url = Url::parse("http://localhost:8000/users/42?x=1#top").unwrap();
/// assert_eq!(base_url_of(&url).as_str(), "http://localhost:8000/");
/// ```
pub fn base_url_of(url: &Url) -> Url {
    let mut base = url.clone();
    base.set_path("/");
    base.set_query(None);
    base.set_fragment(None);
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_same_origin_uses_default_ports() {
        assert!(same_origin(&url("https://example.com/"), &url("https://example.com:443/a")));
        assert!(!same_origin(&url("https://example.com/"), &url("http://example.com/")));
        assert!(!same_origin(&url("http://localhost:8000/"), &url("http://localhost:8001/")));
    }

    #[test]
    fn test_relative_path_root() {
        let base = url("http://localhost:8000/");
        assert_eq!(relative_path(&base, &url("http://localhost:8000/")).as_deref(), Some(""));
        assert_eq!(relative_path(&base, &url("http://localhost:8000")).as_deref(), Some(""));
    }

    #[test]
    fn test_relative_path_with_base_path() {
        let base = url("http://localhost:8000/app/");
        assert_eq!(
            relative_path(&base, &url("http://localhost:8000/app/users/7")).as_deref(),
            Some("users/7")
        );
        assert_eq!(relative_path(&base, &url("http://localhost:8000/application")), None);
        assert_eq!(relative_path(&base, &url("http://localhost:8000/other")), None);
    }
}
