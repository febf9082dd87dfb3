//! Integration tests for rhtmx-router
//!
//! Tests are organized by feature area and cover:
//! - Pattern compilation and matching
//! - Route-tree validation
//! - Nested matching and remainders
//! - Guards (accept, redirect, abort, ordering)
//! - Redirect bounds and external destinations
//! - URL generation round trips

use std::collections::HashMap;
use std::sync::Mutex;

use pretty_assertions::assert_eq;
use rhtmx_router::*;
use rstest::rstest;
use url::Url;

type Log = Mutex<Vec<String>>;

fn base() -> Url {
    Url::parse("http://localhost:8000/").unwrap()
}

fn at(path: &str) -> Url {
    base().join(path).unwrap()
}

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// Pattern compilation
// ============================================================================

#[rstest]
#[case("")]
#[case("about")]
#[case("users/{user_id}")]
#[case("users/{user_id}/posts/{post_id}")]
#[case("files/{rest:path}")]
#[case("a-b_c.d/~x")]
fn test_valid_patterns_compile(#[case] pattern: &str) {
    assert!(UrlPattern::new(pattern).is_ok(), "{pattern} should compile");
}

#[rstest]
#[case("/users", PatternErrorKind::LeadingSlash)]
#[case("users//posts", PatternErrorKind::EmptySegment)]
#[case("users/", PatternErrorKind::EmptySegment)]
#[case("us{ers", PatternErrorKind::StrayBrace("us{ers".to_string()))]
#[case("users}", PatternErrorKind::StrayBrace("users}".to_string()))]
#[case("users/{id", PatternErrorKind::UnclosedParameter("{id".to_string()))]
#[case("{rest:path}/edit", PatternErrorKind::CatchAllNotLast("rest".to_string()))]
#[case("{id}/{id}", PatternErrorKind::DuplicateParameter("id".to_string()))]
fn test_invalid_patterns_fail(#[case] pattern: &str, #[case] kind: PatternErrorKind) {
    let err = UrlPattern::new(pattern).unwrap_err();
    assert_eq!(err.kind, kind);
    assert_eq!(err.pattern, pattern);
}

#[test]
fn test_parameter_names() {
    let pattern = UrlPattern::new("users/{user_id}/files/{rest:path}").unwrap();
    let mut names: Vec<&String> = pattern.parameter_names().iter().collect();
    names.sort();
    assert_eq!(names, vec!["rest", "user_id"]);
    assert!(pattern.has_catch_all());
}

// ============================================================================
// Pattern matching
// ============================================================================

#[test]
fn test_single_capture_leaves_remainder() {
    let pattern = UrlPattern::new("users/{user_id}").unwrap();
    let m = pattern.match_path("users/42/edit");

    assert!(m.matched);
    assert_eq!(m.params, params(&[("user_id", "42")]));
    assert_eq!(m.remainder, "edit");
}

#[test]
fn test_catch_all_consumes_everything() {
    let pattern = UrlPattern::new("files/{rest:path}").unwrap();
    let m = pattern.match_path("files/a/b/c");

    assert!(m.matched);
    assert_eq!(m.params, params(&[("rest", "a/b/c")]));
    assert_eq!(m.remainder, "");
}

#[test]
fn test_catch_all_needs_at_least_one_segment() {
    let pattern = UrlPattern::new("files/{rest:path}").unwrap();
    assert!(!pattern.is_match("files"));
}

#[rstest]
#[case("users/{id}", "posts/1")]
#[case("users/{id}", "users")]
#[case("users", "Users")]
#[case("a/b/c", "a/b")]
fn test_miss_returns_input_untouched(#[case] pattern: &str, #[case] input: &str) {
    let m = UrlPattern::new(pattern).unwrap().match_path(input);

    assert!(!m.matched);
    assert!(m.params.is_empty());
    assert_eq!(m.remainder, input);
}

#[test]
fn test_single_capture_never_contains_slash() {
    let pattern = UrlPattern::new("{a}/{b}").unwrap();
    let m = pattern.match_path("x/y/z/w");

    assert!(m.matched);
    assert!(m.params.values().all(|v| !v.contains('/')));
    assert_eq!(m.remainder, "z/w");
}

#[test]
fn test_empty_pattern_consumes_nothing() {
    let m = UrlPattern::new("").unwrap().match_path("some/path");
    assert!(m.matched);
    assert!(m.params.is_empty());
    assert_eq!(m.remainder, "some/path");
}

// ============================================================================
// Tree validation
// ============================================================================

#[test]
fn test_unreachable_sibling_is_rejected() {
    let result: Result<Router<(), ()>, _> = Router::new(vec![
        RouteNode::new("{slug}").unwrap(),
        RouteNode::new("about").unwrap(),
    ]);

    assert_eq!(
        result.unwrap_err(),
        RouteTreeError::UnreachableRoute {
            pattern: "about".to_string(),
            shadowed_by: "{slug}".to_string(),
        }
    );
}

#[test]
fn test_literal_before_parameter_is_allowed() {
    let router: Router<(), &str> = Router::new(vec![
        RouteNode::page("about", "about").unwrap(),
        RouteNode::page("{slug}", "slug").unwrap(),
    ])
    .unwrap();

    assert_eq!(router.match_path("about").pages(), vec![&"about"]);
    assert_eq!(router.match_path("pricing").pages(), vec![&"slug"]);
}

#[test]
fn test_prefix_sibling_shadows_longer_pattern() {
    let result: Result<Router<(), ()>, _> = Router::new(vec![
        RouteNode::new("users").unwrap(),
        RouteNode::new("users/{id}").unwrap(),
    ]);
    assert!(matches!(result, Err(RouteTreeError::UnreachableRoute { .. })));
}

#[test]
fn test_duplicate_parameter_along_path_is_rejected() {
    let result: Result<Router<(), ()>, _> = Router::new(vec![RouteNode::new("orgs/{id}")
        .unwrap()
        .with_child(RouteNode::new("teams/{id}").unwrap())]);

    assert_eq!(
        result.unwrap_err(),
        RouteTreeError::DuplicateParameter {
            name: "id".to_string(),
            pattern: "teams/{id}".to_string(),
        }
    );
}

#[test]
fn test_same_parameter_in_sibling_branches_is_fine() {
    let result: Result<Router<(), ()>, _> = Router::new(vec![
        RouteNode::new("users/{id}").unwrap(),
        RouteNode::new("teams/{id}").unwrap(),
    ]);
    assert!(result.is_ok());
}

// ============================================================================
// Nested matching
// ============================================================================

fn app_router() -> Router<(), &'static str> {
    Router::new(vec![
        RouteNode::page("users/{user_id}", "user")
            .unwrap()
            .with_child(RouteNode::page("posts/{post_id}", "post").unwrap().with_name("post"))
            .with_child(RouteNode::page("", "user-overview").unwrap()),
        RouteNode::page("files/{rest:path}", "files").unwrap().with_name("files"),
        RouteNode::page("about", "about").unwrap(),
        RouteNode::page("", "home").unwrap(),
    ])
    .unwrap()
}

#[test]
fn test_nested_match_collects_params_from_all_levels() {
    let router = app_router();
    let chain = router.match_path("users/7/posts/99");

    assert_eq!(chain.pages(), vec![&"user", &"post"]);
    assert_eq!(chain.params, params(&[("user_id", "7"), ("post_id", "99")]));
    assert_eq!(chain.remainder, "");
}

#[test]
fn test_unmatched_trailing_segments_are_inert() {
    let router = app_router();
    let chain = router.match_path("about/team/extra");

    assert_eq!(chain.pages(), vec![&"about"]);
    assert_eq!(chain.remainder, "team/extra");
    assert!(!chain.ends_in_catch_all());
}

#[test]
fn test_root_index_page() {
    let router = app_router();
    assert_eq!(router.match_path("").pages(), vec![&"home"]);
}

// ============================================================================
// URL generation
// ============================================================================

#[rstest]
#[case("post", &[("user_id", "7"), ("post_id", "99")])]
#[case("post", &[("user_id", "jane doe"), ("post_id", "ü")])]
#[case("files", &[("rest", "docs/2024/report.pdf")])]
fn test_url_for_round_trips(#[case] name: &str, #[case] values: &[(&str, &str)]) {
    let router = app_router();
    let values = params(values);

    let path = router.url_for(name, &values).unwrap();
    let chain = router.match_path(&path);

    assert_eq!(chain.params, values);
}

#[test]
fn test_url_for_missing_param() {
    let router = app_router();
    assert_eq!(router.url_for("post", &params(&[("user_id", "7")])), None);
    assert_eq!(router.url_for("nope", &HashMap::new()), None);
}

// ============================================================================
// Resolution and guards
// ============================================================================

#[tokio::test]
async fn test_resolve_without_guards() {
    let router = app_router();
    let resolution = router.resolve(&(), &base(), &at("/users/7/posts/99?x=1")).await.unwrap();

    let Resolution::Internal(route) = resolution else {
        panic!("expected internal resolution");
    };
    assert_eq!(route.pages, vec!["user", "post"]);
    assert_eq!(route.params, params(&[("user_id", "7"), ("post_id", "99")]));
    assert_eq!(route.url, at("/users/7/posts/99?x=1"));
    assert_eq!(route.redirects, 0);
}

#[tokio::test]
async fn test_guard_redirect_rewrites_url() {
    let router: Router<bool, &str> = Router::new(vec![
        RouteNode::page("login", "login").unwrap(),
        RouteNode::<bool, &str>::page("admin", "admin").unwrap().with_guard_fn(|ctx| {
            if *ctx.session() {
                GuardOutcome::Accept
            } else {
                GuardOutcome::redirect("/login")
            }
        }),
    ])
    .unwrap();

    let anonymous = router.resolve(&false, &base(), &at("/admin")).await.unwrap();
    assert_eq!(anonymous.url(), &at("/login"));

    let admin = router.resolve(&true, &base(), &at("/admin")).await.unwrap();
    assert_eq!(admin.url(), &at("/admin"));
}

#[tokio::test]
async fn test_guard_abort_fails_navigation() {
    let router: Router<(), ()> = Router::new(vec![RouteNode::new("secret")
        .unwrap()
        .with_guard_fn(|_| GuardOutcome::abort("forbidden"))])
    .unwrap();

    let err = router.resolve(&(), &base(), &at("/secret")).await.unwrap_err();
    assert_eq!(
        err,
        NavigationError::Failed {
            url: at("/secret").to_string(),
            reason: "forbidden".to_string(),
        }
    );
}

fn hop_router() -> Router<usize, ()> {
    Router::new(vec![RouteNode::<usize, ()>::new("hop/{n}").unwrap().with_guard_fn(|ctx| {
        let n: usize = ctx.param("n").unwrap().parse().unwrap();
        if n < *ctx.session() {
            GuardOutcome::redirect(format!("/hop/{}", n + 1))
        } else {
            GuardOutcome::Accept
        }
    })])
    .unwrap()
}

#[tokio::test]
async fn test_redirect_chain_at_bound_succeeds() {
    let router = hop_router();
    let resolution = router.resolve(&DEFAULT_MAX_REDIRECTS, &base(), &at("/hop/0")).await.unwrap();

    let Resolution::Internal(route) = resolution else {
        panic!("expected internal resolution");
    };
    assert_eq!(route.redirects, DEFAULT_MAX_REDIRECTS);
    assert_eq!(route.url, at("/hop/20"));
}

#[tokio::test]
async fn test_redirect_chain_past_bound_fails() {
    let router = hop_router();
    let err = router
        .resolve(&(DEFAULT_MAX_REDIRECTS + 1), &base(), &at("/hop/0"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        NavigationError::TooManyRedirects {
            limit: DEFAULT_MAX_REDIRECTS,
            last: at("/hop/21").to_string(),
        }
    );
}

#[tokio::test]
async fn test_custom_redirect_bound() {
    let router = hop_router().with_max_redirects(2);
    assert!(router.resolve(&2, &base(), &at("/hop/0")).await.is_ok());
    assert!(router.resolve(&3, &base(), &at("/hop/0")).await.is_err());
}

#[tokio::test]
async fn test_guard_redirect_to_external_domain() {
    let router: Router<(), ()> = Router::new(vec![RouteNode::new("")
        .unwrap()
        .with_guard_fn(|_| GuardOutcome::redirect("https://example.org/signin"))])
    .unwrap();

    let resolution = router.resolve(&(), &base(), &at("/anything")).await.unwrap();
    assert_eq!(
        resolution,
        Resolution::External(Url::parse("https://example.org/signin").unwrap())
    );
}

#[tokio::test]
async fn test_external_target_skips_guards() {
    let router: Router<(), ()> = Router::new(vec![RouteNode::new("")
        .unwrap()
        .with_guard_fn(|_| GuardOutcome::abort("should not run"))])
    .unwrap();

    let target = Url::parse("https://elsewhere.net/page").unwrap();
    let resolution = router.resolve(&(), &base(), &target).await.unwrap();
    assert!(resolution.is_external());
}

#[tokio::test]
async fn test_external_is_decided_by_origin_only() {
    let router = app_router();
    let mounted = Url::parse("http://localhost:8000/app/").unwrap();

    let other_port = Url::parse("http://localhost:9000/about").unwrap();
    assert!(router.resolve(&(), &mounted, &other_port).await.unwrap().is_external());

    let outside_base_path = Url::parse("http://localhost:8000/about").unwrap();
    let Resolution::Internal(route) = router.resolve(&(), &mounted, &outside_base_path).await.unwrap() else {
        panic!("same-origin target should stay internal");
    };
    assert_eq!(route.pages, vec!["about"]);

    let below_base_path = Url::parse("http://localhost:8000/app/users/7").unwrap();
    let Resolution::Internal(route) = router.resolve(&(), &mounted, &below_base_path).await.unwrap() else {
        panic!("path below the base should stay internal");
    };
    assert_eq!(route.pages, vec!["user", "user-overview"]);
}

#[tokio::test]
async fn test_guards_run_root_to_leaf_and_see_prior_effects() {
    let router: Router<Log, ()> = Router::new(vec![RouteNode::<Log, ()>::new("org/{org}")
        .unwrap()
        .with_guard_fn(|ctx| {
            assert_eq!(ctx.chain().len(), 1);
            ctx.session().lock().unwrap().push(format!("org:{}", ctx.param("org").unwrap()));
            GuardOutcome::Accept
        })
        .with_child(RouteNode::<Log, ()>::new("repo/{repo}").unwrap().with_guard_fn(|ctx| {
            let log = ctx.session().lock().unwrap().clone();
            assert_eq!(log, vec!["org:acme".to_string()]);
            assert_eq!(ctx.chain().len(), 2);
            assert_eq!(ctx.param("org"), Some("acme"));
            ctx.session().lock().unwrap().push(format!("repo:{}", ctx.param("repo").unwrap()));
            GuardOutcome::Accept
        }))])
    .unwrap();

    let session = Mutex::new(Vec::new());
    router.resolve(&session, &base(), &at("/org/acme/repo/rhtmx")).await.unwrap();

    assert_eq!(
        session.into_inner().unwrap(),
        vec!["org:acme".to_string(), "repo:rhtmx".to_string()]
    );
}

#[tokio::test]
async fn test_invalid_redirect_target() {
    let router: Router<(), ()> = Router::new(vec![RouteNode::new("x")
        .unwrap()
        .with_guard_fn(|_| GuardOutcome::redirect("http://[::1"))])
    .unwrap();

    let err = router.resolve(&(), &base(), &at("/x")).await.unwrap_err();
    assert!(matches!(err, NavigationError::InvalidRedirect { .. }));
}
