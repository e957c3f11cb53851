use junction::proxy::{PathMatch, Pattern, ResolveError, Route, Target};

fn no_capture(remainder: &str) -> PathMatch {
    PathMatch {
        captured: None,
        remainder: remainder.to_string(),
    }
}

fn captured(value: &str, remainder: &str) -> PathMatch {
    PathMatch {
        captured: Some(value.to_string()),
        remainder: remainder.to_string(),
    }
}

#[test]
fn test_constant_origin_with_prefix_stripped() {
    let route = Route {
        pattern: Pattern::Prefix("/api".to_string()),
        target: Target::origin("http://svc-a:9000", true).unwrap(),
    };

    let url = route
        .resolve("/api/items", &no_capture("/items"), Some("x=1"))
        .unwrap();

    assert_eq!(url.as_str(), "http://svc-a:9000/items?x=1");
}

#[test]
fn test_constant_origin_with_prefix_kept() {
    let route = Route {
        pattern: Pattern::Prefix("/api".to_string()),
        target: Target::origin("http://svc-a:9000", false).unwrap(),
    };

    let url = route
        .resolve("/api/items", &no_capture("/items"), None)
        .unwrap();

    assert_eq!(url.as_str(), "http://svc-a:9000/api/items");
}

#[test]
fn test_empty_remainder_normalizes_to_root() {
    let route = Route {
        pattern: Pattern::Prefix("/api".to_string()),
        target: Target::origin("http://svc-a:9000", true).unwrap(),
    };

    let url = route.resolve("/api", &no_capture(""), None).unwrap();
    assert_eq!(url.as_str(), "http://svc-a:9000/");
}

#[test]
fn test_query_survives_resolution_verbatim() {
    let route = Route {
        pattern: Pattern::Prefix("/api".to_string()),
        target: Target::origin("http://svc-a:9000", true).unwrap(),
    };

    let url = route
        .resolve("/api/search", &no_capture("/search"), Some("q=a%20b&n=2"))
        .unwrap();

    assert_eq!(url.query(), Some("q=a%20b&n=2"));
}

#[test]
fn test_template_substitutes_captured_segment() {
    let route = Route {
        pattern: Pattern::Capture("host".to_string()),
        target: Target::template("http://{host}:9100", "host").unwrap(),
    };

    let url = route
        .resolve("/worker7/status", &captured("worker7", "/status"), None)
        .unwrap();

    assert_eq!(url.as_str(), "http://worker7:9100/status");
}

#[test]
fn test_template_with_path_position_placeholder() {
    let route = Route {
        pattern: Pattern::Capture("ctx".to_string()),
        target: Target::template("http://localhost:3000/{ctx}", "ctx").unwrap(),
    };

    let url = route
        .resolve("/dashboard", &captured("dashboard", ""), None)
        .unwrap();

    assert_eq!(url.as_str(), "http://localhost:3000/dashboard");
}

#[test]
fn test_template_appends_remainder_after_placeholder_path() {
    let route = Route {
        pattern: Pattern::Capture("tenant".to_string()),
        target: Target::template("http://backend:8000/{tenant}", "tenant").unwrap(),
    };

    let url = route
        .resolve("/acme/users/1", &captured("acme", "/users/1"), Some("page=2"))
        .unwrap();

    assert_eq!(url.as_str(), "http://backend:8000/acme/users/1?page=2");
}

#[test]
fn test_origin_must_be_bare() {
    assert!(Target::origin("http://svc-a:9000/base", true).is_err());
    assert!(Target::origin("http://svc-a:9000/?x=1", true).is_err());
    assert!(Target::origin("http://svc-a:9000", true).is_ok());
}

#[test]
fn test_disallowed_scheme_rejected() {
    let result = Target::origin("https://svc-a:9000", true);
    assert!(matches!(result, Err(ResolveError::DisallowedScheme(_))));

    let result = Target::template("ftp://{host}:21", "host");
    assert!(matches!(result, Err(ResolveError::DisallowedScheme(_))));
}

#[test]
fn test_template_placeholder_must_be_bound() {
    let result = Target::template("http://{other}:9100", "host");
    assert!(matches!(result, Err(ResolveError::UnboundPlaceholder(_))));
}

#[test]
fn test_template_with_unclosed_brace_rejected() {
    let result = Target::template("http://{host:9100", "host");
    assert!(matches!(result, Err(ResolveError::BadTemplate(_))));
}

#[test]
fn test_resolution_fails_fast_on_invalid_rendered_url() {
    let route = Route {
        pattern: Pattern::Capture("port".to_string()),
        target: Target::template("http://127.0.0.1:{port}", "port").unwrap(),
    };

    // A captured segment that renders an unparseable URL is an error, not
    // a silently truncated target.
    let result = route.resolve("/notaport/x", &captured("notaport", "/x"), None);
    assert!(matches!(result, Err(ResolveError::InvalidUrl(_))));
}
