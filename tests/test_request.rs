use junction::http::request::{Method, RequestBuilder};

#[test]
fn test_method_from_str() {
    assert_eq!(Method::from_str("GET"), Some(Method::GET));
    assert_eq!(Method::from_str("POST"), Some(Method::POST));
    assert_eq!(Method::from_str("PATCH"), Some(Method::PATCH));
    assert_eq!(
        Method::from_str("PROPFIND"),
        Some(Method::Other("PROPFIND".to_string()))
    );
    assert_eq!(Method::from_str("get"), None);
    assert_eq!(Method::from_str(""), None);
}

#[test]
fn test_extension_method_as_str() {
    assert_eq!(Method::from_str("MKCOL").unwrap().as_str(), "MKCOL");
}

#[test]
fn test_method_as_str_round_trip() {
    for name in ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH"] {
        assert_eq!(Method::from_str(name).unwrap().as_str(), name);
    }
}

#[test]
fn test_builder_defaults_version() {
    let head = RequestBuilder::new()
        .method(Method::GET)
        .path("/x")
        .build()
        .unwrap();

    assert_eq!(head.version, "HTTP/1.1");
}

#[test]
fn test_builder_requires_method_and_path() {
    assert!(RequestBuilder::new().path("/x").build().is_err());
    assert!(RequestBuilder::new().method(Method::GET).build().is_err());
}

#[test]
fn test_header_lookup_is_case_insensitive() {
    let head = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .header("Content-Type", "text/plain")
        .build()
        .unwrap();

    assert_eq!(head.header("content-type"), Some("text/plain"));
    assert_eq!(head.header("CONTENT-TYPE"), Some("text/plain"));
    assert_eq!(head.header("X-Missing"), None);
}

#[test]
fn test_keep_alive_defaults() {
    let http11 = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .build()
        .unwrap();
    assert!(http11.keep_alive());

    let http10 = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .version("HTTP/1.0")
        .build()
        .unwrap();
    assert!(!http10.keep_alive());
}

#[test]
fn test_keep_alive_explicit_header_wins() {
    let close = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .header("Connection", "close")
        .build()
        .unwrap();
    assert!(!close.keep_alive());

    let keep = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .version("HTTP/1.0")
        .header("Connection", "keep-alive")
        .build()
        .unwrap();
    assert!(keep.keep_alive());
}

#[test]
fn test_body_detection() {
    let none = RequestBuilder::new()
        .method(Method::GET)
        .path("/")
        .build()
        .unwrap();
    assert!(!none.has_body());

    let sized = RequestBuilder::new()
        .method(Method::POST)
        .path("/")
        .header("Content-Length", "12")
        .build()
        .unwrap();
    assert_eq!(sized.content_length(), Some(12));
    assert!(sized.has_body());

    let chunked = RequestBuilder::new()
        .method(Method::POST)
        .path("/")
        .header("Transfer-Encoding", "chunked")
        .build()
        .unwrap();
    assert!(chunked.is_chunked());
    assert!(chunked.has_body());
}

#[test]
fn test_path_split_without_query() {
    let head = RequestBuilder::new()
        .method(Method::GET)
        .path("/plain")
        .build()
        .unwrap();

    assert_eq!(head.path_only(), "/plain");
    assert_eq!(head.query(), None);
}
