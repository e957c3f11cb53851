use junction::http::response::{Response, ResponseBuilder, StatusCode};

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::NotFound.as_u16(), 404);
    assert_eq!(StatusCode::BadGateway.as_u16(), 502);
    assert_eq!(StatusCode::GatewayTimeout.as_u16(), 504);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::BadRequest.reason_phrase(), "Bad Request");
    assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    assert_eq!(StatusCode::BadGateway.reason_phrase(), "Bad Gateway");
    assert_eq!(StatusCode::GatewayTimeout.reason_phrase(), "Gateway Timeout");
}

#[test]
fn test_response_builder_basic() {
    let response = ResponseBuilder::new(StatusCode::NotFound)
        .body(b"nothing here".to_vec())
        .build();

    assert_eq!(response.status, StatusCode::NotFound);
    assert_eq!(response.body, b"nothing here".to_vec());
}

#[test]
fn test_response_builder_with_headers() {
    let response = ResponseBuilder::new(StatusCode::BadGateway)
        .header("Content-Type", "text/plain")
        .header("X-Custom", "value")
        .body(b"test".to_vec())
        .build();

    assert_eq!(response.headers.get("Content-Type").unwrap(), "text/plain");
    assert_eq!(response.headers.get("X-Custom").unwrap(), "value");
}

#[test]
fn test_response_builder_auto_content_length() {
    let body = b"This is the body".to_vec();
    let response = ResponseBuilder::new(StatusCode::BadRequest)
        .body(body.clone())
        .build();

    let content_length = response.headers.get("Content-Length").unwrap();
    assert_eq!(content_length, body.len().to_string());
}

#[test]
fn test_response_builder_keeps_explicit_content_length() {
    let response = ResponseBuilder::new(StatusCode::BadRequest)
        .header("Content-Length", "99")
        .body(b"short".to_vec())
        .build();

    assert_eq!(response.headers.get("Content-Length").unwrap(), "99");
}

#[test]
fn test_error_constructors() {
    let not_found = Response::not_found();
    assert_eq!(not_found.status, StatusCode::NotFound);
    assert!(!not_found.body.is_empty());

    let bad_gateway = Response::bad_gateway("upstream unreachable");
    assert_eq!(bad_gateway.status, StatusCode::BadGateway);
    assert!(
        String::from_utf8_lossy(&bad_gateway.body).contains("upstream unreachable")
    );

    let timeout = Response::gateway_timeout("too slow");
    assert_eq!(timeout.status, StatusCode::GatewayTimeout);

    let bad_request = Response::bad_request("unparseable");
    assert_eq!(bad_request.status, StatusCode::BadRequest);
}
