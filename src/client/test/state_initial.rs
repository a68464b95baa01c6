use http::Method;

use crate::client::flow::Cycle;
use crate::{Error, Headers};

use super::scenario::{Scenario, ScriptedTransport};

#[test]
fn unsupported_scheme_fails_before_sending() {
    let err = Cycle::new("ftp://x", Method::GET, Headers::new(), String::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidScheme(_)));

    let err = Cycle::new("example.com", Method::GET, Headers::new(), String::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidUri(_)));
}

#[test]
fn non_standard_method_is_accepted() {
    let method = Method::from_bytes(b"BREW").unwrap();
    let scenario = Scenario::builder().method(method, "http://pot.test").build();

    let cycle = scenario.to_initial();
    assert_eq!(cycle.method().as_str(), "BREW");

    let req = cycle.request().unwrap();
    assert_eq!(req.method.as_str(), "BREW");
}

#[test]
fn request_adds_body_headers_per_attempt() {
    let scenario = Scenario::builder()
        .post("http://q.test/form")
        .header("X-Foo", "bar")
        .body("a=1")
        .build();

    let cycle = scenario.to_initial();
    let req = cycle.request().unwrap();

    assert_eq!(req.headers.get("content-type"), Some("text/plain"));
    assert_eq!(req.headers.get("content-length"), Some("3"));

    // The cycle's own headers are left alone.
    assert!(!cycle.headers().contains("content-length"));
    assert_eq!(cycle.inner().headers.len(), 1);
}

#[test]
fn send_frames_request() {
    let scenario = Scenario::builder()
        .get("http://q.test:8080/path?x=1")
        .header("user-agent", "hget/test")
        .build();

    let mut transport = ScriptedTransport::new().reply(b"HTTP/1.1 200 OK\r\n\r\nok");
    let sent = scenario.to_initial().send(&mut transport).unwrap();

    assert_eq!(sent.raw(), b"HTTP/1.1 200 OK\r\n\r\nok");
    assert_eq!(transport.exchanges(), 1);
    assert_eq!(
        transport.sent_text(0),
        "GET /path?x=1 HTTP/1.1\r\n\
        Host: q.test:8080\r\n\
        Connection: close\r\n\
        User-Agent: hget/test\r\n\
        \r\n\
        \r\n"
    );
    assert_eq!(transport.sent[0].0.port, 8080);
}

#[test]
fn header_after_new() {
    let scenario = Scenario::builder().get("http://q.test").build();
    let mut cycle = scenario.to_initial();

    cycle.header("accept", "text/html").unwrap();
    cycle.header("Accept", "*/*").unwrap();

    assert_eq!(cycle.headers().get("ACCEPT"), Some("*/*"));
    assert_eq!(cycle.headers().len(), 1);
}
