#![no_main]

use hget::uri::decompose;
use hget::{parse_response, parse_response_head, split_response, ResponseBody};
use libfuzzer_sys::fuzz_target;

// Base used to resolve fuzzed Location headers
const BASE: &str = "http://example.com/a/b?c";

fuzz_target!(|data: &[u8]| {
    // Splitting never fails, only the head parse may.
    let (block, body) = split_response(data);

    if let ResponseBody::Text(text) = &body {
        assert!(text.len() <= data.len());
    }

    let Ok(head) = parse_response_head(&block) else {
        assert!(parse_response(data).is_err());
        return;
    };

    let full = parse_response(data).expect("same input parses twice");
    assert_eq!(full.head, head);
    assert_eq!(full.body, body);

    // Whatever a server sends as Location must resolve or fail cleanly.
    if let Some(location) = head.location() {
        let base = decompose(BASE).unwrap();
        if let Ok(next) = base.resolve(location) {
            assert!(next.path.starts_with('/'));
        }
    }

    // A parsed head renders back to something that parses.
    if head.has_status_line() {
        let again = parse_response_head(&head.to_string()).expect("rendered head parses");
        assert_eq!(again.code, head.code);
    }
});
