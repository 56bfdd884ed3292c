use std::time::Duration;

use reqstack::{redirect::RedirectOption, Expect, Options};
use serde_json::json;

#[test]
fn scalar_options() {
    let options = Options::from_value(json!({
        "retries": 2,
        "delay": 250,
        "http_errors": true,
        "synchronous": true,
        "stream": false,
        "timeout": 1.5,
        "connect_timeout": 3,
        "expect": 1024,
        "body": "raw body",
    }))
    .unwrap();

    assert_eq!(options.retries(), Some(2));
    assert_eq!(options.delay(), Some(Duration::from_millis(250)));
    assert!(options.http_errors());
    assert!(options.synchronous());
    assert!(!options.stream());
    assert_eq!(options.timeout(), Some(Duration::from_millis(1500)));
    assert_eq!(options.connect_timeout(), Some(Duration::from_secs(3)));
    assert_eq!(options.expect(), Some(Expect::Threshold(1024)));
    assert_eq!(&options.body().unwrap()[..], b"raw body");
}

#[test]
fn allow_redirects_forms() {
    let options = Options::from_value(json!({ "allow_redirects": false })).unwrap();
    assert!(matches!(options.allow_redirects(), Some(RedirectOption::Disabled)));

    let options = Options::from_value(json!({ "allow_redirects": true })).unwrap();
    assert_eq!(options.allow_redirects().unwrap().config().unwrap().max, 5);

    let options = Options::from_value(json!({
        "allow_redirects": { "max": 3, "strict": true, "protocols": ["https"] }
    }))
    .unwrap();
    let config = options.allow_redirects().unwrap().config().unwrap();
    assert_eq!(config.max, 3);
    assert!(config.strict);
    assert_eq!(config.protocols, ["https"]);
    assert!(!config.referer);

    let err = Options::from_value(json!({ "allow_redirects": "yes" })).unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn headers_accept_strings_and_lists() {
    let options = Options::from_value(json!({
        "headers": { "X-One": "1", "X-Many": ["a", "b"] }
    }))
    .unwrap();
    let headers = options.headers().unwrap();
    assert_eq!(headers["x-one"], "1");
    let many: Vec<_> = headers.get_all("x-many").iter().collect();
    assert_eq!(many, ["a", "b"]);

    let err = Options::from_value(json!({ "headers": { "bad header": "1" } })).unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn query_and_form_encodings() {
    let options = Options::from_value(json!({ "query": "a=1&b=2" })).unwrap();
    assert_eq!(options.query(), Some("a=1&b=2"));

    let options = Options::from_value(json!({ "query": [["q", "rust lang"], ["q", "http"]] })).unwrap();
    assert_eq!(options.query(), Some("q=rust+lang&q=http"));

    let options = Options::from_value(json!({ "form_params": { "b": "2", "a": "1" } })).unwrap();
    assert_eq!(options.form_params(), Some("a=1&b=2"));
}

#[test]
fn auth_and_json() {
    let options = Options::from_value(json!({
        "auth": { "username": "user", "password": "pass" },
        "json": { "k": [1, 2] },
    }))
    .unwrap();
    let auth = options.auth().unwrap();
    assert_eq!(auth.username(), "user");
    assert_eq!(auth.password(), Some("pass"));
    assert_eq!(options.json().unwrap(), &json!({ "k": [1, 2] }));
}

#[test]
fn unknown_and_malformed_fields_are_rejected() {
    let err = Options::from_value(json!({ "retires": 1 })).unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(err.to_string().contains("retires"));

    assert!(Options::from_value(json!({ "delay": -5 })).is_err());
    assert!(Options::from_value(json!({ "retries": "many" })).is_err());
}
