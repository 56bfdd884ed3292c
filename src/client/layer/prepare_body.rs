//! Middleware adding body framing headers.

use http::{
    header::{CONTENT_LENGTH, EXPECT, TRANSFER_ENCODING},
    HeaderValue, Version,
};

use crate::{
    client::{
        handler::Handler,
        options::Expect,
        stack::Middleware,
    },
    Options, Request,
};

/// Bodies at least this large get `Expect: 100-Continue` by default.
const EXPECT_THRESHOLD: u64 = 1024 * 1024;

/// Middleware adding `Content-Length` and `Expect` headers to requests with
/// a body.
pub fn prepare_body() -> Middleware {
    Middleware::new(|next: Handler| {
        Handler::new(move |request: Request, options: Options| {
            let request = prepare(request, &options);
            next.call(request, options)
        })
        .named("PrepareBodyMiddleware")
    })
    .named("prepare_body")
}

fn prepare(mut request: Request, options: &Options) -> Request {
    if request.body().is_empty() {
        return request;
    }

    let len = request.body().len() as u64;
    if !request.has_header(CONTENT_LENGTH) && !request.has_header(TRANSFER_ENCODING) {
        request = request.with_header(CONTENT_LENGTH, HeaderValue::from(len));
    }

    if request.has_header(EXPECT) || request.version() == Version::HTTP_10 {
        return request;
    }

    let expect = match options.expect() {
        Some(Expect::Enabled(enabled)) => enabled,
        Some(Expect::Threshold(threshold)) => len >= threshold,
        None => len >= EXPECT_THRESHOLD,
    };
    if expect {
        request = request.with_header(EXPECT, HeaderValue::from_static("100-Continue"));
    }

    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    fn post(body: &'static str) -> Request {
        Request::new(Method::POST, "http://example.com/")
            .unwrap()
            .with_body(body)
    }

    #[test]
    fn adds_content_length() {
        let req = prepare(post("hello"), &Options::new());
        assert_eq!(req.headers()[CONTENT_LENGTH], "5");
        assert!(!req.has_header(EXPECT));
    }

    #[test]
    fn keeps_existing_framing() {
        let req = post("hello").with_header(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        let req = prepare(req, &Options::new());
        assert!(!req.has_header(CONTENT_LENGTH));

        let empty = Request::new(Method::GET, "http://example.com/").unwrap();
        assert!(prepare(empty, &Options::new()).headers().is_empty());
    }

    #[test]
    fn expect_per_option() {
        let always = Options::new().with_expect(Expect::Enabled(true));
        assert_eq!(prepare(post("a"), &always).headers()[EXPECT], "100-Continue");

        let threshold = Options::new().with_expect(Expect::Threshold(3));
        assert!(!prepare(post("ab"), &threshold).has_header(EXPECT));
        assert!(prepare(post("abc"), &threshold).has_header(EXPECT));

        let old = post("a").with_version(Version::HTTP_10);
        assert!(!prepare(old, &always).has_header(EXPECT));
    }
}
