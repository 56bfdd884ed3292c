//! Middleware to use a cookie jar.

use http::header::COOKIE;

use crate::{
    client::{handler::Handler, stack::Middleware},
    cookie::store_response_cookies,
};

/// Middleware adding the jar's cookies to requests and storing `Set-Cookie`
/// headers from responses, when the `cookies` option holds a jar.
///
/// The jar's `Cookie` value replaces one already on the request, so cookies
/// received during a redirect chain reach the next hop. An empty jar leaves
/// the request untouched.
pub fn cookies() -> Middleware {
    Middleware::new(|next: Handler| {
        Handler::new(move |mut request, options| {
            let Some(jar) = options.cookies().cloned() else {
                return next.call(request, options);
            };

            if let Some(value) = jar.cookies(request.url()) {
                request = request.with_header(COOKIE, value);
            }

            let url = request.url().clone();
            next.call(request, options).map(move |response| {
                store_response_cookies(jar.as_ref(), response.headers(), &url);
                response
            })
        })
        .named("CookieMiddleware")
    })
    .named("cookies")
}
