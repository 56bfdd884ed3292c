//! Middleware observing or rewriting requests and responses.

use std::sync::Arc;

use crate::{
    client::{handler::Handler, stack::Middleware},
    promise::Promise,
    Options, Request, Response,
};

type Before = Arc<dyn Fn(&Request, &Options) + Send + Sync>;
type After = Arc<dyn Fn(&Request, &Options, &Promise<Response>) + Send + Sync>;

/// Middleware calling `before` ahead of the next handler and `after` right
/// after it returned its promise.
///
/// `after` sees the promise as returned, usually still pending.
pub fn tap<B, A>(before: Option<B>, after: Option<A>) -> Middleware
where
    B: Fn(&Request, &Options) + Send + Sync + 'static,
    A: Fn(&Request, &Options, &Promise<Response>) + Send + Sync + 'static,
{
    let before: Option<Before> = before.map(|f| Arc::new(f) as Before);
    let after: Option<After> = after.map(|f| Arc::new(f) as After);

    Middleware::new(move |next: Handler| {
        let before = before.clone();
        let after = after.clone();
        Handler::new(move |request: Request, options: Options| {
            if let Some(before) = &before {
                before(&request, &options);
            }
            let Some(after) = &after else {
                return next.call(request, options);
            };
            let promise = next.call(request.clone(), options.clone());
            after(&request, &options, &promise);
            promise
        })
        .named("TapMiddleware")
    })
    .named("tap")
}

/// Middleware rewriting every request before it is passed on.
pub fn map_request<F>(f: F) -> Middleware
where
    F: Fn(Request) -> Request + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Middleware::new(move |next: Handler| {
        let f = f.clone();
        Handler::new(move |request, options| next.call(f(request), options))
            .named("MapRequestMiddleware")
    })
    .named("map_request")
}

/// Middleware rewriting every fulfilled response.
pub fn map_response<F>(f: F) -> Middleware
where
    F: Fn(Response) -> Response + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Middleware::new(move |next: Handler| {
        let f = f.clone();
        Handler::new(move |request, options| {
            let f = f.clone();
            next.call(request, options).map(move |response| f(response))
        })
        .named("MapResponseMiddleware")
    })
    .named("map_response")
}
