//! Middleware logging every transfer.

use log::{log, Level};

use crate::{
    client::{handler::Handler, stack::Middleware},
    promise::Next,
    Error, Options, Request, Response,
};

/// Middleware emitting one record per transfer at `level`.
///
/// Fulfilled transfers log the method, URL and status. Rejected ones log the
/// error at [`Level::Warn`] or above.
pub fn log(level: Level) -> Middleware {
    Middleware::new(move |next: Handler| {
        Handler::new(move |request: Request, options: Options| {
            let method = request.method().clone();
            let url = request.url().clone();
            let failed = (method.clone(), url.clone());

            next.call(request, options).then(
                move |response: Response| -> crate::Result<Next<Response>> {
                    log!(level, "{method} {url} -> {}", response.status());
                    Ok(Next::Value(response))
                },
                move |error: Error| -> crate::Result<Next<Response>> {
                    let (method, url) = failed;
                    log!(level.min(Level::Warn), "{method} {url} failed: {error}");
                    Err(error)
                },
            )
        })
        .named("LogMiddleware")
    })
    .named("log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::handler::mock::{MockHandler, MockItem},
        Method, StatusCode,
    };

    #[test]
    fn passes_outcomes_through() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mock = MockHandler::new([
            MockItem::from(Response::new(StatusCode::OK)),
            MockItem::from(Error::connect("refused")),
        ]);
        let handler = log(Level::Debug).apply(mock.into());
        let req = Request::new(Method::GET, "http://example.com/").unwrap();

        assert_eq!(handler.call(req.clone(), Options::new()).wait().unwrap().status(), StatusCode::OK);
        assert!(handler.call(req, Options::new()).wait().unwrap_err().is_connect());
    }
}
