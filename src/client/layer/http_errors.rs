//! Middleware turning error statuses into rejections.

use crate::{
    client::{handler::Handler, stack::Middleware},
    error::Error,
    promise::Next,
    Options, Request, Response,
};

/// Middleware rejecting 4xx responses with a client error and 5xx responses
/// with a server error, when the `http_errors` option is set.
///
/// The error carries the request and the response; its message includes a
/// short summary of a printable body.
pub fn http_errors() -> Middleware {
    Middleware::new(|next: Handler| {
        Handler::new(move |request: Request, options: Options| {
            if !options.http_errors() {
                return next.call(request, options);
            }

            let sent = request.clone();
            next.call(request, options).and_then(move |response: Response| {
                if response.status().as_u16() < 400 {
                    Ok(Next::Value(response))
                } else {
                    Err(Error::status_code(sent, response))
                }
            })
        })
        .named("HttpErrorsMiddleware")
    })
    .named("http_errors")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{client::handler::mock::MockHandler, Method, StatusCode};

    fn request() -> Request {
        Request::new(Method::GET, "http://example.com/missing").unwrap()
    }

    #[test]
    fn client_error_with_summary() {
        let mock = MockHandler::new([Response::new(StatusCode::NOT_FOUND).with_body("nothing here")]);
        let handler = http_errors().apply(mock.into());

        let err = handler
            .call(request(), Options::new().with_http_errors(true))
            .wait()
            .unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(err
            .to_string()
            .contains("Client error: `GET http://example.com/missing` resulted in a `404 Not Found` response"));
        assert!(err.to_string().contains("nothing here"));
    }

    #[test]
    fn server_error() {
        let mock = MockHandler::new([Response::new(StatusCode::BAD_GATEWAY)]);
        let handler = http_errors().apply(mock.into());
        let err = handler
            .call(request(), Options::new().with_http_errors(true))
            .wait()
            .unwrap_err();
        assert!(err.is_server_error());
        assert!(err.has_response());
    }

    #[test]
    fn disabled_passes_through() {
        let mock = MockHandler::new([Response::new(StatusCode::NOT_FOUND)]);
        let handler = http_errors().apply(mock.into());
        let res = handler.call(request(), Options::new()).wait().unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
