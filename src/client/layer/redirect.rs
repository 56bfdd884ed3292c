//! Middleware for following redirections.

use std::fmt;

use http::{header::LOCATION, HeaderName, HeaderValue};
use log::debug;

use crate::{
    client::{handler::Handler, stack::Middleware},
    error::{Error, Result},
    promise::{Next, Promise},
    redirect::{self, Config},
    Options, Request, Response, Url,
};

/// Middleware following redirect responses according to the
/// `allow_redirects` option.
///
/// Every hop goes through this middleware again, so the redirect count kept
/// in the options covers the whole chain.
#[derive(Clone)]
pub struct RedirectMiddleware {
    next: Handler,
}

// ===== impl RedirectMiddleware =====

impl RedirectMiddleware {
    /// Wrap `next`.
    pub fn new(next: Handler) -> Self {
        RedirectMiddleware { next }
    }

    /// Send `request`, following redirects when the options allow it.
    pub fn call(&self, request: Request, options: Options) -> Promise<Response> {
        let Some(config) = options
            .allow_redirects()
            .and_then(|r| r.config())
            .cloned()
        else {
            return self.next.call(request, options);
        };

        let this = self.clone();
        let sent = request.clone();
        let hop_options = options.clone();
        self.next.call(request, options).and_then(move |response| {
            this.check_redirect(sent, hop_options, response, &config)
        })
    }

    fn check_redirect(
        &self,
        request: Request,
        options: Options,
        response: Response,
        config: &Config,
    ) -> Result<Next<Response>> {
        if !response.status().is_redirection() || !response.has_header(LOCATION) {
            return Ok(Next::Value(response));
        }

        let count = options.redirect_count() + 1;
        if count > config.max {
            return Err(Error::too_many_redirects(config.max, request, response));
        }

        let next = redirect::next_request(&request, &response, config)?;
        if let Some(on_redirect) = &config.on_redirect {
            on_redirect(&request, &response, next.url())?;
        }

        debug!(
            "redirecting {} {} -> {} ({}, hop {count})",
            request.method(),
            request.url(),
            next.url(),
            response.status()
        );

        let next_url = next.url().clone();
        let promise = self.call(next, options.with_redirect_count(count));

        if !config.track_redirects {
            return Ok(Next::Promise(promise));
        }

        let status = response.status();
        Ok(Next::Promise(promise.map(move |last| {
            track_redirect(last, &next_url, status.as_u16())
        })))
    }
}

impl fmt::Debug for RedirectMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RedirectMiddleware")
            .field("next", &self.next)
            .finish()
    }
}

impl From<RedirectMiddleware> for Handler {
    fn from(redirect: RedirectMiddleware) -> Self {
        Handler::new(move |request, options| redirect.call(request, options))
            .named("RedirectMiddleware")
    }
}

/// Middleware following redirects as configured by the `allow_redirects`
/// option.
pub fn redirect() -> Middleware {
    Middleware::new(|next| RedirectMiddleware::new(next).into()).named("redirect")
}

// Inner hops return first, so each level prepends its own entry.
fn track_redirect(response: Response, url: &Url, status: u16) -> Response {
    let mut headers = response.headers().clone();
    prepend(&mut headers, HeaderName::from_static("x-redirect-history"), url.as_str());
    prepend(
        &mut headers,
        HeaderName::from_static("x-redirect-status-history"),
        &status.to_string(),
    );
    response.with_headers(headers)
}

fn prepend(headers: &mut http::HeaderMap, name: HeaderName, value: &str) {
    let Ok(value) = HeaderValue::from_str(value) else {
        return;
    };
    let previous: Vec<HeaderValue> = headers.get_all(&name).iter().cloned().collect();
    headers.insert(name.clone(), value);
    for v in previous {
        headers.append(name.clone(), v);
    }
}
