use std::{any::type_name, borrow::Cow, fmt, sync::Arc};

use crate::{
    client::{handler::Handler, layer},
    error::{Error, Result},
    promise::Promise,
    Options, Request, Response,
};

type MiddlewareFn = dyn Fn(Handler) -> Handler + Send + Sync;

/// A function wrapping a [`Handler`] into another handler.
#[derive(Clone)]
pub struct Middleware {
    inner: Arc<MiddlewareFn>,
    name: Cow<'static, str>,
}

impl Middleware {
    /// Wrap a function as middleware.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Handler) -> Handler + Send + Sync + 'static,
    {
        Middleware {
            inner: Arc::new(f),
            name: Cow::Borrowed(type_name::<F>()),
        }
    }

    /// Set the function name shown when a stack is printed.
    pub fn named<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// The function name shown when a stack is printed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wrap `next`.
    pub fn apply(&self, next: Handler) -> Handler {
        (self.inner)(next)
    }

    /// Returns true when both values share the same function.
    pub fn ptr_eq(&self, other: &Middleware) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Middleware").field(&self.name).finish()
    }
}

/// Selects the entries [`HandlerStack::remove`] deletes.
#[derive(Debug, Clone, Copy)]
pub enum Removal<'a> {
    /// Every entry with this name.
    Name(&'a str),
    /// Every entry holding this middleware.
    Middleware(&'a Middleware),
}

impl<'a> From<&'a str> for Removal<'a> {
    fn from(name: &'a str) -> Self {
        Removal::Name(name)
    }
}

impl<'a> From<&'a Middleware> for Removal<'a> {
    fn from(middleware: &'a Middleware) -> Self {
        Removal::Middleware(middleware)
    }
}

/// An ordered, named list of middleware around a terminal handler.
///
/// Entries are kept outside-in: the first entry is the outermost layer and
/// sees a request first and its response last. [`push`](Self::push) adds an
/// innermost layer, [`unshift`](Self::unshift) a new outermost one.
///
/// ```
/// use reqstack::{HandlerStack, Middleware, handler::MockHandler, Response};
///
/// let mut stack = HandlerStack::with_handler(MockHandler::new([Response::default()]).into());
/// stack.push(Middleware::new(|next| next), "identity");
/// let handler = stack.resolve().unwrap();
/// # let _ = handler;
/// ```
#[derive(Clone, Default)]
pub struct HandlerStack {
    handler: Option<Handler>,
    stack: Vec<(Middleware, String)>,
}

impl HandlerStack {
    /// An empty stack without a handler.
    pub fn new() -> Self {
        HandlerStack::default()
    }

    /// An empty stack around `handler`.
    pub fn with_handler(handler: Handler) -> Self {
        HandlerStack {
            handler: Some(handler),
            stack: Vec::new(),
        }
    }

    /// The default stack around `handler`: `http_errors`, `allow_redirects`,
    /// `cookies` and `prepare_body`, outermost first.
    pub fn create(handler: Handler) -> Self {
        let mut stack = HandlerStack::with_handler(handler);
        stack.push(layer::http_errors(), "http_errors");
        stack.push(layer::redirect(), "allow_redirects");
        #[cfg(feature = "cookies")]
        stack.push(layer::cookies(), "cookies");
        stack.push(layer::prepare_body(), "prepare_body");
        stack
    }

    /// Set the terminal handler.
    pub fn set_handler(&mut self, handler: Handler) {
        self.handler = Some(handler);
    }

    /// Returns true if a terminal handler is set.
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Number of middleware entries.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Returns true if the stack holds no middleware.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Add a middleware as the innermost layer.
    pub fn push<N: Into<String>>(&mut self, middleware: Middleware, name: N) {
        self.stack.push((middleware, name.into()));
    }

    /// Add a middleware as the outermost layer.
    pub fn unshift<N: Into<String>>(&mut self, middleware: Middleware, name: N) {
        self.stack.insert(0, (middleware, name.into()));
    }

    /// Insert a middleware right before (outside of) the entry named `find`.
    pub fn before<N: Into<String>>(&mut self, find: &str, middleware: Middleware, name: N) -> Result<()> {
        let idx = self.find_by_name(find)?;
        self.stack.insert(idx, (middleware, name.into()));
        Ok(())
    }

    /// Insert a middleware right after (inside of) the entry named `find`.
    pub fn after<N: Into<String>>(&mut self, find: &str, middleware: Middleware, name: N) -> Result<()> {
        let idx = self.find_by_name(find)?;
        self.stack.insert(idx + 1, (middleware, name.into()));
        Ok(())
    }

    /// Remove every entry matching a name or a middleware instance.
    /// Nothing matching is not an error.
    pub fn remove<'a, R: Into<Removal<'a>>>(&mut self, remove: R) {
        match remove.into() {
            Removal::Name(name) => self.stack.retain(|(_, n)| n != name),
            Removal::Middleware(mw) => self.stack.retain(|(m, _)| !m.ptr_eq(mw)),
        }
    }

    /// Compose the middleware around the handler.
    ///
    /// The returned handler captures the stack as it is now; later changes to
    /// the stack do not affect it.
    pub fn resolve(&self) -> Result<Handler> {
        let mut prev = self
            .handler
            .clone()
            .ok_or_else(|| Error::logic("no handler has been specified"))?;

        for (middleware, _) in self.stack.iter().rev() {
            prev = middleware.apply(prev);
        }

        Ok(prev)
    }

    /// Resolve the stack and invoke it.
    pub fn call(&self, request: Request, options: Options) -> Promise<Response> {
        match self.resolve() {
            Ok(handler) => handler.call(request, options),
            Err(e) => Promise::rejected(e),
        }
    }

    fn find_by_name(&self, name: &str) -> Result<usize> {
        self.stack
            .iter()
            .position(|(_, n)| n == name)
            .ok_or_else(|| Error::invalid_argument(format!("middleware not found: {name}")))
    }
}

impl fmt::Display for HandlerStack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut entries = Vec::with_capacity(self.stack.len() + 1);
        if let Some(handler) = &self.handler {
            entries.push(format!("0) Handler: {}", handler.name()));
        }

        let mut depth = self.stack.len();
        for (middleware, name) in &self.stack {
            writeln!(f, "> {depth}) Name: '{name}', Function: {}", middleware.name())?;
            depth -= 1;
        }

        for (idx, (middleware, name)) in self.stack.iter().enumerate().rev() {
            let depth = self.stack.len() - idx;
            entries.push(format!("{depth}) Name: '{name}', Function: {}", middleware.name()));
        }

        for entry in entries {
            writeln!(f, "< {entry}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for HandlerStack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HandlerStack")
            .field("handler", &self.handler)
            .field("stack", &self.stack)
            .finish()
    }
}
