//! Middleware recording every transaction into a shared container.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    client::{handler::Handler, stack::Middleware},
    promise::Next,
    Error, Options, Request, Response,
};

/// One request sent through the [`history`] middleware and its outcome.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// The request as it reached the middleware.
    pub request: Request,
    /// The response, for fulfilled transfers.
    pub response: Option<Response>,
    /// The error, for rejected transfers.
    pub error: Option<Error>,
    /// The options the request was sent with.
    pub options: Options,
}

/// A cloneable, shared list of [`Transaction`]s.
#[derive(Debug, Clone, Default)]
pub struct History(Arc<Mutex<Vec<Transaction>>>);

impl History {
    /// An empty history.
    pub fn new() -> Self {
        History::default()
    }

    /// Number of recorded transactions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of the recorded transactions, oldest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock().clone()
    }

    /// Forget every recorded transaction.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn push(&self, transaction: Transaction) {
        self.lock().push(transaction);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Transaction>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Middleware appending a [`Transaction`] to `container` for every request,
/// successful or not. Rejections still propagate.
pub fn history(container: History) -> Middleware {
    Middleware::new(move |next: Handler| {
        let container = container.clone();
        Handler::new(move |request: Request, options: Options| {
            let fulfilled = {
                let container = container.clone();
                let request = request.clone();
                let options = options.clone();
                move |response: Response| -> crate::Result<Next<Response>> {
                    container.push(Transaction {
                        request,
                        response: Some(response.clone()),
                        error: None,
                        options,
                    });
                    Ok(Next::Value(response))
                }
            };
            let rejected = {
                let container = container.clone();
                let request = request.clone();
                let options = options.clone();
                move |error: Error| -> crate::Result<Next<Response>> {
                    container.push(Transaction {
                        request,
                        response: error.response().cloned(),
                        error: Some(error.clone()),
                        options,
                    });
                    Err(error)
                }
            };

            next.call(request, options).then(fulfilled, rejected)
        })
        .named("HistoryMiddleware")
    })
    .named("history")
}
