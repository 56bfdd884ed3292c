//! Promises
//!
//! A [`Promise`] is a single-assignment, shareable handle to a value that
//! will be available later. Every handler in a stack returns one.
//!
//! A promise is driven lazily: the future, adopted promise or wait function
//! behind it only makes progress while somebody awaits, [`wait`]s or polls a
//! promise derived from it. Once settled, a promise never changes again and
//! every clone observes the same value or error.
//!
//! ```rust
//! use reqstack::promise::{Promise, PromiseState};
//!
//! let p = Promise::<u32>::new();
//! let doubled = p.map(|v| v * 2);
//! p.resolve(21).unwrap();
//!
//! assert_eq!(doubled.wait().unwrap(), 42);
//! assert_eq!(p.state(), PromiseState::Fulfilled);
//! ```
//!
//! [`wait`]: Promise::wait

use std::{
    cell::Cell,
    fmt,
    future::Future,
    mem,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, Weak},
    task::{Context, Poll, Wake, Waker},
};

use futures_util::future::{BoxFuture, FutureExt};
use once_cell::sync::OnceCell;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

use crate::error::{Error, Result};

/// The state of a [`Promise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with an error.
    Rejected,
}

/// What a continuation passed to [`Promise::then`] produces.
pub enum Next<T> {
    /// Fulfill the derived promise with this value.
    Value(T),
    /// Adopt the eventual state of this promise.
    Promise(Promise<T>),
}

type WaitFn<T> = Box<dyn FnOnce(&Promise<T>) + Send>;

/// A single-assignment asynchronous value.
///
/// `Promise<T>` is cheap to clone; all clones share one state. It implements
/// `Future<Output = Result<T>>`, so async code simply `.await`s it, while
/// synchronous code calls [`wait`](Promise::wait).
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
}

enum State<T> {
    Pending(Pending<T>),
    Fulfilled(T),
    Rejected(Error),
}

struct Pending<T> {
    task: Option<BoxFuture<'static, Result<T>>>,
    wait_fn: Option<WaitFn<T>>,
    wakers: Vec<Waker>,
    // the task or wait function is checked out by a poller
    running: bool,
    // settled only by its task; `resolve`/`reject` are refused
    locked: bool,
}

impl<T> Default for Pending<T> {
    fn default() -> Self {
        Pending {
            task: None,
            wait_fn: None,
            wakers: Vec::new(),
            running: false,
            locked: false,
        }
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    fn with_state(state: State<T>) -> Self {
        Promise {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
            }),
        }
    }

    /// Create a pending promise that is settled by calling
    /// [`resolve`](Promise::resolve) or [`reject`](Promise::reject).
    pub fn new() -> Self {
        Promise::with_state(State::Pending(Pending::default()))
    }

    /// Create a pending promise with a wait function.
    ///
    /// The function is invoked at most once, the first time the promise is
    /// driven, and must settle the promise it is given. If it returns without
    /// doing so the promise is rejected as unresolvable.
    pub fn with_wait_fn<F>(wait_fn: F) -> Self
    where
        F: FnOnce(&Promise<T>) + Send + 'static,
    {
        Promise::with_state(State::Pending(Pending {
            wait_fn: Some(Box::new(wait_fn)),
            ..Pending::default()
        }))
    }

    /// Create a promise settled by the output of `future`.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Promise::with_state(State::Pending(Pending {
            task: Some(future.boxed()),
            locked: true,
            ..Pending::default()
        }))
    }

    /// Create an already fulfilled promise.
    pub fn fulfilled(value: T) -> Self {
        Promise::with_state(State::Fulfilled(value))
    }

    /// Create an already rejected promise.
    pub fn rejected(error: Error) -> Self {
        Promise::with_state(State::Rejected(error))
    }

    /// Create an already settled promise from a `Result`.
    pub fn ready(result: Result<T>) -> Self {
        match result {
            Ok(value) => Promise::fulfilled(value),
            Err(error) => Promise::rejected(error),
        }
    }

    /// Returns the current state without driving the promise.
    pub fn state(&self) -> PromiseState {
        match &*self.lock() {
            State::Pending(_) => PromiseState::Pending,
            State::Fulfilled(_) => PromiseState::Fulfilled,
            State::Rejected(_) => PromiseState::Rejected,
        }
    }

    /// Returns true when `self` and `other` share the same state.
    pub fn ptr_eq(&self, other: &Promise<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Fulfill the promise.
    ///
    /// Settling a promise that is already settled, or that adopted another
    /// promise, is a logic error; the first settlement stays intact.
    pub fn resolve(&self, value: T) -> Result<()> {
        self.settle(Ok(value))
    }

    /// Reject the promise. See [`resolve`](Promise::resolve).
    pub fn reject(&self, error: Error) -> Result<()> {
        self.settle(Err(error))
    }

    /// Resolve the promise with another promise: `self` adopts the eventual
    /// state of `other`.
    pub fn resolve_with(&self, other: Promise<T>) -> Result<()> {
        if self.ptr_eq(&other) {
            return Err(Error::invalid_argument(
                "cannot resolve a promise with itself",
            ));
        }

        let wakers = {
            let mut state = self.lock();
            match &mut *state {
                State::Pending(pending) if !pending.locked => {
                    pending.task = Some(other.boxed());
                    pending.wait_fn = None;
                    pending.locked = true;
                    mem::take(&mut pending.wakers)
                }
                State::Pending(_) => return Err(locked_error()),
                _ => return Err(settled_error()),
            }
        };

        wakers.into_iter().for_each(Waker::wake);
        Ok(())
    }

    fn settle(&self, result: Result<T>) -> Result<()> {
        let wakers = {
            let mut state = self.lock();
            match &mut *state {
                State::Pending(pending) if !pending.locked => {
                    let wakers = mem::take(&mut pending.wakers);
                    *state = State::from(result);
                    wakers
                }
                State::Pending(_) => return Err(locked_error()),
                _ => return Err(settled_error()),
            }
        };

        wakers.into_iter().for_each(Waker::wake);
        Ok(())
    }

    // Settles from the driver side. A settlement that raced us wins.
    fn complete(&self, result: Result<T>) {
        let wakers = {
            let mut state = self.lock();
            match &mut *state {
                State::Pending(pending) => {
                    let wakers = mem::take(&mut pending.wakers);
                    *state = State::from(result);
                    wakers
                }
                _ => return,
            }
        };

        wakers.into_iter().for_each(Waker::wake);
    }

    /// Chain continuations onto this promise.
    ///
    /// Exactly one of the callbacks runs, once this promise settles and the
    /// returned promise is driven. Returning `Err` rejects the derived
    /// promise; returning [`Next::Promise`] makes it adopt that promise.
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<Next<U>> + Send + 'static,
        R: FnOnce(Error) -> Result<Next<U>> + Send + 'static,
    {
        let this = self.clone();
        Promise::from_future(async move {
            let next = match this.await {
                Ok(value) => on_fulfilled(value)?,
                Err(error) => on_rejected(error)?,
            };
            match next {
                Next::Value(value) => Ok(value),
                Next::Promise(promise) => promise.await,
            }
        })
    }

    /// Transform the fulfillment value; rejections pass through.
    pub fn map<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |value| Ok(Next::Value(f(value))), Err)
    }

    /// Chain a fallible continuation on fulfillment; rejections pass through.
    pub fn and_then<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<Next<U>> + Send + 'static,
    {
        self.then(f, Err)
    }

    /// Recover from a rejection; fulfillment values pass through.
    pub fn otherwise<F>(&self, f: F) -> Promise<T>
    where
        F: FnOnce(Error) -> Result<Next<T>> + Send + 'static,
    {
        self.then(|value| Ok(Next::Value(value)), f)
    }

    /// Block the current thread until the promise settles and return its
    /// value or rejection.
    ///
    /// Waiting on a pending promise that nothing can settle (no future, no
    /// adopted promise, no wait function) rejects it as unresolvable. The
    /// same holds for every promise reached while waiting: a chain built on
    /// a deferred promise nobody resolved rejects instead of blocking.
    ///
    /// A rejection is returned as the `Err` value; nothing panics.
    ///
    /// Inside a multi-thread tokio runtime the ambient runtime drives the
    /// promise through `block_in_place`; outside any runtime a shared
    /// background runtime is used. A current-thread runtime cannot block, so
    /// waiting there is a logic error: `.await` the promise instead.
    pub fn wait(&self) -> Result<T> {
        if let Some(result) = self.settled_result() {
            return result;
        }

        if !self.has_driver() {
            self.complete(Err(unresolvable_error()));
            return self.settled_result().unwrap_or_else(|| Err(settled_error()));
        }

        let _scope = WaitScope::enter();
        block_on(self.clone())?
    }

    /// Drive the promise to settlement like [`wait`](Promise::wait) but
    /// report only the final state. Use `wait` to get the rejection.
    pub fn wait_settled(&self) -> PromiseState {
        let _ = self.wait();
        self.state()
    }

    fn settled_result(&self) -> Option<Result<T>> {
        match &*self.lock() {
            State::Pending(_) => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(error) => Some(Err(error.clone())),
        }
    }

    fn has_driver(&self) -> bool {
        match &*self.lock() {
            State::Pending(pending) => {
                pending.running || pending.task.is_some() || pending.wait_fn.is_some()
            }
            _ => true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // A panicking continuation never leaves the state half-written.
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> Default for Promise<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Promise::new()
    }
}

impl<T> From<Result<T>> for State<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => State::Fulfilled(value),
            Err(error) => State::Rejected(error),
        }
    }
}

enum Step<T> {
    Done(Result<T>),
    Poll(BoxFuture<'static, Result<T>>),
    Wait(WaitFn<T>),
    Park,
    Unresolvable,
}

impl<T> Future for Promise<T>
where
    T: Clone + Send + 'static,
{
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            let step = {
                let mut state = this.lock();
                match &mut *state {
                    State::Fulfilled(value) => Step::Done(Ok(value.clone())),
                    State::Rejected(error) => Step::Done(Err(error.clone())),
                    State::Pending(pending) => {
                        if !pending.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                            pending.wakers.push(cx.waker().clone());
                        }

                        if let Some(task) = pending.task.take() {
                            pending.running = true;
                            Step::Poll(task)
                        } else if pending.running {
                            Step::Park
                        } else if let Some(wait_fn) = pending.wait_fn.take() {
                            pending.running = true;
                            Step::Wait(wait_fn)
                        } else if WaitScope::active() {
                            Step::Unresolvable
                        } else {
                            Step::Park
                        }
                    }
                }
            };

            match step {
                Step::Done(result) => return Poll::Ready(result),
                Step::Park => return Poll::Pending,
                Step::Unresolvable => this.complete(Err(unresolvable_error())),
                Step::Wait(wait_fn) => {
                    wait_fn(this);

                    let mut state = this.lock();
                    if let State::Pending(pending) = &mut *state {
                        pending.running = false;
                        if pending.task.is_none() {
                            drop(state);
                            this.complete(Err(Error::unresolved(
                                "invoking the wait callback did not resolve the promise",
                            )));
                        }
                    }
                }
                Step::Poll(mut task) => {
                    let waker = Waker::from(Arc::new(WakeAll {
                        shared: Arc::downgrade(&this.shared),
                    }));
                    let mut task_cx = Context::from_waker(&waker);

                    match task.as_mut().poll(&mut task_cx) {
                        Poll::Ready(result) => this.complete(result),
                        Poll::Pending => {
                            let mut state = this.lock();
                            if let State::Pending(pending) = &mut *state {
                                pending.running = false;
                                pending.task = Some(task);
                                return Poll::Pending;
                            }
                        }
                    }
                }
            }
        }
    }
}

// Wakes every waiter of a promise when its driver makes progress.
struct WakeAll<T> {
    shared: Weak<Shared<T>>,
}

impl<T> Wake for WakeAll<T>
where
    T: Send + 'static,
{
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let wakers = {
            let mut state = shared
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match &mut *state {
                State::Pending(pending) => mem::take(&mut pending.wakers),
                _ => return,
            }
        };

        wakers.into_iter().for_each(Waker::wake);
    }
}

impl<T> fmt::Debug for Promise<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut builder = f.debug_struct("Promise");
        match &*state {
            State::Pending(_) => builder.field("state", &PromiseState::Pending),
            State::Fulfilled(value) => builder
                .field("state", &PromiseState::Fulfilled)
                .field("value", value),
            State::Rejected(error) => builder
                .field("state", &PromiseState::Rejected)
                .field("error", error),
        };
        builder.finish()
    }
}

impl<T> fmt::Debug for Next<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Next::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Next::Promise(promise) => f.debug_tuple("Promise").field(promise).finish(),
        }
    }
}

thread_local! {
    static WAITING: Cell<bool> = Cell::new(false);
}

// Marks the current thread as blocked in `wait`. Everything polled here
// belongs to the waited chain, so a pending promise without a driver can
// never settle.
struct WaitScope {
    previous: bool,
}

impl WaitScope {
    fn enter() -> WaitScope {
        WaitScope {
            previous: WAITING.with(|w| w.replace(true)),
        }
    }

    fn active() -> bool {
        WAITING.with(Cell::get)
    }
}

impl Drop for WaitScope {
    fn drop(&mut self) {
        WAITING.with(|w| w.set(self.previous));
    }
}

fn unresolvable_error() -> Error {
    Error::unresolved("cannot wait on a promise that has no way to settle")
}

fn settled_error() -> Error {
    Error::logic("the promise is already settled")
}

fn locked_error() -> Error {
    Error::logic("the promise is already being resolved by another promise")
}

fn block_on<F: Future>(future: F) -> Result<F::Output> {
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => Err(Error::logic(
                "cannot block on a promise inside a current-thread runtime, await it instead",
            )),
            _ => Ok(tokio::task::block_in_place(|| handle.block_on(future))),
        },
        Err(_) => Ok(wait_runtime()?.block_on(future)),
    }
}

fn wait_runtime() -> Result<&'static Runtime> {
    static RUNTIME: OnceCell<Runtime> = OnceCell::new();

    RUNTIME.get_or_try_init(|| {
        Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("reqstack-wait")
            .enable_time()
            .build()
            .map_err(Error::builder)
    })
}
