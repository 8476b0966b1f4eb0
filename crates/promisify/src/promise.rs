use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Map};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::PromiseError;

/// Fulfillment value of a wrapped call, shaped by how many values the callback produced.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    None,
    Single(Value),
    Multiple(Vec<Value>),
}

impl Resolution {
    pub fn from_values(mut values: Vec<Value>) -> Self {
        match values.len() {
            0 => Resolution::None,
            1 => values.pop().map_or(Resolution::None, Resolution::Single),
            _ => Resolution::Multiple(values),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Resolution::None)
    }

    pub fn into_value(self) -> Value {
        match self {
            Resolution::None => Value::Null,
            Resolution::Single(value) => value,
            Resolution::Multiple(values) => Value::Array(values),
        }
    }
}

impl From<Resolution> for Value {
    fn from(resolution: Resolution) -> Self {
        resolution.into_value()
    }
}

pub type Settlement = anyhow::Result<Resolution>;
pub type Resolve = Box<dyn FnOnce(Resolution) + Send>;
pub type Reject = Box<dyn FnOnce(anyhow::Error) + Send>;

/// Runs synchronously inside [`PromiseConstructor::construct`].
pub type Executor<'a> = Box<dyn FnOnce(Resolve, Reject) + 'a>;

/// A promise implementation. Every wrapper produced by one adaptation constructs its
/// promises through the same constructor.
pub trait PromiseConstructor: Send + Sync {
    fn construct(&self, executor: Executor<'_>) -> Promise;
}

pub fn default_constructor() -> Arc<dyn PromiseConstructor> {
    Arc::new(DefaultPromise)
}

pub struct Promise {
    inner: BoxFuture<'static, Settlement>,
}

impl Promise {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Settlement> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }

    pub fn then<T, F>(self, on_settled: F) -> Map<Self, F>
    where
        F: FnOnce(Settlement) -> T,
    {
        FutureExt::map(self, on_settled)
    }
}

impl Future for Promise {
    type Output = Settlement;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

type Deliver = Box<dyn FnOnce(Settlement) + Send>;

/// Settle-once slot shared by the resolve and reject handles of one promise.
#[derive(Clone)]
pub struct Settler {
    slot: Arc<Mutex<Option<Deliver>>>,
}

impl Settler {
    pub fn new<F>(deliver: F) -> Self
    where
        F: FnOnce(Settlement) + Send + 'static,
    {
        let deliver: Deliver = Box::new(deliver);
        Self {
            slot: Arc::new(Mutex::new(Some(deliver))),
        }
    }

    /// Returns false when the promise had already settled; the settlement is dropped.
    pub fn settle(&self, settlement: Settlement) -> bool {
        let deliver = self.slot.lock().take();
        match deliver {
            Some(deliver) => {
                deliver(settlement);
                true
            }
            None => false,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.slot.lock().is_none()
    }

    pub fn resolver(&self) -> Resolve {
        let settler = self.clone();
        Box::new(move |resolution| {
            settler.settle(Ok(resolution));
        })
    }

    pub fn rejecter(&self) -> Reject {
        let settler = self.clone();
        Box::new(move |error| {
            settler.settle(Err(error));
        })
    }
}

impl fmt::Debug for Settler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settler")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Hands the executor its settle handles and turns a panic into a rejection.
pub fn run_executor(executor: Executor<'_>, settler: &Settler) {
    let resolve = settler.resolver();
    let reject = settler.rejecter();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || executor(resolve, reject))) {
        let message = panic_message(payload.as_ref());
        settler.settle(Err(PromiseError::Panicked(message).into()));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Promise backed by a `futures` oneshot channel. Used when no override is supplied.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultPromise;

impl PromiseConstructor for DefaultPromise {
    fn construct(&self, executor: Executor<'_>) -> Promise {
        let (tx, rx) = oneshot::channel();
        let settler = Settler::new(move |settlement| {
            let _ = tx.send(settlement);
        });
        run_executor(executor, &settler);
        Promise::new(async move {
            rx.await
                .unwrap_or_else(|_| Err(PromiseError::Abandoned.into()))
        })
    }
}

/// Promise backed by a `tokio` oneshot channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioPromise;

impl PromiseConstructor for TokioPromise {
    fn construct(&self, executor: Executor<'_>) -> Promise {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let settler = Settler::new(move |settlement| {
            let _ = tx.send(settlement);
        });
        run_executor(executor, &settler);
        Promise::new(async move {
            rx.await
                .unwrap_or_else(|_| Err(PromiseError::Abandoned.into()))
        })
    }
}
