use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use promisify::{
    Callback, DefaultPromise, Executor, Method, Object, Promise, PromiseConstructor, Prototype,
};
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("fixture failure: {0}")]
pub struct FixtureError(pub String);

#[derive(Debug)]
pub struct FixtureState {
    pub label: String,
}

pub type Fixture = Object<FixtureState>;

/// Runs `complete` on a later tick of the current tokio runtime.
pub fn defer<F>(complete: F)
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        complete();
    });
}

fn deferred_ok(callback: Callback, values: Vec<Value>) {
    defer(move || callback.ok(values));
}

pub fn parent_prototype() -> Arc<Prototype<FixtureState>> {
    Arc::new(Prototype::new().with_method(
        "parentMethod",
        Method::callback(|this: &Fixture, _, callback| {
            let spongebob = this.get("spongebob").cloned().unwrap_or(Value::Null);
            deferred_ok(callback, vec![spongebob]);
        }),
    ))
}

pub fn fixture_prototype() -> Arc<Prototype<FixtureState>> {
    Arc::new(
        Prototype::extending(parent_prototype())
            .with_data("spongebob", json!("squarepants"))
            .with_method("methodSync", Method::sync(|_: &Fixture, _| json!("unicorn")))
            .with_method(
                "method1",
                Method::callback(|_: &Fixture, _, callback| {
                    deferred_ok(callback, vec![json!("unicorn")])
                }),
            )
            .with_method(
                "method2",
                Method::callback(|_: &Fixture, args, callback| {
                    let x = args.into_iter().next().unwrap_or(Value::Null);
                    deferred_ok(callback, vec![x]);
                }),
            )
            .with_method(
                "method3",
                Method::callback(|_: &Fixture, _, callback| deferred_ok(callback, vec![])),
            )
            .with_method(
                "method4",
                Method::callback(|this: &Fixture, _, callback| {
                    let this = this.clone();
                    defer(move || {
                        let _ = this.call_with_callback("method1", vec![], callback);
                    });
                }),
            )
            .with_method(
                "method5",
                Method::callback(|this: &Fixture, _, callback| {
                    let this = this.clone();
                    defer(move || {
                        let spongebob = this.get("spongebob").cloned().unwrap_or(Value::Null);
                        callback.ok(vec![spongebob]);
                    });
                }),
            )
            .with_method(
                "pair",
                Method::callback(|_: &Fixture, _, callback| {
                    deferred_ok(callback, vec![json!("a"), json!("b")])
                }),
            )
            .with_method(
                "explode",
                Method::callback(|_: &Fixture, args, callback| {
                    let reason = args
                        .first()
                        .and_then(Value::as_str)
                        .unwrap_or("boom")
                        .to_string();
                    defer(move || callback.fail(FixtureError(reason)));
                }),
            )
            .with_method(
                "label",
                Method::callback(|this: &Fixture, _, callback| {
                    deferred_ok(callback, vec![json!(this.state().label)])
                }),
            ),
    )
}

pub fn fixture() -> Fixture {
    Object::with_prototype(
        FixtureState {
            label: "fixture".to_string(),
        },
        fixture_prototype(),
    )
}

/// Delegates to [`DefaultPromise`] and counts constructions.
#[derive(Debug, Default)]
pub struct CountingPromise {
    constructed: AtomicUsize,
}

impl CountingPromise {
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }
}

impl PromiseConstructor for CountingPromise {
    fn construct(&self, executor: Executor<'_>) -> Promise {
        self.constructed.fetch_add(1, Ordering::SeqCst);
        DefaultPromise.construct(executor)
    }
}
