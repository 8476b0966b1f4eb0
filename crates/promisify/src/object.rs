use std::collections::HashSet;
use std::fmt;
use std::iter;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::adapter::Wrapped;
use crate::error::MemberError;
use crate::promise::Promise;

pub type Args = Vec<Value>;
pub type Members<S> = IndexMap<String, Property<S>>;

type CallbackFn = Box<dyn FnOnce(Option<anyhow::Error>, Vec<Value>) + Send>;
type MethodFn<S> = dyn Fn(&Object<S>, Args, Option<Callback>) -> Value + Send + Sync;

/// Completion signal of a callback-style method: `Some(error)` fails the operation,
/// otherwise the values are its results.
pub struct Callback(CallbackFn);

impl Callback {
    pub fn new<F>(complete: F) -> Self
    where
        F: FnOnce(Option<anyhow::Error>, Vec<Value>) + Send + 'static,
    {
        Self(Box::new(complete))
    }

    /// Discards the values. An error is only logged.
    pub fn noop() -> Self {
        Self::new(|error, _| {
            if let Some(error) = error {
                debug!(error = %error, "callback-style method failed with no callback attached");
            }
        })
    }

    pub fn complete(self, error: Option<anyhow::Error>, values: Vec<Value>) {
        (self.0)(error, values)
    }

    pub fn ok(self, values: Vec<Value>) {
        self.complete(None, values)
    }

    pub fn fail(self, error: impl Into<anyhow::Error>) {
        self.complete(Some(error.into()), Vec::new())
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// A function member. The first argument is the receiver the method runs against.
pub struct Method<S>(Arc<MethodFn<S>>);

impl<S> Method<S> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Object<S>, Args, Option<Callback>) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// A plain synchronous method; any callback passed to it is dropped.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Object<S>, Args) -> Value + Send + Sync + 'static,
    {
        Self::new(move |this, args, _| f(this, args))
    }

    /// A callback-style method. Invoked without a callback, it completes into
    /// [`Callback::noop`].
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&Object<S>, Args, Callback) + Send + Sync + 'static,
    {
        Self::new(move |this, args, callback| {
            f(this, args, callback.unwrap_or_else(Callback::noop));
            Value::Null
        })
    }

    pub fn call(&self, this: &Object<S>, args: Args, callback: Option<Callback>) -> Value {
        (self.0)(this, args, callback)
    }

    pub fn ptr_eq(&self, other: &Method<S>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<S> Clone for Method<S> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<S> fmt::Debug for Method<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Method(..)")
    }
}

pub enum Member<S> {
    Data(Value),
    Method(Method<S>),
    Wrapped(Wrapped<S>),
}

impl<S> Member<S> {
    pub fn is_function(&self) -> bool {
        !matches!(self, Member::Data(_))
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Member::Data(value) => Some(value),
            _ => None,
        }
    }
}

impl<S> Clone for Member<S> {
    fn clone(&self) -> Self {
        match self {
            Member::Data(value) => Member::Data(value.clone()),
            Member::Method(method) => Member::Method(method.clone()),
            Member::Wrapped(wrapped) => Member::Wrapped(wrapped.clone()),
        }
    }
}

impl<S> fmt::Debug for Member<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Member::Method(_) => f.write_str("Method(..)"),
            Member::Wrapped(_) => f.write_str("Wrapped(..)"),
        }
    }
}

/// A member together with its descriptor.
pub struct Property<S> {
    pub member: Member<S>,
    pub enumerable: bool,
}

impl<S> Property<S> {
    pub fn data(value: Value) -> Self {
        Self {
            member: Member::Data(value),
            enumerable: true,
        }
    }

    pub fn method(method: Method<S>) -> Self {
        Self {
            member: Member::Method(method),
            enumerable: false,
        }
    }

    pub fn enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = enumerable;
        self
    }
}

impl<S> Clone for Property<S> {
    fn clone(&self) -> Self {
        Self {
            member: self.member.clone(),
            enumerable: self.enumerable,
        }
    }
}

impl<S> fmt::Debug for Property<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("member", &self.member)
            .field("enumerable", &self.enumerable)
            .finish()
    }
}

/// One method table of a chain. A table without a parent is a chain root.
pub struct Prototype<S> {
    own: Members<S>,
    parent: Option<Arc<Prototype<S>>>,
}

impl<S> Prototype<S> {
    pub fn new() -> Self {
        Self {
            own: IndexMap::new(),
            parent: None,
        }
    }

    pub fn extending(parent: Arc<Prototype<S>>) -> Self {
        Self {
            own: IndexMap::new(),
            parent: Some(parent),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, property: Property<S>) -> Self {
        self.own.insert(name.into(), property);
        self
    }

    pub fn with_data(self, name: impl Into<String>, value: Value) -> Self {
        self.with_property(name, Property::data(value))
    }

    pub fn with_method(self, name: impl Into<String>, method: Method<S>) -> Self {
        self.with_property(name, Property::method(method))
    }

    pub fn parent(&self) -> Option<&Arc<Prototype<S>>> {
        self.parent.as_ref()
    }

    pub fn own(&self, name: &str) -> Option<&Property<S>> {
        self.own.get(name)
    }

    pub fn keys(&self) -> Vec<&str> {
        enumerable_keys(&self.own)
    }

    pub fn own_names(&self) -> Vec<&str> {
        self.own.keys().map(String::as_str).collect()
    }
}

impl<S> Default for Prototype<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for Prototype<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prototype")
            .field("own", &self.own)
            .field("parent", &self.parent)
            .finish()
    }
}

/// Result of invoking a member through an object.
#[derive(Debug)]
pub enum Outcome {
    Returned(Value),
    Pending(Promise),
}

impl Outcome {
    pub fn is_promise(&self) -> bool {
        matches!(self, Outcome::Pending(_))
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Outcome::Returned(value) => Some(value),
            Outcome::Pending(_) => None,
        }
    }

    pub fn into_promise(self) -> Option<Promise> {
        match self {
            Outcome::Pending(promise) => Some(promise),
            Outcome::Returned(_) => None,
        }
    }
}

/// Shared state, own properties and an optional link to a prototype chain.
pub struct Object<S = ()> {
    pub(crate) state: Arc<S>,
    pub(crate) own: Members<S>,
    pub(crate) proto: Option<Arc<Prototype<S>>>,
}

impl<S> Object<S> {
    pub fn new(state: S) -> Self {
        Self::with_prototype(state, Arc::new(Prototype::new()))
    }

    pub fn with_prototype(state: S, proto: Arc<Prototype<S>>) -> Self {
        Self {
            state: Arc::new(state),
            own: IndexMap::new(),
            proto: Some(proto),
        }
    }

    pub fn without_prototype(state: S) -> Self {
        Self {
            state: Arc::new(state),
            own: IndexMap::new(),
            proto: None,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, property: Property<S>) -> Self {
        self.set(name, property);
        self
    }

    pub fn with_data(self, name: impl Into<String>, value: Value) -> Self {
        self.with_property(name, Property::data(value))
    }

    pub fn with_method(self, name: impl Into<String>, method: Method<S>) -> Self {
        self.with_property(name, Property::method(method))
    }

    pub fn set(&mut self, name: impl Into<String>, property: Property<S>) {
        self.own.insert(name.into(), property);
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn shares_state_with(&self, other: &Object<S>) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub fn prototype(&self) -> Option<&Arc<Prototype<S>>> {
        self.proto.as_ref()
    }

    /// Own properties first, then every table up the chain.
    pub fn scopes(&self) -> impl Iterator<Item = &Members<S>> {
        let chain = iter::successors(self.proto.as_deref(), |proto| proto.parent.as_deref());
        iter::once(&self.own).chain(chain.map(|proto| &proto.own))
    }

    pub fn own(&self, name: &str) -> Option<&Property<S>> {
        self.own.get(name)
    }

    pub fn lookup(&self, name: &str) -> Option<&Property<S>> {
        self.scopes().find_map(|scope| scope.get(name))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.lookup(name).and_then(|property| property.member.as_data())
    }

    pub fn keys(&self) -> Vec<&str> {
        enumerable_keys(&self.own)
    }

    pub fn own_names(&self) -> Vec<&str> {
        self.own.keys().map(String::as_str).collect()
    }

    /// Every distinct name reachable through the chain, closest first.
    pub fn member_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.scopes()
            .flat_map(|scope| scope.keys().map(String::as_str))
            .filter(|name| seen.insert(*name))
            .collect()
    }

    pub fn is_wrapped(&self, name: &str) -> bool {
        matches!(
            self.lookup(name).map(|property| &property.member),
            Some(Member::Wrapped(_))
        )
    }

    /// Invokes `name` with `self` as receiver. A wrapped member given an explicit callback
    /// runs its original method with that callback instead of producing a promise.
    pub fn apply(
        &self,
        name: &str,
        args: Args,
        callback: Option<Callback>,
    ) -> Result<Outcome, MemberError> {
        let property = self
            .lookup(name)
            .ok_or_else(|| MemberError::NotFound(name.to_string()))?;
        match &property.member {
            Member::Data(_) => Err(MemberError::NotCallable(name.to_string())),
            Member::Method(method) => Ok(Outcome::Returned(method.call(self, args, callback))),
            Member::Wrapped(wrapped) => match callback {
                Some(callback) => Ok(Outcome::Returned(wrapped.original().call(
                    self,
                    args,
                    Some(callback),
                ))),
                None => Ok(Outcome::Pending(wrapped.call(self, args))),
            },
        }
    }

    /// Plain synchronous call. A wrapped member is rejected before anything runs.
    pub fn call(&self, name: &str, args: Args) -> Result<Value, MemberError> {
        let property = self
            .lookup(name)
            .ok_or_else(|| MemberError::NotFound(name.to_string()))?;
        match &property.member {
            Member::Data(_) => Err(MemberError::NotCallable(name.to_string())),
            Member::Method(method) => Ok(method.call(self, args, None)),
            Member::Wrapped(_) => Err(MemberError::Deferred(name.to_string())),
        }
    }

    pub fn call_with_callback(
        &self,
        name: &str,
        args: Args,
        callback: Callback,
    ) -> Result<Value, MemberError> {
        self.apply(name, args, Some(callback))?
            .into_value()
            .ok_or_else(|| MemberError::Deferred(name.to_string()))
    }

    pub fn invoke(&self, name: &str, args: Args) -> Result<Promise, MemberError> {
        let property = self
            .lookup(name)
            .ok_or_else(|| MemberError::NotFound(name.to_string()))?;
        match &property.member {
            Member::Data(_) => Err(MemberError::NotCallable(name.to_string())),
            Member::Method(_) => Err(MemberError::NotWrapped(name.to_string())),
            Member::Wrapped(wrapped) => Ok(wrapped.call(self, args)),
        }
    }
}

impl<S> Clone for Object<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            own: self.own.clone(),
            proto: self.proto.clone(),
        }
    }
}

impl<S> fmt::Debug for Object<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("own", &self.own)
            .field("proto", &self.proto)
            .finish_non_exhaustive()
    }
}

fn enumerable_keys<S>(members: &Members<S>) -> Vec<&str> {
    members
        .iter()
        .filter(|(_, property)| property.enumerable)
        .map(|(name, _)| name.as_str())
        .collect()
}
