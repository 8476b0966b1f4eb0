use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::AdaptError;
use crate::object::{Args, Callback, Member, Members, Method, Object, Property};
use crate::policy::{AdaptArg, AdaptOptions};
use crate::promise::{Promise, PromiseConstructor, Reject, Resolution, Resolve};

/// Promise-returning replacement for a callback-style method.
pub struct Wrapped<S> {
    original: Method<S>,
    promises: Arc<dyn PromiseConstructor>,
}

impl<S> Wrapped<S> {
    pub fn original(&self) -> &Method<S> {
        &self.original
    }

    /// Runs the original method against `this` with a trailing callback that settles the
    /// returned promise. Settlement timing is entirely up to the original method.
    pub fn call(&self, this: &Object<S>, args: Args) -> Promise {
        let original = &self.original;
        self.promises.construct(Box::new(move |resolve: Resolve, reject: Reject| {
            let callback = Callback::new(move |error, values| match error {
                Some(error) => reject(error),
                None => resolve(Resolution::from_values(values)),
            });
            original.call(this, args, Some(callback));
        }))
    }
}

impl<S> Clone for Wrapped<S> {
    fn clone(&self) -> Self {
        Self {
            original: self.original.clone(),
            promises: Arc::clone(&self.promises),
        }
    }
}

impl<S> fmt::Debug for Wrapped<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapped").finish_non_exhaustive()
    }
}

pub fn wrap<S>(method: Method<S>, promises: Arc<dyn PromiseConstructor>) -> Wrapped<S> {
    Wrapped {
        original: method,
        promises,
    }
}

/// Adapts `target` with the default policy and promise implementation.
pub fn adapt<S>(target: &Object<S>) -> Result<Object<S>, AdaptError> {
    adapt_with(target, AdaptOptions::default())
}

/// Returns a new object sharing the target's state and prototype link, with every member
/// of the chain installed as an own property and eligible methods wrapped. Own enumerable
/// keys are the same as the target's.
pub fn adapt_with<S>(
    target: &Object<S>,
    arg: impl Into<AdaptArg>,
) -> Result<Object<S>, AdaptError> {
    let options = arg.into().into_options();
    let own = transform(target, &options)?;
    debug!(
        members = own.len(),
        wrapped = count_wrapped(&own),
        in_place = false,
        "adapted object"
    );
    Ok(Object {
        state: Arc::clone(&target.state),
        own,
        proto: target.proto.clone(),
    })
}

/// Same selection as [`adapt_with`], installed on `target` itself. Prototype tables are
/// never modified.
pub fn adapt_in_place<S>(
    target: &mut Object<S>,
    arg: impl Into<AdaptArg>,
) -> Result<(), AdaptError> {
    let options = arg.into().into_options();
    let own = transform(target, &options)?;
    debug!(
        members = own.len(),
        wrapped = count_wrapped(&own),
        in_place = true,
        "adapted object"
    );
    target.own = own;
    Ok(())
}

fn transform<S>(target: &Object<S>, options: &AdaptOptions) -> Result<Members<S>, AdaptError> {
    if target.proto.is_none() {
        return Err(AdaptError::InvalidArgument("target has no prototype chain"));
    }
    let promises = options.promise_constructor();
    let mut own: Members<S> = IndexMap::new();
    for (depth, scope) in target.scopes().enumerate() {
        for (name, property) in scope {
            if own.contains_key(name) {
                continue;
            }
            let mut selected = select(name, property, options, &promises);
            // Inherited members must not show up as new own enumerable keys.
            selected.enumerable &= depth == 0;
            own.insert(name.clone(), selected);
        }
    }
    Ok(own)
}

fn select<S>(
    name: &str,
    property: &Property<S>,
    options: &AdaptOptions,
    promises: &Arc<dyn PromiseConstructor>,
) -> Property<S> {
    let member = match &property.member {
        Member::Method(method) if options.is_eligible(name) => {
            trace!(member = name, "wrapping method");
            Member::Wrapped(wrap(method.clone(), Arc::clone(promises)))
        }
        Member::Method(_) => {
            trace!(member = name, "method left unwrapped");
            property.member.clone()
        }
        Member::Wrapped(_) => {
            trace!(member = name, "method already wrapped");
            property.member.clone()
        }
        Member::Data(_) => property.member.clone(),
    };
    Property {
        member,
        enumerable: property.enumerable,
    }
}

fn count_wrapped<S>(members: &Members<S>) -> usize {
    members
        .values()
        .filter(|property| matches!(property.member, Member::Wrapped(_)))
        .count()
}
