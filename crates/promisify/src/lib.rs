//! Turns objects whose methods complete through a trailing `(error, values)` callback into
//! objects whose methods return promises.

pub mod adapter;
pub mod error;
pub mod object;
pub mod policy;
pub mod promise;

pub use adapter::{Wrapped, adapt, adapt_in_place, adapt_with, wrap};
pub use error::{AdaptError, MemberError, PromiseError};
pub use object::{Args, Callback, Member, Members, Method, Object, Outcome, Property, Prototype};
pub use policy::{AdaptArg, AdaptOptions, CONSTRUCTOR, SYNC_SUFFIX};
pub use promise::{
    DefaultPromise, Executor, Promise, PromiseConstructor, Reject, Resolution, Resolve,
    Settlement, Settler, TokioPromise, default_constructor, run_executor,
};
