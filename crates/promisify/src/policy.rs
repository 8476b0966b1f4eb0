use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::promise::{PromiseConstructor, default_constructor};

/// Methods whose names end with this suffix are left alone unless explicitly included.
pub const SYNC_SUFFIX: &str = "Sync";
/// Excluded by default.
pub const CONSTRUCTOR: &str = "constructor";

/// Selection policy for an adaptation. Unknown keys are ignored when deserializing.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AdaptOptions {
    pub include: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
    #[serde(skip)]
    pub promise: Option<Arc<dyn PromiseConstructor>>,
}

impl AdaptOptions {
    pub fn with_include<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.include = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.exclude = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_promise(mut self, promise: Arc<dyn PromiseConstructor>) -> Self {
        self.promise = Some(promise);
        self
    }

    /// A non-empty `include` decides alone; otherwise `exclude` and the `Sync` suffix both
    /// apply.
    pub fn is_eligible(&self, name: &str) -> bool {
        if !self.include.is_empty() {
            return self.include.contains(name);
        }
        !self.exclude.contains(name) && !name.ends_with(SYNC_SUFFIX)
    }

    pub fn promise_constructor(&self) -> Arc<dyn PromiseConstructor> {
        self.promise.clone().unwrap_or_else(default_constructor)
    }
}

impl Default for AdaptOptions {
    fn default() -> Self {
        Self {
            include: BTreeSet::new(),
            exclude: BTreeSet::from([CONSTRUCTOR.to_string()]),
            promise: None,
        }
    }
}

impl fmt::Debug for AdaptOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptOptions")
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field("custom_promise", &self.promise.is_some())
            .finish()
    }
}

/// Second argument of an adaptation: either a promise implementation or full options.
pub enum AdaptArg {
    Promise(Arc<dyn PromiseConstructor>),
    Options(AdaptOptions),
}

impl AdaptArg {
    pub fn promise<P>(promise: P) -> Self
    where
        P: PromiseConstructor + 'static,
    {
        AdaptArg::Promise(Arc::new(promise))
    }

    pub fn into_options(self) -> AdaptOptions {
        match self {
            AdaptArg::Promise(promise) => AdaptOptions::default().with_promise(promise),
            AdaptArg::Options(options) => options,
        }
    }
}

impl From<AdaptOptions> for AdaptArg {
    fn from(options: AdaptOptions) -> Self {
        AdaptArg::Options(options)
    }
}

impl From<Arc<dyn PromiseConstructor>> for AdaptArg {
    fn from(promise: Arc<dyn PromiseConstructor>) -> Self {
        AdaptArg::Promise(promise)
    }
}

impl From<crate::promise::DefaultPromise> for AdaptArg {
    fn from(promise: crate::promise::DefaultPromise) -> Self {
        AdaptArg::promise(promise)
    }
}

impl From<crate::promise::TokioPromise> for AdaptArg {
    fn from(promise: crate::promise::TokioPromise) -> Self {
        AdaptArg::promise(promise)
    }
}
