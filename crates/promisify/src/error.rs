use thiserror::Error;

/// Raised synchronously by the adaptation call itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdaptError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemberError {
    #[error("member `{0}` not found")]
    NotFound(String),
    #[error("member `{0}` is not a function")]
    NotCallable(String),
    #[error("member `{0}` does not return a promise")]
    NotWrapped(String),
    #[error("member `{0}` returns a promise; use invoke or pass a callback")]
    Deferred(String),
}

/// Rejection reasons originated by the bundled promise implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromiseError {
    #[error("operation dropped its completion handles without settling")]
    Abandoned,
    #[error("executor panicked: {0}")]
    Panicked(String),
}
