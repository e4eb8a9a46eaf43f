use thiserror::Error;

/// Errors that can occur while converting a rule into an action.
///
/// Rule denials are *not* errors at this level: a rule that calls back with an
/// error is translated into `api.access.deny(..)` and the conversion succeeds.
#[derive(Debug, Error)]
pub enum Error {
    /// The host event does not carry a record or field the projection needs.
    #[error("event does not match the expected shape: {0}")]
    Projection(#[from] serde_json::Error),

    /// A host API call failed while replaying changes.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The rule dropped its completion callback without invoking it.
    #[error("rule dropped its callback without completing")]
    CallbackDropped,
}

/// Failure reported by a host API method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("api.{method} failed: {message}")]
pub struct ApiError {
    method: &'static str,
    message: String,
}

impl ApiError {
    /// Creates an error for the named API method, e.g. `"idToken.setCustomClaim"`.
    pub fn new(method: &'static str, message: impl Into<String>) -> Self {
        Self {
            method,
            message: message.into(),
        }
    }

    /// Returns the API method that failed.
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Returns the host-supplied failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
