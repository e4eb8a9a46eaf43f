use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// The denial error legacy rules construct and hand to their callback.
///
/// Carries only the human-readable message, which becomes the reason passed
/// to `api.access.deny`.
///
/// # Examples
///
/// ```
/// use rule_to_action::UnauthorizedError;
///
/// let err = UnauthorizedError::new("This app is unavailable");
/// assert_eq!(err.to_string(), "This app is unavailable");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UnauthorizedError {
    message: String,
}

impl UnauthorizedError {
    /// Creates a denial with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the denial message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Any error a rule passes as the first argument of its callback.
///
/// Rules usually raise [`UnauthorizedError`], but every error type denies
/// access with its display string as the reason.
pub struct RuleError {
    inner: Box<dyn StdError + Send + Sync>,
}

impl RuleError {
    /// Returns the message passed to `api.access.deny`.
    pub fn message(&self) -> String {
        self.inner.to_string()
    }

    /// Returns the wrapped error if it is of type `E`.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Returns true if the rule raised an [`UnauthorizedError`].
    pub fn is_unauthorized(&self) -> bool {
        self.downcast_ref::<UnauthorizedError>().is_some()
    }
}

impl<E: StdError + Send + Sync + 'static> From<E> for RuleError {
    fn from(err: E) -> Self {
        Self {
            inner: Box::new(err),
        }
    }
}

impl fmt::Debug for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RuleError").field(&self.inner).finish()
    }
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}
