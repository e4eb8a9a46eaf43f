//! Ambient setup performed before every rule runs.

use crate::secrets::{self, Secrets};

/// Resets the ambient state legacy rules rely on.
///
/// Clears the `configuration` bag of the current scope. The denial type,
/// [`UnauthorizedError`](crate::UnauthorizedError), needs no registration:
/// rule bodies reach it through [`prelude`](crate::prelude) by the same name
/// they always used.
///
/// Returns `false` when called outside a configuration scope.
pub fn init() -> bool {
    secrets::publish(Secrets::new())
}
