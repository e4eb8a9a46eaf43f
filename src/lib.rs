//! Run legacy callback-style login rules as post-login actions.
//!
//! A rule is a `(user, context, callback)` function written against the rules
//! runtime: it reads and mutates a flat `context` and finishes by calling its
//! callback. An action instead receives a read-only [`Event`] and an imperative
//! [`Api`](api::Api). This crate bridges the two:
//!
//! 1. [`map_event_to_context`] projects the event into a rule [`Context`] and
//!    publishes the event secrets as the rule's
//!    [`configuration`](secrets::configuration).
//! 2. [`RuleToAction::convert`] snapshots that context, runs the rule and waits
//!    for its callback.
//! 3. [`reconcile`] diffs the context the rule handed back against the snapshot
//!    and replays every change as API calls.
//!
//! # Core Types
//!
//! - [`RuleToAction`]: Runs rules against one host API
//! - [`Rule`] / [`Callback`]: The legacy rule shape and its single-shot completion
//! - [`Context`]: The mutable view a rule works on
//! - [`UnauthorizedError`]: The error rules raise to deny a login
//! - [`Secrets`]: The tenant secret bag, redacted in `Debug`
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use rule_to_action::prelude::*;
//! use rule_to_action::recording::RecordingApi;
//! use rule_to_action::{Event, RuleToAction};
//! use serde_json::json;
//!
//! fn access_on_weekdays_only(user: User, context: Context, callback: Callback) {
//!     if context.client_name.as_deref() == Some("All Applications") {
//!         return callback.err(UnauthorizedError::new("This app is unavailable"));
//!     }
//!     callback.ok(user, context);
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let event = Event::from_value(json!({
//!     "tenant": { "id": "tenant" },
//!     "client": { "client_id": "client", "name": "All Applications" },
//!     "connection": { "id": "con" },
//!     "request": {},
//! }))?;
//!
//! let api = Arc::new(RecordingApi::new());
//! RuleToAction::new(api.clone())
//!     .convert(&event, &access_on_weekdays_only)
//!     .await?;
//!
//! assert!(api.was_called_with("access.deny", &[json!("This app is unavailable")]));
//! # Ok::<(), rule_to_action::Error>(())
//! # }).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod loose;
pub mod recording;
pub mod secrets;

mod context;
mod convert;
mod error;
mod event;
mod init;
mod logging;
mod projector;
mod reconcile;
mod rule;
mod unauthorized;

pub use context::{
    Claims, Context, ContextGeoIp, ContextRequest, Multifactor, Redirect, SamlConfiguration, Sso,
};
pub use convert::{ConvertGlobals, ConvertOptions, Projector, RuleCallback, RuleToAction};
pub use error::{ApiError, Error};
pub use event::{
    Authentication, Client, Connection, Event, GeoIp, Request, Session, Tenant, Transaction, User,
};
pub use init::init;
pub use logging::ConversionLog;
pub use projector::map_event_to_context;
pub use reconcile::reconcile;
pub use rule::{Callback, Rule, RuleOutcome};
pub use secrets::{configuration, Secrets};
pub use unauthorized::{RuleError, UnauthorizedError};

/// The names legacy rule bodies expect to be in scope.
///
/// ```
/// use rule_to_action::prelude::*;
///
/// fn require_secret(user: User, context: Context, callback: Callback) {
///     match configuration().get("API_KEY") {
///         Some(_) => callback.ok(user, context),
///         None => callback.err(UnauthorizedError::new("missing API_KEY")),
///     }
/// }
/// # let _: &dyn Rule = &require_secret;
/// ```
pub mod prelude {
    pub use crate::context::Context;
    pub use crate::event::User;
    pub use crate::rule::{Callback, Rule};
    pub use crate::secrets::{configuration, spawn};
    pub use crate::unauthorized::{RuleError, UnauthorizedError};
}
