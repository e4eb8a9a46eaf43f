use tokio::sync::oneshot;

use crate::context::Context;
use crate::event::User;
use crate::unauthorized::RuleError;

/// A legacy rule: `(user, context, callback)`.
///
/// Any `Fn(User, Context, Callback)` closure is a rule. The rule must hand its
/// result to the [`Callback`] exactly once, either before returning or later,
/// from a task it started with [`secrets::spawn`](crate::secrets::spawn), which
/// keeps [`configuration`](crate::secrets::configuration) readable there.
///
/// # Examples
///
/// ```
/// use rule_to_action::prelude::*;
///
/// fn access_on_weekdays_only(user: User, context: Context, callback: Callback) {
///     if context.client_name.as_deref() == Some("Closed App") {
///         return callback.err(UnauthorizedError::new("This app is unavailable"));
///     }
///     callback.ok(user, context);
/// }
///
/// let _rule: &dyn Rule = &access_on_weekdays_only;
/// ```
pub trait Rule: Send + Sync {
    /// Runs the rule.
    fn call(&self, user: User, context: Context, callback: Callback);

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Rule for F
where
    F: Fn(User, Context, Callback) + Send + Sync,
{
    fn call(&self, user: User, context: Context, callback: Callback) {
        self(user, context, callback)
    }
}

/// What a rule reported through its callback.
#[derive(Debug)]
pub enum RuleOutcome {
    /// The rule denied access.
    Error(RuleError),
    /// The rule finished. `context` is `None` when it called back without one.
    Success {
        /// The user as the rule left it.
        user: Option<User>,
        /// The context as the rule left it.
        context: Option<Context>,
    },
}

impl RuleOutcome {
    /// Returns the error if the rule denied access.
    pub fn error(&self) -> Option<&RuleError> {
        match self {
            RuleOutcome::Error(err) => Some(err),
            RuleOutcome::Success { .. } => None,
        }
    }
}

/// Single-shot completion handler passed to a rule.
///
/// Every method consumes the callback, so a rule cannot complete twice.
/// Dropping it without calling completes the conversion with
/// [`Error::CallbackDropped`](crate::Error::CallbackDropped).
#[derive(Debug)]
pub struct Callback {
    tx: oneshot::Sender<RuleOutcome>,
}

impl Callback {
    /// Creates a callback and the receiver its outcome arrives on.
    pub fn channel() -> (Self, oneshot::Receiver<RuleOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Node-style completion: `callback(error, user, context)`.
    ///
    /// An error wins over everything else; otherwise the call is a success.
    pub fn call(self, error: Option<RuleError>, user: Option<User>, context: Option<Context>) {
        let outcome = match error {
            Some(err) => RuleOutcome::Error(err),
            None => RuleOutcome::Success { user, context },
        };
        self.complete(outcome);
    }

    /// `callback(null, user, context)`
    pub fn ok(self, user: User, context: Context) {
        self.call(None, Some(user), Some(context));
    }

    /// `callback(error)`
    pub fn err(self, error: impl Into<RuleError>) {
        self.call(Some(error.into()), None, None);
    }

    /// Hands `outcome` to the waiting conversion.
    pub fn complete(self, outcome: RuleOutcome) {
        if self.tx.send(outcome).is_err() {
            tracing::warn!("rule completed after its conversion was abandoned");
        }
    }
}
