use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::Instrument;

use crate::api::Api;
use crate::context::Context;
use crate::error::Error;
use crate::event::Event;
use crate::init::init;
use crate::logging::ConversionLog;
use crate::projector::map_event_to_context;
use crate::reconcile::reconcile;
use crate::rule::{Callback, Rule, RuleOutcome};
use crate::secrets;

/// Replacement for the default event to context projection.
pub type Projector = dyn Fn(&Event) -> Context + Send + Sync;

/// Handles the outcome a rule reported through its callback.
///
/// The default is [`RuleToAction::default_rule_callback`]. Closures of the
/// form `Fn(&RuleToAction, RuleOutcome) -> Result<(), Error>` implement it.
pub trait RuleCallback: Send + Sync {
    /// Applies `outcome`, using `converter` for the API and the diff baseline.
    fn handle(&self, converter: &RuleToAction, outcome: RuleOutcome) -> Result<(), Error>;
}

impl<F> RuleCallback for F
where
    F: Fn(&RuleToAction, RuleOutcome) -> Result<(), Error> + Send + Sync,
{
    fn handle(&self, converter: &RuleToAction, outcome: RuleOutcome) -> Result<(), Error> {
        self(converter, outcome)
    }
}

/// Per-call overrides for [`RuleToAction::convert_with`].
///
/// # Examples
///
/// ```
/// use rule_to_action::{map_event_to_context, ConvertOptions};
///
/// let options = ConvertOptions::new().map_event_to_context(|event| {
///     let mut context = map_event_to_context(event);
///     context.client_name = Some("Renamed".to_string());
///     context
/// });
/// # let _ = options;
/// ```
#[derive(Clone, Default)]
pub struct ConvertOptions {
    map_event_to_context: Option<Arc<Projector>>,
    callback: Option<Arc<dyn RuleCallback>>,
}

impl ConvertOptions {
    /// Creates options that keep every default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the event to context projection.
    pub fn map_event_to_context(
        mut self,
        projector: impl Fn(&Event) -> Context + Send + Sync + 'static,
    ) -> Self {
        self.map_event_to_context = Some(Arc::new(projector));
        self
    }

    /// Replaces the completion handler.
    pub fn callback(mut self, callback: impl RuleCallback + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for ConvertOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertOptions")
            .field("map_event_to_context", &self.map_event_to_context.is_some())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// What one conversion keeps while its rule runs: the API and the context
/// snapshot taken before the rule saw it.
#[derive(Clone)]
pub struct ConvertGlobals {
    api: Arc<dyn Api>,
    old_context: Context,
}

impl ConvertGlobals {
    /// Bundles an API with a diff baseline.
    pub fn new(api: Arc<dyn Api>, old_context: Context) -> Self {
        Self { api, old_context }
    }

    /// Returns the API calls are replayed on.
    pub fn api(&self) -> &Arc<dyn Api> {
        &self.api
    }

    /// Returns the context as it was before the rule ran.
    pub fn old_context(&self) -> &Context {
        &self.old_context
    }
}

impl fmt::Debug for ConvertGlobals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertGlobals")
            .field("old_context", &self.old_context)
            .finish_non_exhaustive()
    }
}

/// Runs legacy rules against a host API.
///
/// Each instance owns the [`ConvertGlobals`] of its latest conversion.
/// Separate instances never share them, and every conversion gets its own
/// `configuration` scope, so instances may convert concurrently.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use rule_to_action::prelude::*;
/// use rule_to_action::recording::RecordingApi;
/// use rule_to_action::{Event, RuleToAction};
/// use serde_json::json;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let event = Event::from_value(json!({
///     "tenant": { "id": "tenant" },
///     "client": { "client_id": "client", "name": "Default App" },
///     "connection": { "id": "con", "name": "company.com" },
///     "request": {},
/// }))?;
///
/// let rule = |user: User, mut context: Context, callback: Callback| {
///     if context.connection.as_deref() == Some("company.com") {
///         context.set_id_token_claim("https://example.com/vip", true);
///     }
///     callback.ok(user, context);
/// };
///
/// let api = Arc::new(RecordingApi::new());
/// RuleToAction::new(api.clone()).convert(&event, &rule).await?;
///
/// assert!(api.was_called_with(
///     "idToken.setCustomClaim",
///     &[json!("https://example.com/vip"), json!(true)],
/// ));
/// # Ok::<(), rule_to_action::Error>(())
/// # }).unwrap();
/// ```
pub struct RuleToAction {
    api: Arc<dyn Api>,
    globals: Mutex<Option<ConvertGlobals>>,
}

impl RuleToAction {
    /// Creates a converter that replays onto `api`.
    pub fn new(api: Arc<dyn Api>) -> Self {
        Self {
            api,
            globals: Mutex::new(None),
        }
    }

    /// Returns the API this converter replays onto.
    pub fn api(&self) -> &Arc<dyn Api> {
        &self.api
    }

    /// Converts one login with the default projection and completion handler.
    ///
    /// # Errors
    ///
    /// See [`convert_with`](Self::convert_with).
    pub async fn convert(&self, event: &Event, rule: &dyn Rule) -> Result<(), Error> {
        self.convert_with(event, rule, ConvertOptions::default()).await
    }

    /// Converts one login.
    ///
    /// Resets the ambient `configuration`, projects `event` into a context,
    /// snapshots it, runs `rule`, and waits until the rule's callback fires and
    /// its outcome has been applied. No timeout is enforced: a rule that holds
    /// on to its callback keeps this future pending.
    ///
    /// # Errors
    ///
    /// - [`Error::Api`] if an API call fails while applying the outcome.
    /// - [`Error::CallbackDropped`] if the rule dropped its callback unused.
    ///
    /// A rule denying access is not an error: it results in
    /// `api.access.deny(message)` and `Ok(())`.
    pub async fn convert_with(
        &self,
        event: &Event,
        rule: &dyn Rule,
        options: ConvertOptions,
    ) -> Result<(), Error> {
        let span = tracing::info_span!(
            "convert",
            rule = rule.name(),
            client_id = %event.client.client_id
        );
        secrets::scope(self.run(event, rule, options))
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        event: &Event,
        rule: &dyn Rule,
        options: ConvertOptions,
    ) -> Result<(), Error> {
        init();
        let log = ConversionLog::new(rule.name(), &event.client.client_id);

        let user = event.user.clone();
        let projector: &Projector = match &options.map_event_to_context {
            Some(projector) => projector.as_ref(),
            None => &map_event_to_context,
        };
        let context = projector(event);
        log.debug(format_args!(
            "projected event, {} secret(s) in configuration",
            secrets::configuration().len()
        ));

        self.set_convert_globals(ConvertGlobals::new(self.api.clone(), context.clone()));

        let (callback, outcome) = Callback::channel();
        rule.call(user, context, callback);
        let outcome = outcome.await.map_err(|_| {
            log.warn(format_args!("rule dropped its callback"));
            Error::CallbackDropped
        })?;
        log.info(format_args!("rule ran as action"));

        match &options.callback {
            Some(callback) => {
                log.debug(format_args!("handing outcome to custom callback"));
                callback.handle(self, outcome)
            }
            None => self.default_rule_callback(outcome),
        }
    }

    /// The default completion handler.
    ///
    /// - Error: `api.access.deny(error message)`, nothing else.
    /// - Success with `context.redirect.url` set: `api.redirect.sendUserTo(url)`,
    ///   nothing else.
    /// - Success otherwise: replays the context changes against the snapshot in
    ///   [`ConvertGlobals`]; without one, against an empty context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if an API call fails.
    pub fn default_rule_callback(&self, outcome: RuleOutcome) -> Result<(), Error> {
        let (api, old_context) = match self.convert_globals() {
            Some(globals) => (globals.api, globals.old_context),
            None => (self.api.clone(), Context::default()),
        };

        match outcome {
            RuleOutcome::Error(err) => {
                let message = err.message();
                tracing::warn!(
                    reason = %message,
                    unauthorized = err.is_unauthorized(),
                    "rule denied access"
                );
                api.access().deny(&message)?;
            }
            RuleOutcome::Success { context, .. } => {
                let new_context = context.unwrap_or_default();
                let redirect = new_context
                    .redirect
                    .as_ref()
                    .and_then(|r| r.url.as_deref())
                    .filter(|url| !url.is_empty());

                if let Some(url) = redirect {
                    tracing::debug!(url, "rule requested redirect");
                    api.redirect().send_user_to(url)?;
                    return Ok(());
                }

                reconcile(&old_context, &new_context, api.as_ref())?;
                tracing::debug!("handled context changes applied by rule");
            }
        }
        Ok(())
    }

    /// Returns the globals of the latest conversion, if any.
    pub fn convert_globals(&self) -> Option<ConvertGlobals> {
        self.lock_globals().clone()
    }

    /// Replaces the globals, e.g. to seed a diff baseline before calling
    /// [`default_rule_callback`](Self::default_rule_callback) directly.
    pub fn set_convert_globals(&self, globals: ConvertGlobals) {
        *self.lock_globals() = Some(globals);
    }

    fn lock_globals(&self) -> MutexGuard<'_, Option<ConvertGlobals>> {
        self.globals.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for RuleToAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleToAction")
            .field("globals", &self.convert_globals())
            .finish_non_exhaustive()
    }
}
