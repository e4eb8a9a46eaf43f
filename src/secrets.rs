//! The `configuration` secret bag legacy rules read.
//!
//! Every conversion runs inside its own [`scope`]; [`configuration`] and
//! [`publish`] only see the slot of the scope they are called from.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// The tenant-configured secret bag carried on every event.
///
/// Legacy rule bodies read it through [`configuration()`]. Values are never
/// shown by `Debug`: only the keys are listed, so a bag can be logged or
/// asserted on without leaking material.
///
/// # Examples
///
/// ```
/// use rule_to_action::Secrets;
///
/// let secrets = Secrets::from_iter([("API_KEY", "sk-1234567890")]);
///
/// assert_eq!(secrets.get("API_KEY"), Some("sk-1234567890"));
/// assert_eq!(format!("{:?}", secrets), r#"{"API_KEY": [REDACTED]}"#);
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secrets {
    // BREAKING CHANGE WARNING: Debug below MUST keep redacting values (CWE-532).
    inner: BTreeMap<String, String>,
}

impl Secrets {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the secret stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    /// Stores a secret, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(key.into(), value.into());
    }

    /// Returns the configured keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    /// Returns the number of secrets.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if no secrets are configured.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Secrets {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Redacted;
        impl fmt::Debug for Redacted {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("[REDACTED]")
            }
        }

        f.debug_map()
            .entries(self.inner.keys().map(|k| (k, Redacted)))
            .finish()
    }
}

tokio::task_local! {
    static CONFIGURATION: RefCell<Secrets>;
}

/// Returns the secret bag visible to the running rule.
///
/// Inside a conversion this is the event's `secrets`, including in tasks the
/// rule starts with [`spawn`]. Outside any scope the bag is empty.
pub fn configuration() -> Secrets {
    CONFIGURATION
        .try_with(|slot| slot.borrow().clone())
        .unwrap_or_default()
}

/// Replaces the bag in the current scope.
///
/// Returns `false` when no scope is active, in which case nothing is stored.
pub fn publish(secrets: Secrets) -> bool {
    let stored = CONFIGURATION
        .try_with(|slot| *slot.borrow_mut() = secrets)
        .is_ok();
    if !stored {
        tracing::debug!("no configuration scope active, secrets not published");
    }
    stored
}

/// Runs `future` with its own, initially empty, configuration slot.
///
/// Each conversion gets its own slot, so concurrent conversions never observe
/// each other's secrets.
pub async fn scope<F: Future>(future: F) -> F::Output {
    CONFIGURATION.scope(RefCell::new(Secrets::new()), future).await
}

/// Spawns `future` on the runtime with a copy of the current bag.
///
/// Rules that finish their work asynchronously start it with this instead of
/// `tokio::spawn`, so `configuration()` keeps returning the conversion's
/// secrets after any number of `.await`s. A bag published inside the spawned
/// task stays local to it.
///
/// # Panics
///
/// Panics when called outside a tokio runtime, like `tokio::spawn`.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(CONFIGURATION.scope(RefCell::new(configuration()), future))
}

/// Synchronous counterpart of [`scope`].
pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
    CONFIGURATION.sync_scope(RefCell::new(Secrets::new()), f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_redact_values_in_debug() {
        let secrets = Secrets::from_iter([("TEST_SECRET", "hunter2")]);
        let debug_output = format!("{:?}", secrets);

        assert!(debug_output.contains("TEST_SECRET"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
    }

    #[test]
    fn secrets_deserialize_from_plain_map() {
        let secrets: Secrets = serde_json::from_str(r#"{"A":"1","B":"2"}"#).unwrap();
        assert_eq!(secrets.len(), 2);
        assert_eq!(secrets.get("B"), Some("2"));
        assert_eq!(secrets.keys().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn configuration_is_empty_outside_scope() {
        assert!(configuration().is_empty());
        assert!(!publish(Secrets::from_iter([("K", "V")])));
        assert!(configuration().is_empty());
    }

    #[test]
    fn publish_is_visible_within_scope() {
        sync_scope(|| {
            assert!(configuration().is_empty());
            assert!(publish(Secrets::from_iter([("K", "V")])));
            assert_eq!(configuration().get("K"), Some("V"));
        });
        assert!(configuration().is_empty());
    }

    #[tokio::test]
    async fn async_scopes_are_isolated() {
        let first = scope(async {
            publish(Secrets::from_iter([("K", "first")]));
            tokio::task::yield_now().await;
            configuration()
        });
        let second = scope(async {
            publish(Secrets::from_iter([("K", "second")]));
            tokio::task::yield_now().await;
            configuration()
        });

        let (first, second) = tokio::join!(first, second);
        assert_eq!(first.get("K"), Some("first"));
        assert_eq!(second.get("K"), Some("second"));
    }

    #[tokio::test]
    async fn spawned_task_keeps_the_bag_across_awaits() {
        let (seen, after) = scope(async {
            publish(Secrets::from_iter([("API_KEY", "k-123")]));
            let handle = spawn(async {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                let seen = configuration();
                publish(Secrets::from_iter([("API_KEY", "overwritten")]));
                seen
            });
            let seen = handle.await.unwrap();
            (seen, configuration())
        })
        .await;

        assert_eq!(seen.get("API_KEY"), Some("k-123"));
        assert_eq!(after.get("API_KEY"), Some("k-123"));
    }

    #[tokio::test]
    async fn spawn_outside_scope_sees_empty_bag() {
        let seen = spawn(async { configuration() }).await.unwrap();
        assert!(seen.is_empty());
    }
}
