//! In-memory API recorder.
//!
//! [`RecordingApi`] implements every [`Api`] group by storing the call, in
//! order, instead of acting on it. It backs the test suite and is handy for a
//! dry run of a rule against a captured event.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};

use crate::api::{
    AccessApi, AccessTokenApi, Api, ApiResult, IdTokenApi, MultifactorApi, RedirectApi,
    SamlResponseApi,
};
use crate::error::ApiError;

/// A single recorded API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    method: &'static str,
    args: Vec<Value>,
}

impl ApiCall {
    /// Creates a call record, e.g. `ApiCall::new("access.deny", vec![json!("no")])`.
    pub fn new(method: &'static str, args: Vec<Value>) -> Self {
        Self { method, args }
    }

    /// Returns the host-style method name, e.g. `idToken.setCustomClaim`.
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Returns the arguments, in order.
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

impl fmt::Display for ApiCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "api.{}(", self.method)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

/// Records every call made through the [`Api`] groups.
///
/// # Example
///
/// ```
/// use rule_to_action::api::Api;
/// use rule_to_action::recording::RecordingApi;
/// use serde_json::json;
///
/// let api = RecordingApi::new();
/// api.id_token().set_custom_claim("https://example.com/vip", &json!(true)).unwrap();
///
/// assert_eq!(api.len(), 1);
/// let vip = [json!("https://example.com/vip"), json!(true)];
/// assert!(api.was_called_with("idToken.setCustomClaim", &vip));
/// ```
#[derive(Default)]
pub struct RecordingApi {
    calls: Mutex<Vec<ApiCall>>,
    failing: Mutex<Vec<&'static str>>,
}

impl RecordingApi {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call to `method` fail after being recorded.
    pub fn fail_on(&self, method: &'static str) {
        lock(&self.failing).push(method);
    }

    /// Returns a snapshot of all recorded calls.
    pub fn calls(&self) -> Vec<ApiCall> {
        lock(&self.calls).clone()
    }

    /// Returns the argument lists of every call to `method`.
    pub fn calls_to(&self, method: &str) -> Vec<Vec<Value>> {
        lock(&self.calls)
            .iter()
            .filter(|call| call.method == method)
            .map(|call| call.args.clone())
            .collect()
    }

    /// Returns true if `method` was called at least once with exactly `args`.
    pub fn was_called_with(&self, method: &str, args: &[Value]) -> bool {
        lock(&self.calls)
            .iter()
            .any(|call| call.method == method && call.args == args)
    }

    /// Returns true if `method` was called at all.
    pub fn was_called(&self, method: &str) -> bool {
        lock(&self.calls).iter().any(|call| call.method == method)
    }

    /// Returns the number of recorded calls.
    pub fn len(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Returns true if nothing has been called.
    pub fn is_empty(&self) -> bool {
        lock(&self.calls).is_empty()
    }

    /// Clears all recorded calls.
    pub fn clear(&self) {
        lock(&self.calls).clear();
    }

    fn record(&self, method: &'static str, args: Vec<Value>) -> ApiResult {
        lock(&self.calls).push(ApiCall::new(method, args));
        if lock(&self.failing).contains(&method) {
            return Err(ApiError::new(method, "recorder configured to fail"));
        }
        Ok(())
    }
}

impl fmt::Debug for RecordingApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingApi")
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

// A panicking test must not hide the calls recorded before it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Api for RecordingApi {
    fn access(&self) -> &dyn AccessApi {
        self
    }

    fn id_token(&self) -> &dyn IdTokenApi {
        self
    }

    fn access_token(&self) -> &dyn AccessTokenApi {
        self
    }

    fn redirect(&self) -> &dyn RedirectApi {
        self
    }

    fn multifactor(&self) -> &dyn MultifactorApi {
        self
    }

    fn saml_response(&self) -> &dyn SamlResponseApi {
        self
    }
}

impl AccessApi for RecordingApi {
    fn deny(&self, reason: &str) -> ApiResult {
        self.record("access.deny", vec![Value::from(reason)])
    }
}

impl IdTokenApi for RecordingApi {
    fn set_custom_claim(&self, name: &str, value: &Value) -> ApiResult {
        self.record("idToken.setCustomClaim", vec![Value::from(name), value.clone()])
    }
}

impl AccessTokenApi for RecordingApi {
    fn set_custom_claim(&self, name: &str, value: &Value) -> ApiResult {
        self.record("accessToken.setCustomClaim", vec![Value::from(name), value.clone()])
    }

    fn add_scope(&self, scope: &str) -> ApiResult {
        self.record("accessToken.addScope", vec![Value::from(scope)])
    }

    fn remove_scope(&self, scope: &str) -> ApiResult {
        self.record("accessToken.removeScope", vec![Value::from(scope)])
    }
}

impl RedirectApi for RecordingApi {
    fn send_user_to(&self, url: &str) -> ApiResult {
        self.record("redirect.sendUserTo", vec![Value::from(url)])
    }
}

impl MultifactorApi for RecordingApi {
    fn enable(&self, provider: &str, options: &Map<String, Value>) -> ApiResult {
        self.record(
            "multifactor.enable",
            vec![Value::from(provider), Value::Object(options.clone())],
        )
    }
}

macro_rules! record_saml_setters {
    ($($fn_name:ident => $method:literal),* $(,)?) => {
        $(
            fn $fn_name(&self, value: &Value) -> ApiResult {
                self.record($method, vec![value.clone()])
            }
        )*
    };
}

impl SamlResponseApi for RecordingApi {
    fn set_attribute(&self, attribute: &str, value: &Value) -> ApiResult {
        self.record("samlResponse.setAttribute", vec![Value::from(attribute), value.clone()])
    }

    fn set_name_identifier_probes(&self, probes: &[String]) -> ApiResult {
        self.record(
            "samlResponse.setNameIdentifierProbes",
            vec![Value::from(probes.to_vec())],
        )
    }

    record_saml_setters! {
        set_audience => "samlResponse.setAudience",
        set_issuer => "samlResponse.setIssuer",
        set_encryption_public_key => "samlResponse.setEncryptionPublicKey",
        set_recipient => "samlResponse.setRecipient",
        set_create_upn_claim => "samlResponse.setCreateUpnClaim",
        set_passthrough_claims_with_no_mapping => "samlResponse.setPassthroughClaimsWithNoMapping",
        set_map_unknown_claims_as_is => "samlResponse.setMapUnknownClaimsAsIs",
        set_map_identities => "samlResponse.setMapIdentities",
        set_destination => "samlResponse.setDestination",
        set_relay_state => "samlResponse.setRelayState",
        set_lifetime_in_seconds => "samlResponse.setLifetimeInSeconds",
        set_sign_response => "samlResponse.setSignResponse",
        set_name_identifier_format => "samlResponse.setNameIdentifierFormat",
        set_authn_context_class_ref => "samlResponse.setAuthnContextClassRef",
        set_signing_cert => "samlResponse.setSigningCert",
        set_include_attribute_name_format => "samlResponse.setIncludeAttributeNameFormat",
        set_encryption_cert => "samlResponse.setEncryptionCert",
        set_cert => "samlResponse.setCert",
        set_key => "samlResponse.setKey",
        set_signature_algorithm => "samlResponse.setSignatureAlgorithm",
        set_digest_algorithm => "samlResponse.setDigestAlgorithm",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recorder_starts_empty() {
        let api = RecordingApi::new();
        assert!(api.is_empty());
        assert_eq!(api.len(), 0);
    }

    #[test]
    fn recorder_keeps_call_order() {
        let api = RecordingApi::new();
        api.access().deny("first").unwrap();
        api.redirect().send_user_to("https://example.com").unwrap();

        let calls = api.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method(), "access.deny");
        assert_eq!(calls[1].args(), &[json!("https://example.com")]);
    }

    #[test]
    fn recorder_can_be_cleared() {
        let api = RecordingApi::new();
        api.saml_response().set_audience(&json!("aud")).unwrap();
        assert_eq!(api.len(), 1);

        api.clear();
        assert!(api.is_empty());
    }

    #[test]
    fn recorder_fails_configured_methods() {
        let api = RecordingApi::new();
        api.fail_on("samlResponse.setKey");

        let err = api.saml_response().set_key(&json!("k")).unwrap_err();
        assert_eq!(err.method(), "samlResponse.setKey");
        assert!(api.was_called("samlResponse.setKey"));
        assert!(api.saml_response().set_cert(&json!("c")).is_ok());
    }

    #[test]
    fn call_display_reads_like_host_call() {
        let call = ApiCall::new("multifactor.enable", vec![json!("any"), json!({"a": 1})]);
        assert_eq!(call.to_string(), r#"api.multifactor.enable("any", {"a":1})"#);
    }

    #[test]
    fn name_identifiers_are_recorded_as_array() {
        let api = RecordingApi::new();
        let probes = vec!["email".to_string(), "username".to_string()];
        api.saml_response().set_name_identifier_probes(&probes).unwrap();
        assert_eq!(
            api.calls_to("samlResponse.setNameIdentifierProbes"),
            vec![vec![json!(["email", "username"])]]
        );
    }
}
