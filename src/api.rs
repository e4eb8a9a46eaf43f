//! The imperative post-login API the host hands to every invocation.
//!
//! Each method group is its own trait, mirroring the host object
//! (`api.access`, `api.idToken`, ...). A host implements the groups and
//! exposes them through [`Api`]. Every call may fail with an [`ApiError`],
//! which aborts the conversion.
//!
//! Only the groups the conversion drives are modeled; the host's other groups
//! (cache, user metadata, session, ...) are never touched by a legacy rule
//! replay.

use serde_json::{Map, Value};

use crate::error::ApiError;

/// Result of a single API call.
pub type ApiResult = Result<(), ApiError>;

/// The host API, grouped the way the host exposes it.
pub trait Api: Send + Sync {
    /// `api.access`
    fn access(&self) -> &dyn AccessApi;
    /// `api.idToken`
    fn id_token(&self) -> &dyn IdTokenApi;
    /// `api.accessToken`
    fn access_token(&self) -> &dyn AccessTokenApi;
    /// `api.redirect`
    fn redirect(&self) -> &dyn RedirectApi;
    /// `api.multifactor`
    fn multifactor(&self) -> &dyn MultifactorApi;
    /// `api.samlResponse`
    fn saml_response(&self) -> &dyn SamlResponseApi;
}

/// `api.access`
pub trait AccessApi {
    /// Fails the login with `reason`.
    fn deny(&self, reason: &str) -> ApiResult;
}

/// `api.idToken`
pub trait IdTokenApi {
    /// Adds a custom claim to the ID token.
    fn set_custom_claim(&self, name: &str, value: &Value) -> ApiResult;
}

/// `api.accessToken`
pub trait AccessTokenApi {
    /// Adds a custom claim to the access token.
    fn set_custom_claim(&self, name: &str, value: &Value) -> ApiResult;
    /// Grants an additional scope.
    fn add_scope(&self, scope: &str) -> ApiResult;
    /// Withdraws a scope.
    fn remove_scope(&self, scope: &str) -> ApiResult;
}

/// `api.redirect`
pub trait RedirectApi {
    /// Sends the user to `url` before completing the login.
    fn send_user_to(&self, url: &str) -> ApiResult;
}

/// `api.multifactor`
pub trait MultifactorApi {
    /// Requires a multifactor challenge with `provider`.
    fn enable(&self, provider: &str, options: &Map<String, Value>) -> ApiResult;
}

/// `api.samlResponse`
///
/// Scalar setters receive the value exactly as the rule stored it.
#[allow(missing_docs)]
pub trait SamlResponseApi {
    fn set_attribute(&self, attribute: &str, value: &Value) -> ApiResult;
    fn set_audience(&self, audience: &Value) -> ApiResult;
    fn set_issuer(&self, issuer: &Value) -> ApiResult;
    fn set_encryption_public_key(&self, encryption_public_key: &Value) -> ApiResult;
    fn set_recipient(&self, recipient: &Value) -> ApiResult;
    fn set_create_upn_claim(&self, create_upn_claim: &Value) -> ApiResult;
    fn set_passthrough_claims_with_no_mapping(&self, passthrough: &Value) -> ApiResult;
    fn set_map_unknown_claims_as_is(&self, map_unknown_claims_as_is: &Value) -> ApiResult;
    fn set_map_identities(&self, map_identities: &Value) -> ApiResult;
    fn set_destination(&self, destination: &Value) -> ApiResult;
    fn set_relay_state(&self, relay_state: &Value) -> ApiResult;
    fn set_lifetime_in_seconds(&self, lifetime_in_seconds: &Value) -> ApiResult;
    fn set_sign_response(&self, sign_response: &Value) -> ApiResult;
    fn set_name_identifier_format(&self, name_identifier_format: &Value) -> ApiResult;
    fn set_name_identifier_probes(&self, probes: &[String]) -> ApiResult;
    fn set_authn_context_class_ref(&self, authn_context_class_ref: &Value) -> ApiResult;
    fn set_signing_cert(&self, signing_cert: &Value) -> ApiResult;
    fn set_include_attribute_name_format(&self, include: &Value) -> ApiResult;
    fn set_encryption_cert(&self, encryption_cert: &Value) -> ApiResult;
    fn set_cert(&self, cert: &Value) -> ApiResult;
    fn set_key(&self, key: &Value) -> ApiResult;
    fn set_signature_algorithm(&self, signature_algorithm: &Value) -> ApiResult;
    fn set_digest_algorithm(&self, digest_algorithm: &Value) -> ApiResult;
}
