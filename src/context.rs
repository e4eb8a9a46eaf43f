//! The rule-facing context.
//!
//! Field names follow the legacy data model when serialized (`clientID`,
//! `idToken`, `samlConfiguration`, `request.userAgent`, snake_case `geoip`),
//! so a context can be handed to tooling that expects that shape.
//!
//! The regions a rule writes to (`id_token`, `access_token`,
//! `saml_configuration`, `multifactor`, `redirect`) hold dynamically typed
//! values. The reconciler decides what changed by comparing them with the
//! helpers in [`loose`](crate::loose).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claim name to claim value.
pub type Claims = Map<String, Value>;

/// Projected view of an event, mutated by a rule.
///
/// `Default` yields a context with every region empty; the reconciler treats
/// it as "nothing set".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// Tenant identifier.
    pub tenant: String,
    /// Client identifier.
    #[serde(rename = "clientID")]
    pub client_id: String,
    /// Application name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Application metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_metadata: Option<Map<String, Value>>,
    /// Connection identifier.
    #[serde(rename = "connectionID")]
    pub connection_id: String,
    /// Connection name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    /// Connection strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_strategy: Option<String>,
    /// Connection metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_metadata: Option<Map<String, Value>>,
    /// Transaction protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Adaptive MFA risk assessment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<Value>,
    /// Login statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
    /// Session identifier.
    #[serde(rename = "sessionID", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// The incoming request.
    #[serde(default)]
    pub request: ContextRequest,
    /// Completed authentication methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Vec<Value>>,
    /// Roles granted to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<Value>,
    /// Organization the login is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<Value>,
    /// Single sign-on state.
    #[serde(default)]
    pub sso: Sso,

    /// Custom claims for the ID token.
    #[serde(default)]
    pub id_token: Claims,
    /// Custom claims for the access token. An array under `scope` is treated
    /// as the granted scope list.
    #[serde(default)]
    pub access_token: Claims,
    /// SAML response settings.
    #[serde(default)]
    pub saml_configuration: SamlConfiguration,
    /// Multifactor request.
    #[serde(default)]
    pub multifactor: Multifactor,
    /// Redirect request. Terminal: nothing else is replayed when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Redirect>,
}

impl Context {
    /// Sets a custom ID token claim.
    pub fn set_id_token_claim(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.id_token.insert(name.into(), value.into());
    }

    /// Sets a custom access token claim.
    pub fn set_access_token_claim(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.access_token.insert(name.into(), value.into());
    }

    /// Appends a scope to the access token's `scope` list, creating it if needed.
    ///
    /// A non-array `scope` claim is replaced by a one-element list.
    pub fn add_scope(&mut self, scope: impl Into<String>) {
        let entry = self
            .access_token
            .entry("scope")
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(scopes) => scopes.push(Value::String(scope.into())),
            other => *other = Value::Array(vec![Value::String(scope.into())]),
        }
    }

    /// Asks the host to redirect the user to `url`.
    pub fn redirect_to(&mut self, url: impl Into<String>) {
        self.redirect = Some(Redirect {
            url: Some(url.into()),
        });
    }
}

/// Request as rules see it: `user_agent` becomes `userAgent`, `geoip` uses
/// snake_case keys, and every other request field is kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextRequest {
    /// Raw `User-Agent` header.
    #[serde(rename = "userAgent", default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Geographic lookup, absent when the event carried none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geoip: Option<ContextGeoIp>,
    /// Remaining request fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Geographic lookup with the legacy snake_case names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ContextGeoIp {
    pub country_code: Option<String>,
    pub country_code3: Option<String>,
    pub country_name: Option<String>,
    pub city_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub time_zone: Option<String>,
    pub continent_code: Option<String>,
    pub subdivision_code: Option<String>,
    pub subdivision_name: Option<String>,
}

/// Single sign-on state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sso {
    /// Clients already holding the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_clients: Option<Vec<Value>>,
}

/// SAML response settings a rule may change.
///
/// Every scalar starts unset; a rule sets the ones it wants replayed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamlConfiguration {
    /// Claim to SAML attribute mappings.
    #[serde(default)]
    pub mappings: Map<String, Value>,
    /// Claims probed, in order, for the name identifier.
    #[serde(default)]
    pub name_identifier_probes: Vec<String>,

    /// Audience of the SAML assertion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Value>,
    /// Issuer of the SAML assertion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Value>,
    /// Public key used to encrypt the assertion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_public_key: Option<Value>,
    /// Recipient of the assertion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Value>,
    /// Whether to add a UPN claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_upn_claim: Option<Value>,
    /// Whether to pass through claims that have no mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passthrough_claims_with_no_mapping: Option<Value>,
    /// Whether to map unknown claims as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_unknown_claims_as_is: Option<Value>,
    /// Whether to include identities in the assertion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_identities: Option<Value>,
    /// Destination of the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Value>,
    /// Relay state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_state: Option<Value>,
    /// Assertion lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime_in_seconds: Option<Value>,
    /// Whether to sign the whole response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_response: Option<Value>,
    /// Name identifier format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_identifier_format: Option<Value>,
    /// Authentication context class reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authn_context_class_ref: Option<Value>,
    /// Certificate used to sign the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_cert: Option<Value>,
    /// Whether to include the attribute name format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_attribute_name_format: Option<Value>,
    /// Certificate used to encrypt the assertion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_cert: Option<Value>,
    /// Signing certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<Value>,
    /// Signing private key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,
    /// Signature algorithm, e.g. `rsa-sha256`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_algorithm: Option<Value>,
    /// Digest algorithm, e.g. `sha256`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest_algorithm: Option<Value>,
}

/// Multifactor request: a `provider` plus provider options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Multifactor {
    /// Provider to challenge with, e.g. `any` or `guardian`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Every other field, forwarded as provider options.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl Multifactor {
    /// Requests multifactor with the given provider and no options.
    pub fn provider(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            options: Map::new(),
        }
    }

    /// Adds a provider option.
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }
}

/// Redirect request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Redirect {
    /// Where to send the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
