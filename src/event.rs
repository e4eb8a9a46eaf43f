//! The read-only post-login event supplied by the host.
//!
//! Only the records the projection reads are typed; everything else in the
//! host payload is either kept verbatim as JSON (`metadata`, `stats`,
//! `organization`, ...) or dropped on deserialization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::secrets::Secrets;

/// The user profile handed to a rule. Rules read and modify it freely.
pub type User = Map<String, Value>;

/// A post-login event.
///
/// `tenant`, `client`, `connection` and `request` are required: the host always
/// sends them, and an event without them fails to parse with
/// [`Error::Projection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Tenant the login happens on.
    pub tenant: Tenant,
    /// Application the user logs into.
    pub client: Client,
    /// Connection the user authenticated with.
    pub connection: Connection,
    /// Organization the login is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<Value>,
    /// Protocol-level transaction details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
    /// Completed authentication methods and risk assessment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,
    /// Roles granted to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<Value>,
    /// Session the login belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    /// The incoming HTTP request.
    pub request: Request,
    /// Login statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
    /// The user logging in.
    #[serde(default)]
    pub user: User,
    /// Tenant-configured secrets.
    #[serde(default)]
    pub secrets: Secrets,
}

impl Event {
    /// Parses an event from the host's JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Projection`] if a required record or field is missing.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        Ok(serde_json::from_value(value)?)
    }

    /// Parses an event from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Projection`] if the text is not valid JSON or a required
    /// record or field is missing.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Tenant record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant identifier.
    pub id: String,
}

/// Application record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Client identifier.
    pub client_id: String,
    /// Display name of the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Application metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Connection record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Connection identifier.
    pub id: String,
    /// Connection name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Identity provider strategy, e.g. `auth0` or `google-oauth2`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Connection metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Transaction record. Only `protocol` is projected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Authentication protocol, e.g. `oidc-basic-profile`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Remaining transaction fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Authentication record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authentication {
    /// Methods completed during this login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<Value>>,
    /// Adaptive MFA risk assessment.
    #[serde(
        default,
        rename = "riskAssessment",
        skip_serializing_if = "Option::is_none"
    )]
    pub risk_assessment: Option<Value>,
}

/// Session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Clients already holding this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients: Option<Vec<Value>>,
    /// Remaining session fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Raw `User-Agent` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Geographic lookup of the client IP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geoip: Option<GeoIp>,
    /// Remaining request fields (`ip`, `method`, `query`, `body`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Geographic lookup as the event spells it (camelCase).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoIp {
    /// ISO 3166-1 alpha-2 code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    /// ISO 3166-1 alpha-3 code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code3: Option<String>,
    /// Country name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    /// City name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_name: Option<String>,
    /// Latitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// IANA time zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    /// Continent code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continent_code: Option<String>,
    /// Subdivision (state, province) code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivision_code: Option<String>,
    /// Subdivision name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivision_name: Option<String>,
}
