//! Replays the changes a rule made to its context onto the host API.
//!
//! The host has no notion of "returning a modified context": every effect is
//! an explicit call. [`reconcile`] compares the snapshot taken before the rule
//! ran with the context the rule handed back, region by region, and issues
//! one call per genuine change:
//!
//! - ID/access token claims and SAML attribute mappings: a claim is replayed
//!   when its new value is set and loosely differs from the snapshot.
//! - SAML scalars: same rule, strict comparison except `lifetimeInSeconds`
//!   and `createUpnClaim`, which compare loosely.
//! - `nameIdentifierProbes`: replayed when non-empty and not the same set of
//!   probes as before, ignoring order.
//! - `multifactor`: enabled when the provider is set and changed, with every
//!   other field forwarded as options.
//! - access token `scope` list: each added scope is granted, each removed one
//!   withdrawn.
//!
//! Claims the rule removed are not retracted. The first failing API call
//! aborts reconciliation and is returned to the caller.

use serde_json::{Map, Value};

use crate::api::{AccessTokenApi, Api, ApiResult};
use crate::context::{Context, SamlConfiguration};
use crate::loose::{is_changed, same_members, Equality};

const SCOPE_CLAIM: &str = "scope";

/// Issues the API calls that turn `old` into `new`.
///
/// # Errors
///
/// Returns the first [`ApiError`](crate::ApiError) raised by the host.
pub fn reconcile(old: &Context, new: &Context, api: &dyn Api) -> ApiResult {
    reconcile_claims(&new.id_token, &old.id_token, |name, value| {
        tracing::debug!(claim = name, "setting ID token claim");
        api.id_token().set_custom_claim(name, value)
    })?;

    reconcile_access_token(&old.access_token, &new.access_token, api.access_token())?;

    reconcile_claims(
        &new.saml_configuration.mappings,
        &old.saml_configuration.mappings,
        |name, value| {
            tracing::debug!(attribute = name, "setting SAML attribute");
            api.saml_response().set_attribute(name, value)
        },
    )?;
    reconcile_saml_fields(&old.saml_configuration, &new.saml_configuration, api)?;
    reconcile_probes(&old.saml_configuration, &new.saml_configuration, api)?;

    reconcile_multifactor(old, new, api)
}

fn reconcile_claims(
    new: &Map<String, Value>,
    old: &Map<String, Value>,
    mut set: impl FnMut(&str, &Value) -> ApiResult,
) -> ApiResult {
    for (name, value) in new {
        if is_changed(value, old.get(name), Equality::Loose) {
            set(name.as_str(), value)?;
        }
    }
    Ok(())
}

fn reconcile_access_token(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    api: &dyn AccessTokenApi,
) -> ApiResult {
    if let Some(Value::Array(new_scopes)) = new.get(SCOPE_CLAIM) {
        let old_scopes: &[Value] = match old.get(SCOPE_CLAIM) {
            Some(Value::Array(scopes)) => scopes.as_slice(),
            _ => &[],
        };
        for scope in scope_names(new_scopes).filter(|s| !scope_names(old_scopes).any(|o| o == *s)) {
            tracing::debug!(scope, "adding access token scope");
            api.add_scope(scope)?;
        }
        for scope in scope_names(old_scopes).filter(|s| !scope_names(new_scopes).any(|n| n == *s)) {
            tracing::debug!(scope, "removing access token scope");
            api.remove_scope(scope)?;
        }
    }

    for (name, value) in new {
        if name == SCOPE_CLAIM && value.is_array() {
            continue;
        }
        if is_changed(value, old.get(name), Equality::Loose) {
            tracing::debug!(claim = name.as_str(), "setting access token claim");
            api.set_custom_claim(name, value)?;
        }
    }
    Ok(())
}

fn scope_names(scopes: &[Value]) -> impl Iterator<Item = &str> {
    scopes.iter().filter_map(Value::as_str)
}

macro_rules! reconcile_saml_scalars {
    ($old:ident, $new:ident, $api:ident; $($field:ident => $setter:ident, $equality:ident;)*) => {
        $(
            if let Some(value) = $new.$field.as_ref() {
                if is_changed(value, $old.$field.as_ref(), Equality::$equality) {
                    tracing::debug!(field = stringify!($field), "setting SAML response field");
                    $api.saml_response().$setter(value)?;
                }
            }
        )*
    };
}

fn reconcile_saml_fields(
    old: &SamlConfiguration,
    new: &SamlConfiguration,
    api: &dyn Api,
) -> ApiResult {
    reconcile_saml_scalars! { old, new, api;
        audience => set_audience, Strict;
        issuer => set_issuer, Strict;
        encryption_public_key => set_encryption_public_key, Strict;
        recipient => set_recipient, Strict;
        create_upn_claim => set_create_upn_claim, Loose;
        passthrough_claims_with_no_mapping => set_passthrough_claims_with_no_mapping, Strict;
        map_unknown_claims_as_is => set_map_unknown_claims_as_is, Strict;
        map_identities => set_map_identities, Strict;
        destination => set_destination, Strict;
        relay_state => set_relay_state, Strict;
        lifetime_in_seconds => set_lifetime_in_seconds, Loose;
        sign_response => set_sign_response, Strict;
        name_identifier_format => set_name_identifier_format, Strict;
        authn_context_class_ref => set_authn_context_class_ref, Strict;
        signing_cert => set_signing_cert, Strict;
        include_attribute_name_format => set_include_attribute_name_format, Strict;
        encryption_cert => set_encryption_cert, Strict;
        cert => set_cert, Strict;
        key => set_key, Strict;
        signature_algorithm => set_signature_algorithm, Strict;
        digest_algorithm => set_digest_algorithm, Strict;
    }
    Ok(())
}

fn reconcile_probes(old: &SamlConfiguration, new: &SamlConfiguration, api: &dyn Api) -> ApiResult {
    let probes = &new.name_identifier_probes;
    if !probes.is_empty() && !same_members(probes, &old.name_identifier_probes) {
        tracing::debug!(count = probes.len(), "setting SAML name identifier probes");
        api.saml_response().set_name_identifier_probes(probes)?;
    }
    Ok(())
}

fn reconcile_multifactor(old: &Context, new: &Context, api: &dyn Api) -> ApiResult {
    let Some(provider) = new.multifactor.provider.as_deref() else {
        return Ok(());
    };
    let old_provider = old.multifactor.provider.as_deref().map(Value::from);

    if is_changed(&Value::from(provider), old_provider.as_ref(), Equality::Loose) {
        tracing::debug!(provider, "enabling multifactor");
        api.multifactor().enable(provider, &new.multifactor.options)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Multifactor;
    use crate::recording::RecordingApi;
    use serde_json::json;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unchanged_context_makes_no_calls() {
        let api = RecordingApi::new();
        reconcile(&Context::default(), &Context::default(), &api).unwrap();
        assert!(api.is_empty());
    }

    #[test]
    fn new_claims_are_set() {
        let api = RecordingApi::new();
        let mut new = Context::default();
        new.set_id_token_claim("mockIDTokenClaim", "mockIDTokenValue");
        new.set_access_token_claim("mockAccessTokenClaim", "mockAccessTokenValue");

        reconcile(&Context::default(), &new, &api).unwrap();

        assert_eq!(
            api.calls_to("idToken.setCustomClaim"),
            vec![vec![json!("mockIDTokenClaim"), json!("mockIDTokenValue")]]
        );
        assert_eq!(
            api.calls_to("accessToken.setCustomClaim"),
            vec![vec![json!("mockAccessTokenClaim"), json!("mockAccessTokenValue")]]
        );
        assert_eq!(api.len(), 2);
    }

    #[test]
    fn falsy_and_unchanged_claims_are_skipped() {
        let api = RecordingApi::new();
        let mut old = Context::default();
        old.set_id_token_claim("same", "v");
        old.set_id_token_claim("coerced", 42);

        let mut new = old.clone();
        new.set_id_token_claim("empty", "");
        new.set_id_token_claim("zero", 0);
        new.set_id_token_claim("off", false);
        new.set_id_token_claim("null", Value::Null);
        new.set_id_token_claim("coerced", "42");

        reconcile(&old, &new, &api).unwrap();
        assert!(api.is_empty(), "{:?}", api.calls());
    }

    #[test]
    fn changed_claim_is_set_again() {
        let api = RecordingApi::new();
        let mut old = Context::default();
        old.set_id_token_claim("role", "user");
        let mut new = old.clone();
        new.set_id_token_claim("role", "admin");

        reconcile(&old, &new, &api).unwrap();
        assert!(api.was_called_with("idToken.setCustomClaim", &[json!("role"), json!("admin")]));
    }

    #[test]
    fn removed_claims_are_not_retracted() {
        let api = RecordingApi::new();
        let mut old = Context::default();
        old.set_id_token_claim("gone", "v");

        reconcile(&old, &Context::default(), &api).unwrap();
        assert!(api.is_empty());
    }

    #[test]
    fn saml_mappings_are_set() {
        let api = RecordingApi::new();
        let mut new = Context::default();
        new.saml_configuration
            .mappings
            .insert("mockSAMLClaim".to_string(), json!("mockSAMLValue"));

        reconcile(&Context::default(), &new, &api).unwrap();
        assert!(api.was_called_with(
            "samlResponse.setAttribute",
            &[json!("mockSAMLClaim"), json!("mockSAMLValue")]
        ));
    }

    #[test]
    fn every_saml_scalar_has_its_setter() {
        let api = RecordingApi::new();
        let mut new = Context::default();
        let saml = &mut new.saml_configuration;
        saml.audience = Some(json!("mockAudience"));
        saml.issuer = Some(json!("mockIssuer"));
        saml.encryption_public_key = Some(json!("mockEncryptionPublicKey"));
        saml.recipient = Some(json!("mockRecipient"));
        saml.create_upn_claim = Some(json!(true));
        saml.passthrough_claims_with_no_mapping = Some(json!(true));
        saml.map_unknown_claims_as_is = Some(json!(true));
        saml.map_identities = Some(json!(true));
        saml.destination = Some(json!("mockDestination"));
        saml.relay_state = Some(json!("mockRelayState"));
        saml.lifetime_in_seconds = Some(json!(3600));
        saml.sign_response = Some(json!(true));
        saml.name_identifier_format = Some(json!("mockNameIdentifierFormat"));
        saml.authn_context_class_ref = Some(json!("mockAuthnContextClassRef"));
        saml.signing_cert = Some(json!("mockSigningCert"));
        saml.include_attribute_name_format = Some(json!(true));
        saml.encryption_cert = Some(json!("mockEncryptionCert"));
        saml.cert = Some(json!("mockCert"));
        saml.key = Some(json!("mockKey"));
        saml.signature_algorithm = Some(json!("rsa-sha256"));
        saml.digest_algorithm = Some(json!("sha256"));

        reconcile(&Context::default(), &new, &api).unwrap();

        let expected = [
            ("samlResponse.setAudience", json!("mockAudience")),
            ("samlResponse.setIssuer", json!("mockIssuer")),
            ("samlResponse.setEncryptionPublicKey", json!("mockEncryptionPublicKey")),
            ("samlResponse.setRecipient", json!("mockRecipient")),
            ("samlResponse.setCreateUpnClaim", json!(true)),
            ("samlResponse.setPassthroughClaimsWithNoMapping", json!(true)),
            ("samlResponse.setMapUnknownClaimsAsIs", json!(true)),
            ("samlResponse.setMapIdentities", json!(true)),
            ("samlResponse.setDestination", json!("mockDestination")),
            ("samlResponse.setRelayState", json!("mockRelayState")),
            ("samlResponse.setLifetimeInSeconds", json!(3600)),
            ("samlResponse.setSignResponse", json!(true)),
            ("samlResponse.setNameIdentifierFormat", json!("mockNameIdentifierFormat")),
            ("samlResponse.setAuthnContextClassRef", json!("mockAuthnContextClassRef")),
            ("samlResponse.setSigningCert", json!("mockSigningCert")),
            ("samlResponse.setIncludeAttributeNameFormat", json!(true)),
            ("samlResponse.setEncryptionCert", json!("mockEncryptionCert")),
            ("samlResponse.setCert", json!("mockCert")),
            ("samlResponse.setKey", json!("mockKey")),
            ("samlResponse.setSignatureAlgorithm", json!("rsa-sha256")),
            ("samlResponse.setDigestAlgorithm", json!("sha256")),
        ];
        for (method, value) in &expected {
            assert_eq!(api.calls_to(method), vec![vec![value.clone()]], "{method}");
        }
        assert_eq!(api.len(), expected.len());
    }

    #[test]
    fn saml_scalars_compare_with_their_own_equality() {
        let api = RecordingApi::new();
        let mut old = Context::default();
        old.saml_configuration.lifetime_in_seconds = Some(json!(3600));
        old.saml_configuration.create_upn_claim = Some(json!(1));
        old.saml_configuration.audience = Some(json!(1));

        let mut new = Context::default();
        new.saml_configuration.lifetime_in_seconds = Some(json!("3600"));
        new.saml_configuration.create_upn_claim = Some(json!(true));
        new.saml_configuration.audience = Some(json!("1"));

        reconcile(&old, &new, &api).unwrap();
        assert_eq!(api.calls_to("samlResponse.setAudience"), vec![vec![json!("1")]]);
        assert!(!api.was_called("samlResponse.setLifetimeInSeconds"));
        assert!(!api.was_called("samlResponse.setCreateUpnClaim"));
    }

    #[test]
    fn falsy_saml_scalars_are_skipped() {
        let api = RecordingApi::new();
        let mut new = Context::default();
        new.saml_configuration.sign_response = Some(json!(false));
        new.saml_configuration.lifetime_in_seconds = Some(json!(0));
        new.saml_configuration.issuer = Some(json!(""));

        reconcile(&Context::default(), &new, &api).unwrap();
        assert!(api.is_empty());
    }

    #[test]
    fn name_identifiers_with_new_members_are_set() {
        let cases = [
            (&["email"][..], &["email", "username"][..]),
            (&["email"][..], &["username"][..]),
        ];
        for (old, new) in cases {
            let api = RecordingApi::new();
            let mut old_ctx = Context::default();
            old_ctx.saml_configuration.name_identifier_probes = strings(old);
            let mut new_ctx = Context::default();
            new_ctx.saml_configuration.name_identifier_probes = strings(new);

            reconcile(&old_ctx, &new_ctx, &api).unwrap();
            assert_eq!(
                api.calls_to("samlResponse.setNameIdentifierProbes"),
                vec![vec![json!(new)]]
            );
        }
    }

    #[test]
    fn reordered_or_empty_name_identifiers_are_skipped() {
        let api = RecordingApi::new();
        let mut old = Context::default();
        old.saml_configuration.name_identifier_probes = strings(&["email", "username"]);
        let mut new = Context::default();
        new.saml_configuration.name_identifier_probes = strings(&["username", "email"]);

        reconcile(&old, &new, &api).unwrap();
        reconcile(&old, &Context::default(), &api).unwrap();
        assert!(api.is_empty());
    }

    #[test]
    fn multifactor_forwards_options_without_provider() {
        let api = RecordingApi::new();
        let mut new = Context::default();
        new.multifactor = Multifactor::provider("any").with_option("allowRememberBrowser", false);

        reconcile(&Context::default(), &new, &api).unwrap();
        assert_eq!(
            api.calls_to("multifactor.enable"),
            vec![vec![json!("any"), json!({ "allowRememberBrowser": false })]]
        );
    }

    #[test]
    fn multifactor_skips_unchanged_or_empty_provider() {
        let api = RecordingApi::new();
        let mut old = Context::default();
        old.multifactor = Multifactor::provider("guardian");
        let mut new = Context::default();
        new.multifactor =
            Multifactor::provider("guardian").with_option("allowRememberBrowser", true);

        reconcile(&old, &new, &api).unwrap();
        let empty_provider = Context {
            multifactor: Multifactor::provider(""),
            ..Context::default()
        };
        reconcile(&Context::default(), &empty_provider, &api).unwrap();
        assert!(api.is_empty());
    }

    #[test]
    fn scope_list_is_diffed() {
        let api = RecordingApi::new();
        let mut old = Context::default();
        old.set_access_token_claim("scope", json!(["openid", "profile"]));
        let mut new = Context::default();
        new.set_access_token_claim("scope", json!(["openid", "read:messages"]));

        reconcile(&old, &new, &api).unwrap();
        assert_eq!(api.calls_to("accessToken.addScope"), vec![vec![json!("read:messages")]]);
        assert_eq!(api.calls_to("accessToken.removeScope"), vec![vec![json!("profile")]]);
        assert!(!api.was_called("accessToken.setCustomClaim"));
    }

    #[test]
    fn non_array_scope_is_an_ordinary_claim() {
        let api = RecordingApi::new();
        let mut new = Context::default();
        new.set_access_token_claim("scope", "openid profile");

        reconcile(&Context::default(), &new, &api).unwrap();
        assert!(api.was_called_with(
            "accessToken.setCustomClaim",
            &[json!("scope"), json!("openid profile")]
        ));
        assert!(!api.was_called("accessToken.addScope"));
    }

    #[test]
    fn api_failure_stops_reconciliation() {
        let api = RecordingApi::new();
        api.fail_on("idToken.setCustomClaim");
        let mut new = Context::default();
        new.set_id_token_claim("a", "1");
        new.multifactor = Multifactor::provider("any");

        let err = reconcile(&Context::default(), &new, &api).unwrap_err();
        assert_eq!(err.method(), "idToken.setCustomClaim");
        assert!(!api.was_called("multifactor.enable"));
    }
}
