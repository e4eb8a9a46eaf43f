//! Event to context projection.

use crate::context::{Context, ContextGeoIp, ContextRequest, Sso};
use crate::event::{Event, GeoIp};
use crate::secrets;

/// Builds the rule-facing context for `event`.
///
/// The context owns copies of everything it takes from the event, so a rule
/// mutating it never affects the event. Event fields the context has no slot
/// for are dropped.
///
/// Side effect: publishes `event.secrets` as the current scope's
/// [`configuration`](crate::secrets::configuration), where legacy rule bodies
/// expect to find it. Outside a configuration scope this is a no-op.
pub fn map_event_to_context(event: &Event) -> Context {
    let context = Context {
        tenant: event.tenant.id.clone(),
        client_id: event.client.client_id.clone(),
        client_name: event.client.name.clone(),
        client_metadata: event.client.metadata.clone(),
        connection_id: event.connection.id.clone(),
        connection: event.connection.name.clone(),
        connection_strategy: event.connection.strategy.clone(),
        connection_metadata: event.connection.metadata.clone(),
        protocol: event.transaction.as_ref().and_then(|t| t.protocol.clone()),
        risk_assessment: event
            .authentication
            .as_ref()
            .and_then(|a| a.risk_assessment.clone()),
        stats: event.stats.clone(),
        session_id: event.session.as_ref().and_then(|s| s.id.clone()),
        request: ContextRequest {
            user_agent: event.request.user_agent.clone(),
            geoip: event.request.geoip.as_ref().map(project_geoip),
            extra: event.request.extra.clone(),
        },
        authentication: event.authentication.as_ref().and_then(|a| a.methods.clone()),
        authorization: event.authorization.clone(),
        organization: event.organization.clone(),
        sso: Sso {
            current_clients: event.session.as_ref().and_then(|s| s.clients.clone()),
        },
        ..Context::default()
    };

    secrets::publish(event.secrets.clone());

    context
}

fn project_geoip(geoip: &GeoIp) -> ContextGeoIp {
    ContextGeoIp {
        country_code: geoip.country_code.clone(),
        country_code3: geoip.country_code3.clone(),
        country_name: geoip.country_name.clone(),
        city_name: geoip.city_name.clone(),
        latitude: geoip.latitude,
        longitude: geoip.longitude,
        time_zone: geoip.time_zone.clone(),
        continent_code: geoip.continent_code.clone(),
        subdivision_code: geoip.subdivision_code.clone(),
        subdivision_name: geoip.subdivision_name.clone(),
    }
}
