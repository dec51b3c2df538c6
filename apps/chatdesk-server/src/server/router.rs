use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use anyhow::anyhow;
use axum::{
    extract::ConnectInfo,
    extract::DefaultBodyLimit,
    http::{request::Request, HeaderName, StatusCode},
    routing::get,
    routing::post,
    Router,
};
use tower::ServiceBuilder;
use tower_governor::{
    errors::GovernorError, governor::GovernorConfigBuilder, key_extractor::KeyExtractor,
    GovernorLayer,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::{
    core::{AppConfig, AppState},
    handlers::{
        auth::{login, me},
        conversations::{get_conversation_messages, list_conversations},
        dashboard::{dashboard_board, dashboard_metrics, dashboard_timeseries},
        users::{create_user, delete_user, get_user, list_users, update_user},
    },
    types::health,
};

#[derive(Clone)]
struct PeerIpKeyExtractor;

impl KeyExtractor for PeerIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let peer_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|value| value.0.ip())
            .or_else(|| req.extensions().get::<SocketAddr>().map(SocketAddr::ip));
        Ok(peer_ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)))
    }
}

/// Build the axum router with global security middleware.
///
/// # Errors
/// Returns an error if configured security limits are invalid or state
/// initialization fails.
pub fn build_router(config: &AppConfig) -> anyhow::Result<Router> {
    let app_state = AppState::new(config)?;
    build_router_with_state(config, app_state)
}

pub(crate) fn build_router_with_state(
    config: &AppConfig,
    app_state: AppState,
) -> anyhow::Result<Router> {
    if config.rate_limit_requests_per_minute == 0 {
        return Err(anyhow!(
            "rate limit must be at least 1 request per minute"
        ));
    }
    if config.max_body_bytes == 0 {
        return Err(anyhow!("request body limit must be at least 1 byte"));
    }

    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .period(Duration::from_secs(60))
            .burst_size(config.rate_limit_requests_per_minute)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow!("invalid governor configuration"))?,
    );
    let request_id_header = HeaderName::from_static("x-request-id");
    let governor_layer = GovernorLayer::new(governor_config);

    let routes = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/dashboard/metrics", get(dashboard_metrics))
        .route("/dashboard/timeseries", get(dashboard_timeseries))
        .route("/dashboard/conversations", get(dashboard_board))
        .route("/conversations", get(list_conversations))
        .route(
            "/conversations/{conversation_id}/messages",
            get(get_conversation_messages),
        )
        .route("/users", post(create_user).get(list_users))
        .route(
            "/users/{user_id}",
            get(get_user).patch(update_user).delete(delete_user),
        );

    Ok(routes
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
                .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.request_timeout,
                ))
                .layer(governor_layer),
        ))
}
