use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use ripple_api::auth::{self, AppState, AppStateInner};
use ripple_api::middleware::require_auth;
use ripple_api::{messages, notifications};
use ripple_db::Database;
use ripple_gateway::connection;
use ripple_gateway::coordinator::Coordinator;
use ripple_gateway::dispatcher::Dispatcher;
use ripple_gateway::media::{DisabledMediaStore, HttpMediaStore, MediaStore};
use ripple_types::api::Claims;

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub media_url: Option<String>,
}

impl Config {
    /// Environment-driven config with dev defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            jwt_secret: std::env::var("RIPPLE_JWT_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-me".into()),
            db_path: std::env::var("RIPPLE_DB_PATH")
                .unwrap_or_else(|_| "ripple.db".into())
                .into(),
            host: std::env::var("RIPPLE_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("RIPPLE_PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()?,
            media_url: std::env::var("RIPPLE_MEDIA_URL").ok(),
        })
    }
}

/// Build the full application router: shared state, REST surface, gateway
/// upgrade, CORS and tracing layers.
pub fn build_app(config: &Config) -> anyhow::Result<Router> {
    let db = Arc::new(Database::open(&config.db_path)?);
    let dispatcher = Dispatcher::new();

    let media: Arc<dyn MediaStore> = match &config.media_url {
        Some(url) => Arc::new(HttpMediaStore::new(url.clone())),
        None => Arc::new(DisabledMediaStore),
    };
    let coordinator = Coordinator::new(db.clone(), dispatcher.clone(), media);

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        coordinator,
        dispatcher,
    });

    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/messages", post(messages::send_message))
        .route("/conversations", get(messages::list_conversations))
        .route(
            "/conversations/{conversation_id}/messages",
            get(messages::list_messages),
        )
        .route(
            "/conversations/{conversation_id}/seen",
            post(messages::mark_seen),
        )
        .route("/interactions", post(notifications::create_interaction))
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/{notification_id}/read",
            post(notifications::mark_read),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    Ok(Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http()))
}

#[derive(Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // Resolve the identity before upgrading; an unresolvable token still
    // gets a socket, just an anonymous one.
    let identity = query.token.as_deref().and_then(|token| {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| warn!("gateway upgrade with unresolvable token: {}", e))
        .ok()
    });

    ws.on_upgrade(move |socket| async move {
        match identity {
            Some(token_data) => {
                connection::handle_connection(
                    socket,
                    state.dispatcher.clone(),
                    state.coordinator.clone(),
                    token_data.claims.sub,
                    token_data.claims.username,
                )
                .await
            }
            None => connection::handle_connection_anonymous(socket).await,
        }
    })
}
