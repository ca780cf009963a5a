use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use wren_api::{ApiState, ApiStateInner, bank, conversations, friends};
use wren_db::Database;
use wren_gateway::connection;
use wren_gateway::registry::SessionRegistry;
use wren_gateway::services::Services;

#[derive(Clone)]
struct ServerState {
    db: Arc<Database>,
    registry: SessionRegistry,
    services: Arc<Services>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wren=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("WREN_DB_PATH").unwrap_or_else(|_| "wren.db".into());
    let host = std::env::var("WREN_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("WREN_PORT")
        .unwrap_or_else(|_| "9092".into())
        .parse()?;

    // Init database
    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let registry = SessionRegistry::new();
    let services = Arc::new(Services::new(db.clone(), registry.clone()));
    let api_state: ApiState = Arc::new(ApiStateInner { db: db.clone() });

    let state = ServerState {
        db,
        registry,
        services,
    };

    // Read-only REST surface
    let api_routes = Router::new()
        .route("/users/{user_id}/conversations", get(conversations::list_conversations))
        .route("/users/{user_id}/balance", get(bank::get_balance))
        .route("/users/{user_id}/transactions", get(bank::get_transactions))
        .route("/users/{user_id}/friends", get(friends::list_friends))
        .route("/users/{user_id}/friend-requests", get(friends::pending_requests))
        .route("/conversations/{conversation_id}/messages", get(conversations::get_messages))
        .route("/conversations/{conversation_id}/read", post(conversations::mark_read))
        .with_state(api_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(api_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Wren server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.registry, state.db, state.services)
    })
}
