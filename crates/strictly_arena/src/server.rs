//! HTTP and WebSocket transport.
//!
//! Each socket is authenticated before upgrade, then bridged to the
//! dispatcher through [`GatewayEvent`]s. Frames going out are drained from
//! the connection's outbox by a writer task.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::auth::{AuthError, AuthVerifier, TokenTableVerifier};
use crate::config::ArenaConfig;
use crate::gateway::{Gateway, GatewayEvent, TokioScheduler};
use crate::opponent::RandomOpponent;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::ConnectionId;
use crate::session::Identity;
use crate::store::{MemoryStore, PersistenceStore, SqliteStore};

/// Shared state of the HTTP layer.
#[derive(Clone)]
pub struct AppState {
    events: mpsc::UnboundedSender<GatewayEvent>,
    verifier: Arc<dyn AuthVerifier>,
    next_connection: Arc<AtomicU64>,
}

impl AppState {
    /// Creates the HTTP state over a dispatcher channel.
    pub fn new(events: mpsc::UnboundedSender<GatewayEvent>, verifier: Arc<dyn AuthVerifier>) -> Self {
        Self {
            events,
            verifier,
            next_connection: Arc::new(AtomicU64::new(1)),
        }
    }

    fn allocate_connection(&self) -> ConnectionId {
        ConnectionId::new(self.next_connection.fetch_add(1, Ordering::Relaxed))
    }
}

/// Query parameters of the WebSocket endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Claimed identity.
    pub identity: Option<String>,
    /// Bearer token, for clients that cannot set headers.
    pub token: Option<String>,
}

/// Builds the router: `/ws` for play and `/health` for probes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Checks the presented credentials and returns the verified identity.
///
/// The token comes from an `Authorization: Bearer` header, falling back to
/// the `token` query parameter.
#[instrument(skip_all)]
pub async fn authenticate(
    verifier: &dyn AuthVerifier,
    headers: &HeaderMap,
    params: &ConnectParams,
) -> Result<Identity, AuthError> {
    let identity = params
        .identity
        .as_deref()
        .ok_or_else(|| AuthError::new("Missing identity"))?;

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    let token = bearer
        .or(params.token.as_deref())
        .ok_or_else(|| AuthError::new("Missing token"))?;

    verifier.verify(token, identity).await
}

async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    // Credentials are checked before the upgrade request itself.
    let identity = match authenticate(state.verifier.as_ref(), &headers, &params).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(error = %e, "Connection refused");
            return (StatusCode::UNAUTHORIZED, e.message).into_response();
        }
    };

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            warn!(error = %rejection, "Not a WebSocket upgrade");
            return rejection.into_response();
        }
    };

    let connection = state.allocate_connection();
    info!(connection_id = %connection, identity = %identity, "Upgrading connection");
    upgrade.on_upgrade(move |socket| run_connection(socket, state.events, connection, identity))
}

/// Bridges one socket to the dispatcher until either side closes.
#[instrument(skip(socket, events), fields(connection_id = %connection))]
async fn run_connection(
    socket: WebSocket,
    events: mpsc::UnboundedSender<GatewayEvent>,
    connection: ConnectionId,
    identity: Identity,
) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut outbound) = mpsc::unbounded_channel::<ServerMessage>();

    if events
        .send(GatewayEvent::Connected {
            connection,
            identity,
            outbox: outbox.clone(),
        })
        .is_err()
    {
        error!("Dispatcher unavailable");
        return;
    }

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let json = match message.to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "Failed to encode frame");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                debug!("Socket closed while writing");
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "Socket read failed");
                break;
            }
        };

        match ClientMessage::from_json(text.as_str()) {
            Ok(message) => {
                if events.send(GatewayEvent::Message { connection, message }).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Malformed frame");
                let _ = outbox.send(ServerMessage::Error {
                    message: format!("Malformed message: {}", e),
                });
            }
        }
    }

    info!("Connection closed");
    let _ = events.send(GatewayEvent::Disconnected { connection });
    drop(outbox);
    let _ = writer.await;
}

/// Runs the server until ctrl-c.
#[instrument(skip_all, fields(host = %config.host(), port = config.port()))]
pub async fn serve(config: ArenaConfig) -> anyhow::Result<()> {
    let store: Arc<dyn PersistenceStore> = match config.database_path() {
        Some(path) => Arc::new(SqliteStore::open(path)?),
        None => {
            warn!("No database configured, results are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let verifier = TokenTableVerifier::new(
        config
            .tokens()
            .iter()
            .map(|entry| (entry.token().clone(), entry.identity().clone())),
    );

    let (events, receiver) = mpsc::unbounded_channel();
    let gateway = Gateway::new(
        store,
        Box::new(TokioScheduler::new(events.clone())),
        RandomOpponent::from_entropy(),
        config.opponent_delay(),
    );
    let dispatcher = tokio::spawn(gateway.run(receiver));

    let app = router(AppState::new(events.clone(), Arc::new(verifier)));
    let listener = tokio::net::TcpListener::bind((config.host().as_str(), *config.port())).await?;
    info!("Server ready at ws://{}:{}/ws", config.host(), config.port());

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown requested");
        })
        .await?;

    let _ = events.send(GatewayEvent::Shutdown);
    dispatcher.await?;
    Ok(())
}
