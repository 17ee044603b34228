//! WebSocket endpoint for dashboard clients.
//!
//! One route: `GET /ws` upgrades to the persistent bidirectional
//! channel. Each connection registers with the broadcast hub and feeds
//! inbound frames to the command dispatcher. There is no authentication
//! and no other endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pmdash_protocol::DashboardCommand;

use crate::dispatch::CommandDispatcher;
use crate::hub::{BroadcastHub, CLIENT_CHANNEL_CAPACITY};

/// Default TCP port for the dashboard channel.
pub const DEFAULT_PORT: u16 = 8090;

/// Shared state handed to the WebSocket route.
#[derive(Clone)]
struct AppState {
    hub: BroadcastHub,
    dispatcher: Arc<CommandDispatcher>,
}

/// The WebSocket server dashboard clients connect to.
pub struct DashboardServer {
    port: u16,
    hub: BroadcastHub,
    dispatcher: Arc<CommandDispatcher>,
    cancel_token: CancellationToken,
}

impl DashboardServer {
    /// Creates a new server.
    pub fn new(
        port: u16,
        hub: BroadcastHub,
        dispatcher: Arc<CommandDispatcher>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            port,
            hub,
            dispatcher,
            cancel_token,
        }
    }

    /// Runs the server until the cancellation token is triggered.
    pub async fn run(&self) -> Result<(), ServerError> {
        let state = AppState {
            hub: self.hub.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
        };

        let app = Router::new().route("/ws", get(ws_handler)).with_state(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr,
                error: e.to_string(),
            })?;

        info!(addr = %addr, "Dashboard server listening");

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("Server shutdown requested");
            })
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        info!("Server stopped");
        Ok(())
    }
}

/// Upgrades an incoming connection to the dashboard channel.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Runs one client connection until it closes.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let (tx, mut rx) = mpsc::channel::<Message>(CLIENT_CHANNEL_CAPACITY);
    let subscriber_id = state.hub.subscribe(tx).await;
    info!(subscriber = subscriber_id, "Dashboard client connected");

    // Writer task: pumps hub broadcasts into the socket. Ends when the
    // hub drops the sender (unsubscribe) or the socket dies.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match DashboardCommand::parse(&text) {
                Ok(command) => state.dispatcher.handle(command).await,
                Err(e) => {
                    // Garbled frames must not take down the connection.
                    warn!(
                        subscriber = subscriber_id,
                        error = %e,
                        "Dropping malformed client frame"
                    );
                }
            },
            Ok(Message::Close(_)) => {
                debug!(subscriber = subscriber_id, "Client sent close frame");
                break;
            }
            Ok(_) => {
                // Ping/pong is answered by the protocol layer; binary
                // frames have no meaning on this channel.
            }
            Err(e) => {
                debug!(subscriber = subscriber_id, error = %e, "Client connection error");
                break;
            }
        }
    }

    state.hub.unsubscribe(subscriber_id).await;
    writer.abort();
    info!(subscriber = subscriber_id, "Dashboard client disconnected");
}

/// Errors that can occur while running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("server error: {0}")]
    Serve(String),
}
