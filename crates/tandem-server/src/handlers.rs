//! Connection handlers for the Tandem server.
//!
//! Each connection gets a receive loop, which feeds inbound frames to the
//! relay in arrival order, and a writer task, which drains the connection's
//! outbound queue to the socket and sends heartbeat pings.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard, Direction};
use anyhow::{Context, Result};
use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{ConnectionId, Relay, RelayConfig};
use tandem_protocol::{codec, ServerFrame};
use tandem_transport::{Connection, FrameSink, FrameStream, Inbound, WebSocketConnection};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// How long a closing connection's writer may take to flush.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared server state.
pub struct AppState {
    /// The chat relay.
    pub relay: Relay,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let relay_config = RelayConfig {
            outbound_buffer: config.limits.outbound_buffer,
            ..RelayConfig::default()
        };

        Self {
            relay: Relay::with_config(relay_config),
            config,
        }
    }
}

/// Build the HTTP router.
pub fn build_app(state: Arc<AppState>) -> Router {
    let ws_path = state.config.transport.websocket_path.clone();
    Router::new()
        .route(&ws_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Serve on an already bound listener until the server stops.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let app = build_app(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Tandem server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    serve(listener, Arc::new(AppState::new(config))).await
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.relay.stats();
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": stats.connections,
        "rooms": stats.rooms,
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    // Soft limit: concurrent upgrades may overshoot by a few.
    if state.relay.registry().len() >= state.config.limits.max_connections {
        warn!(remote = %addr, "Connection limit reached, rejecting upgrade");
        metrics::record_error("capacity");
        return (StatusCode::SERVICE_UNAVAILABLE, "Server at capacity").into_response();
    }

    ws.max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| {
            serve_connection(WebSocketConnection::new(socket, Some(addr)), state)
        })
}

/// Drive one connection until it closes.
///
/// Reads frames strictly in order and hands them to the relay. Ends on
/// transport close, transport error, writer failure or heartbeat timeout;
/// in every case the connection is disconnected from the relay, which frees
/// its room slot.
pub async fn serve_connection<C: Connection>(conn: C, state: Arc<AppState>) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let remote = conn.remote_addr();
    let (id, outbound) = state.relay.connect();
    debug!(connection = %id, remote = ?remote, "Connection opened");

    let (sink, mut stream) = conn.split();
    let heartbeat = &state.config.heartbeat;
    let mut writer = tokio::spawn(write_loop(id, sink, outbound, heartbeat.ping_interval()));
    let mut writer_done = false;

    let idle_timeout = heartbeat.idle_timeout();
    let mut deadline = idle_timeout.map(|t| Instant::now() + t);

    loop {
        tokio::select! {
            _ = &mut writer => {
                debug!(connection = %id, "Writer stopped");
                writer_done = true;
                break;
            }

            _ = idle(deadline) => {
                info!(connection = %id, "Heartbeat timeout, closing connection");
                metrics::record_error("heartbeat_timeout");
                break;
            }

            item = stream.recv() => {
                match item {
                    Ok(Some(Inbound::Frame(data))) => {
                        deadline = idle_timeout.map(|t| Instant::now() + t);
                        metrics::record_frame(data.len(), Direction::Inbound);

                        let start = std::time::Instant::now();
                        if let Err(e) = state.relay.handle_frame(id, &data) {
                            metrics::record_rejection(e.action());
                        }
                        metrics::record_latency(start.elapsed().as_secs_f64());
                        metrics::set_active_rooms(state.relay.directory().len());
                    }
                    Ok(Some(Inbound::Heartbeat)) => {
                        deadline = idle_timeout.map(|t| Instant::now() + t);
                    }
                    Ok(None) => {
                        debug!(connection = %id, "Peer closed connection");
                        break;
                    }
                    Err(e) => {
                        warn!(connection = %id, error = %e, "Transport error");
                        metrics::record_error("transport");
                        break;
                    }
                }
            }
        }
    }

    // Dropping the registry entry closes the outbound queue, so the writer
    // flushes what is left and closes the socket.
    state.relay.disconnect(id);
    metrics::set_active_rooms(state.relay.directory().len());

    if !writer_done && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        debug!(connection = %id, "Writer did not drain in time");
        writer.abort();
    }

    debug!(connection = %id, "Connection finished");
}

/// Drain the outbound queue into the sink, pinging on an interval.
///
/// Returns when the queue closes or a write fails.
async fn write_loop<S: FrameSink>(
    id: ConnectionId,
    mut sink: S,
    mut outbound: mpsc::Receiver<ServerFrame>,
    ping_interval: Option<Duration>,
) {
    let mut ticker = ping_interval.map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                let text = match codec::encode(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        error!(connection = %id, error = %e, "Failed to encode frame");
                        metrics::record_error("encode");
                        continue;
                    }
                };
                let len = text.len();
                if let Err(e) = sink.send_text(text).await {
                    debug!(connection = %id, error = %e, "Send failed");
                    metrics::record_error("send");
                    return;
                }
                metrics::record_frame(len, Direction::Outbound);
            }

            _ = tick(&mut ticker) => {
                if let Err(e) = sink.ping().await {
                    debug!(connection = %id, error = %e, "Ping failed");
                    return;
                }
            }
        }
    }

    let _ = sink.close().await;
}

async fn idle(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
