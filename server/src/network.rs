//! Server network layer handling WebSocket connections and session tasks

use crate::admission::{client_ip, Denial};
use crate::broadcast::Outbound;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::game::GameState;
use crate::liveness;
use crate::session::Session;
use futures_util::stream::SplitSink;
use futures_util::{Sink, SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ServerEvent, CLOSE_RATE_LIMITED};
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

const FORWARDED_FOR: &str = "x-forwarded-for";
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Accepts connections and runs one handler task per client
pub struct Server {
    listener: TcpListener,
    state: Arc<Mutex<GameState>>,
    config: Arc<ServerConfig>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            state: Arc::new(Mutex::new(GameState::new(&config))),
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> Arc<Mutex<GameState>> {
        Arc::clone(&self.state)
    }

    /// Runs the accept loop and heartbeat monitor until the future is dropped
    pub async fn run(self) -> Result<(), ServerError> {
        let monitor = liveness::spawn_monitor(self.state(), self.config.heartbeat_interval);
        info!("Server started successfully");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let state = Arc::clone(&self.state);
                    let config = Arc::clone(&self.config);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, state, config).await {
                            debug!("Connection from {} ended with error: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }

            if monitor.is_finished() {
                return Err(ServerError::MonitorStopped);
            }
        }
    }
}

/// Drives one client from handshake to teardown
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<Mutex<GameState>>,
    config: Arc<ServerConfig>,
) -> Result<(), ServerError> {
    let mut forwarded_for: Option<String> = None;
    let ws_stream = accept_hdr_async(
        stream,
        |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            forwarded_for = request
                .headers()
                .get(FORWARDED_FOR)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            Ok(response)
        },
    )
    .await?;

    let ip = client_ip(forwarded_for.as_deref(), peer);
    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, rx) = mpsc::unbounded_channel::<Outbound>();

    let admitted = state.lock().await.open_session(ip, tx.clone());
    let id = match admitted {
        Ok(id) => id,
        Err(denial) => {
            reject(ws_sender, denial).await;
            return Ok(());
        }
    };

    let mut session = Session::new(id, ip, config.rate_limit, Instant::now());
    let mut writer = tokio::spawn(write_outbound(ws_sender, rx));
    let mut writer_finished = false;

    loop {
        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !session.accept_message(Instant::now()) {
                        rate_limited(&tx, &session);
                        break;
                    }
                    state.lock().await.handle_message(id, &text, Instant::now());
                }
                Some(Ok(Message::Binary(_))) => {
                    if !session.accept_message(Instant::now()) {
                        rate_limited(&tx, &session);
                        break;
                    }
                    debug!("Dropped binary frame from {}", id);
                }
                Some(Ok(Message::Pong(_))) => state.lock().await.mark_alive(id),
                Some(Ok(Message::Close(_))) | None => {
                    debug!("Client {} disconnected", id);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("WebSocket error for {}: {}", id, e);
                    break;
                }
            },
            _ = &mut writer => {
                writer_finished = true;
                break;
            }
        }
    }

    state.lock().await.close_session(id);
    drop(tx);
    if !writer_finished {
        drain_writer(writer, WRITER_DRAIN_TIMEOUT).await;
    }
    Ok(())
}

/// Gives the writer `limit` to flush what is queued, then aborts it
async fn drain_writer(mut writer: JoinHandle<()>, limit: Duration) -> bool {
    if tokio::time::timeout(limit, &mut writer).await.is_ok() {
        return true;
    }
    debug!("Writer did not drain within {:?}, aborting", limit);
    writer.abort();
    false
}

fn rate_limited(tx: &mpsc::UnboundedSender<Outbound>, session: &Session) {
    warn!(
        "Session {} from {} exceeded rate limit ({} messages)",
        session.id,
        session.ip,
        session.message_count()
    );
    let _ = tx.send(Outbound::Close {
        code: CLOSE_RATE_LIMITED,
        reason: "rate limit exceeded".to_string(),
    });
}

/// Best-effort error event and close frame for a denied connection
async fn reject<S>(mut sink: S, denial: Denial)
where
    S: Sink<Message> + Unpin,
{
    let event = ServerEvent::Error {
        code: denial.code,
        reason: denial.reason.to_string(),
    };
    if let Ok(text) = event.to_json() {
        let _ = sink.send(Message::Text(text)).await;
    }
    let _ = sink
        .send(Message::Close(Some(close_frame(denial.code, denial.reason))))
        .await;
}

fn close_frame(code: u16, reason: impl Into<Cow<'static, str>>) -> CloseFrame<'static> {
    CloseFrame {
        code: CloseCode::from(code),
        reason: reason.into(),
    }
}

/// Drains a connection's outbound queue into its socket until the queue
/// closes, a close or terminate is requested, or the socket fails
async fn write_outbound(mut sink: WsSink, mut rx: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(outbound) = rx.recv().await {
        let message = match outbound {
            Outbound::Text(text) => Message::Text(text),
            Outbound::Ping => Message::Ping(Vec::new()),
            Outbound::Close { code, reason } => {
                let _ = sink.send(Message::Close(Some(close_frame(code, reason)))).await;
                return;
            }
            Outbound::Terminate => return,
        };

        if let Err(e) = sink.send(message).await {
            debug!("Send failed, stopping writer: {}", e);
            return;
        }
    }

    let _ = sink.close().await;
}
