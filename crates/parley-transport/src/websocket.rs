//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Each WebSocket text message carries exactly one frame. Binary messages
//! are accepted when they hold valid UTF-8.

use std::net::SocketAddr;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::{
    Connection, ConnectionId, Dialer, MAX_FRAME_LENGTH, Transport,
    TransportError,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn ws_io_error(
    kind: std::io::ErrorKind,
    e: tokio_tungstenite::tungstenite::Error,
) -> std::io::Error {
    std::io::Error::new(kind, e)
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    async fn accept(&mut self) -> Result<Self::Connection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(MaybeTlsStream::Plain(stream))
            .await
            .map_err(|e| {
                TransportError::AcceptFailed(ws_io_error(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let conn = WebSocketConnection::new(ws, addr);
        tracing::debug!(id = %conn.id, %addr, "accepted WebSocket connection");
        Ok(conn)
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

/// Opens [`WebSocketConnection`]s to `ws://host:port`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketDialer;

impl Dialer for WebSocketDialer {
    type Connection = WebSocketConnection;

    async fn dial(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Self::Connection, TransportError> {
        let url = format!("ws://{host}:{port}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| {
                TransportError::ConnectFailed(ws_io_error(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let addr = match ws.get_ref() {
            MaybeTlsStream::Plain(stream) => {
                stream.peer_addr().map_err(TransportError::ConnectFailed)?
            }
            _ => {
                return Err(TransportError::ConnectFailed(
                    std::io::Error::other("unexpected TLS stream"),
                ));
            }
        };

        let conn = WebSocketConnection::new(ws, addr);
        tracing::debug!(id = %conn.id, %url, "connected over WebSocket");
        Ok(conn)
    }
}

/// A single WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    remote_addr: SocketAddr,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: CancellationToken,
}

impl WebSocketConnection {
    fn new(ws: WsStream, remote_addr: SocketAddr) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id: ConnectionId::next(),
            remote_addr,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: CancellationToken::new(),
        }
    }

    async fn next_frame(
        stream: &mut SplitStream<WsStream>,
    ) -> Result<Option<String>, TransportError> {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if text.len() > MAX_FRAME_LENGTH {
                        return Err(TransportError::InvalidFrame(
                            "message too long".into(),
                        ));
                    }
                    return Ok(Some(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data.to_vec())
                        .map(Some)
                        .map_err(|e| {
                            TransportError::InvalidFrame(e.to_string())
                        });
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(ws_io_error(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }
}

impl Connection for WebSocketConnection {
    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::ConnectionClosed(self.id.to_string()));
        }
        self.sink
            .lock()
            .await
            .send(Message::text(frame.to_owned()))
            .await
            .map_err(|e| {
                TransportError::SendFailed(ws_io_error(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    async fn recv(&self) -> Result<Option<String>, TransportError> {
        let mut stream = tokio::select! {
            _ = self.closed.cancelled() => return Ok(None),
            stream = self.stream.lock() => stream,
        };
        tokio::select! {
            _ = self.closed.cancelled() => Ok(None),
            frame = Self::next_frame(&mut stream) => frame,
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Ok(());
        }
        self.closed.cancel();
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(ws_io_error(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}
