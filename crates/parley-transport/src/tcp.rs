//! Newline-delimited TCP transport using `tokio-util`'s `LinesCodec`.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;

use crate::{
    Connection, ConnectionId, Dialer, MAX_FRAME_LENGTH, Transport,
    TransportError,
};

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;

    async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }

    async fn accept(&mut self) -> Result<Self::Connection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let conn = TcpConnection::new(stream, addr);
        tracing::debug!(id = %conn.id, %addr, "accepted TCP connection");
        Ok(conn)
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

/// Opens [`TcpConnection`]s to a server.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Connection = TcpConnection;

    async fn dial(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Self::Connection, TransportError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(TransportError::ConnectFailed)?;
        let addr = stream
            .peer_addr()
            .map_err(TransportError::ConnectFailed)?;
        let conn = TcpConnection::new(stream, addr);
        tracing::debug!(id = %conn.id, %addr, "connected over TCP");
        Ok(conn)
    }
}

/// A single TCP connection carrying one frame per line.
///
/// Read and write halves are locked separately so a task blocked in
/// [`recv`](Connection::recv) never holds up senders.
pub struct TcpConnection {
    id: ConnectionId,
    remote_addr: SocketAddr,
    reader: Mutex<FramedRead<OwnedReadHalf, LinesCodec>>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, LinesCodec>>,
    closed: CancellationToken,
}

impl TcpConnection {
    fn new(stream: TcpStream, remote_addr: SocketAddr) -> Self {
        let (read, write) = stream.into_split();
        Self {
            id: ConnectionId::next(),
            remote_addr,
            reader: Mutex::new(FramedRead::new(
                read,
                LinesCodec::new_with_max_length(MAX_FRAME_LENGTH),
            )),
            writer: Mutex::new(FramedWrite::new(write, LinesCodec::new())),
            closed: CancellationToken::new(),
        }
    }
}

impl Connection for TcpConnection {
    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::ConnectionClosed(self.id.to_string()));
        }
        self.writer.lock().await.send(frame).await.map_err(|e| match e {
            LinesCodecError::Io(e) => TransportError::SendFailed(e),
            other => TransportError::from(other),
        })
    }

    async fn recv(&self) -> Result<Option<String>, TransportError> {
        let mut reader = tokio::select! {
            _ = self.closed.cancelled() => return Ok(None),
            reader = self.reader.lock() => reader,
        };
        tokio::select! {
            _ = self.closed.cancelled() => Ok(None),
            line = reader.next() => match line {
                Some(Ok(line)) => Ok(Some(line)),
                Some(Err(e)) => Err(e.into()),
                None => Ok(None),
            },
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Ok(());
        }
        self.closed.cancel();
        // Flushes buffered lines, then shuts down the write half (FIN).
        let mut writer = self.writer.lock().await;
        SinkExt::<&str>::close(&mut *writer)
            .await
            .map_err(|e| match e {
                LinesCodecError::Io(e) => TransportError::SendFailed(e),
                other => TransportError::from(other),
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
