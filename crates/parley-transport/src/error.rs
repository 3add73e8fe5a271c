/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Opening an outbound connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer sent something that is not a valid text frame
    /// (not UTF-8, or longer than [`MAX_FRAME_LENGTH`](crate::MAX_FRAME_LENGTH)).
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

impl From<tokio_util::codec::LinesCodecError> for TransportError {
    fn from(err: tokio_util::codec::LinesCodecError) -> Self {
        use tokio_util::codec::LinesCodecError;
        match err {
            LinesCodecError::MaxLineLengthExceeded => {
                Self::InvalidFrame("line too long".into())
            }
            LinesCodecError::Io(e) => Self::ReceiveFailed(e),
        }
    }
}
