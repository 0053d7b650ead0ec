use thiserror::Error;

use crate::frame::MAX_FRAME_LEN;

#[derive(Debug, Error)]
pub enum RideError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed mid-frame")]
    ShortRead,

    #[error("frame length {0} exceeds the {MAX_FRAME_LEN} byte ceiling")]
    Oversize(u32),

    #[error("frame length {0} is shorter than the frame header")]
    Undersize(u32),

    #[error("frame payload is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("handshake: expected {expected:?}, got {got:?}")]
    Handshake { expected: &'static str, got: String },

    #[error("no usable address for {0:?}")]
    Unresolvable(String),
}

impl RideError {
    /// True when the error means the peer is gone rather than misbehaving.
    pub fn is_disconnect(&self) -> bool {
        match self {
            RideError::ShortRead => true,
            RideError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
