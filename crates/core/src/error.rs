//! Error types for the RTP/JPEG depacketizer library.

use std::fmt;

/// Errors that can occur in the depacketizer library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Parsing**: [`Parse`](Self::Parse): a malformed RTP fixed header or
///   RFC 2435 payload header.
/// - **Transport**: [`Io`](Self::Io): socket/network failures.
/// - **Configuration**: [`InvalidConfig`](Self::InvalidConfig).
///
/// Reassembly itself never fails: a malformed or missing fragment only
/// corrupts the frame in progress, which is dropped at its boundary.
#[derive(Debug, thiserror::Error)]
pub enum DepayError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode a packet header.
    #[error("parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ParseErrorKind> for DepayError {
    fn from(kind: ParseErrorKind) -> Self {
        DepayError::Parse { kind }
    }
}

/// Specific kind of header parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Datagram shorter than the 12-byte RTP fixed header (RFC 3550 §5.1).
    RtpTooShort,
    /// RTP version field other than 2.
    UnsupportedVersion(u8),
    /// Padding count is zero or exceeds the payload.
    InvalidPadding,
    /// CSRC list or header extension runs past the end of the datagram.
    TruncatedExtension,
    /// Payload shorter than the 8-byte RFC 2435 main header.
    JpegHeaderTooShort,
    /// Type 64–127 without the 4-byte restart marker header.
    RestartHeaderTooShort,
    /// Q ≥ 128 on a first fragment without the 4-byte quantization header.
    QuantHeaderTooShort,
    /// Quantization header declares a table length other than 0 or 128.
    UnsupportedQuantLength(u16),
    /// Quantization header declares more table bytes than the packet holds.
    QuantTablesTruncated,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RtpTooShort => write!(f, "RTP packet too short"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported RTP version {v}"),
            Self::InvalidPadding => write!(f, "invalid RTP padding"),
            Self::TruncatedExtension => write!(f, "truncated RTP CSRC list or extension"),
            Self::JpegHeaderTooShort => write!(f, "RTP/JPEG header too short"),
            Self::RestartHeaderTooShort => write!(f, "restart marker header too short"),
            Self::QuantHeaderTooShort => write!(f, "quantization table header too short"),
            Self::UnsupportedQuantLength(len) => {
                write!(f, "unsupported quantization table length {len}")
            }
            Self::QuantTablesTruncated => write!(f, "quantization table data truncated"),
        }
    }
}

/// Convenience alias for `Result<T, DepayError>`.
pub type Result<T> = std::result::Result<T, DepayError>;
