//! Errors raised while marshalling into, or unmarshalling out of, the wire format.

use crate::signature::SignatureError;
use crate::verify::VerifyError;

/// Errors that can occur while marshalling a message or value tree.
#[derive(Debug, PartialEq, Clone)]
pub enum MarshalError {
    /// `verify` rejected the body before any bytes were written.
    Verify(VerifyError),
    /// A single array exceeded the 64 MiB wire limit.
    ArrayTooLong { len: usize },
    /// The assembled message exceeded the 128 MiB wire limit.
    MessageTooLong { len: usize },
    /// A `g`-typed value's text was longer than 255 bytes.
    SignatureTooLong,
}

impl std::fmt::Display for MarshalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarshalError::Verify(e) => write!(f, "{e}"),
            MarshalError::ArrayTooLong { len } => {
                write!(f, "array of {len} bytes exceeds the 64 MiB limit")
            }
            MarshalError::MessageTooLong { len } => {
                write!(f, "message of {len} bytes exceeds the 128 MiB limit")
            }
            MarshalError::SignatureTooLong => write!(f, "signature string longer than 255 bytes"),
        }
    }
}

impl std::error::Error for MarshalError {}

impl From<VerifyError> for MarshalError {
    fn from(e: VerifyError) -> Self {
        MarshalError::Verify(e)
    }
}

/// Errors that can occur while unmarshalling a message from bytes.
#[derive(Debug, PartialEq, Clone)]
pub enum UnmarshalError {
    /// There were not enough bytes in the buffer to decode the next value.
    NotEnoughBytes,
    /// A message indicated an endian byte other than `l` or `B`.
    InvalidByteOrder,
    /// A message's protocol version field was not 1.
    InvalidProtocolVersion(u8),
    /// A message indicated an unknown message type byte.
    InvalidMessageType(u8),
    /// Zero-padding between values contained non-zero data.
    PaddingContainedData,
    /// A `b`-typed value was neither 0 nor 1 once read as a `u32`.
    InvalidBoolean(u32),
    /// String bytes were not valid UTF-8.
    InvalidUtf8,
    /// A string contained an embedded NUL byte.
    StringContainsNullByte,
    /// A header-field or variant signature failed to parse.
    InvalidSignature(SignatureError),
    /// An array's declared byte length exceeded the 64 MiB limit.
    ArrayTooLong { len: usize },
    /// The message's total length exceeded the 128 MiB limit.
    MessageTooLong { len: usize },
    /// The header-field array was missing a required field for its message type.
    InvalidHeaderFields,
    /// Unmarshalling the body did not consume exactly `body_len` bytes.
    NotAllBytesUsed,
    /// The underlying transport reached a clean end-of-stream with a partial message buffered.
    UnexpectedEof,
}

impl std::fmt::Display for UnmarshalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnmarshalError::NotEnoughBytes => write!(f, "not enough bytes to decode the next value"),
            UnmarshalError::InvalidByteOrder => write!(f, "endian byte was neither 'l' nor 'B'"),
            UnmarshalError::InvalidProtocolVersion(v) => {
                write!(f, "unsupported protocol version {v}")
            }
            UnmarshalError::InvalidMessageType(t) => write!(f, "unknown message type byte {t}"),
            UnmarshalError::PaddingContainedData => {
                write!(f, "padding between values contained non-zero bytes")
            }
            UnmarshalError::InvalidBoolean(v) => {
                write!(f, "boolean encoded as {v}, expected 0 or 1")
            }
            UnmarshalError::InvalidUtf8 => write!(f, "string bytes were not valid UTF-8"),
            UnmarshalError::StringContainsNullByte => {
                write!(f, "string contained an embedded NUL byte")
            }
            UnmarshalError::InvalidSignature(e) => write!(f, "{e}"),
            UnmarshalError::ArrayTooLong { len } => {
                write!(f, "array of {len} bytes exceeds the 64 MiB limit")
            }
            UnmarshalError::MessageTooLong { len } => {
                write!(f, "message of {len} bytes exceeds the 128 MiB limit")
            }
            UnmarshalError::InvalidHeaderFields => {
                write!(f, "header fields do not satisfy the message type's required set")
            }
            UnmarshalError::NotAllBytesUsed => {
                write!(f, "body signature did not consume the whole body")
            }
            UnmarshalError::UnexpectedEof => write!(f, "transport closed mid-message"),
        }
    }
}

impl std::error::Error for UnmarshalError {}

impl From<SignatureError> for UnmarshalError {
    fn from(e: SignatureError) -> Self {
        UnmarshalError::InvalidSignature(e)
    }
}
