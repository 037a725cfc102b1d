//! The crate's top-level error type, unifying every component's error enum.

use crate::message::MessageError;
use crate::signature::SignatureError;
use crate::verify::VerifyError;
use crate::wire::{MarshalError, UnmarshalError};

/// Any error this crate can produce, from signature parsing down to the wire.
///
/// Name validation failures (`ValidationError`) surface through
/// [`MessageError`], which is where they are actually raised — at `Message`
/// construction, not anywhere in the codec itself — so there is no separate
/// top-level variant for them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error(transparent)]
    Unmarshal(#[from] UnmarshalError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("system call failed: {0}")]
    Nix(#[from] nix::Error),
}
