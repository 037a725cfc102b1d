//! A D-Bus wire-protocol codec: signature parsing, value verification,
//! marshalling, and unmarshalling, independent of any particular transport
//! or bus client.
//!
//! What this crate does not do: own a socket, speak the SASL auth handshake,
//! manage bus names, or offer an introspection/proxy layer. It turns typed
//! values and signatures into bytes and back, nothing more.

pub mod error;
pub mod fd;
pub mod message;
pub mod signature;
pub mod validation;
pub mod value;
pub mod verify;
pub mod wire;

pub use error::Error;
pub use message::{Message, MessageBuilder, MessageFlags, MessageType};
pub use signature::Signature;
pub use value::{Value, Variant};
pub use wire::{marshal_body, marshal_message, Unmarshaller};
