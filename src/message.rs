//! The `Message` type and the header-field bookkeeping around it.

use crate::signature::{self, Signature};
use crate::validation::{self, ValidationError};
use crate::value::Value;
use crate::wire::HeaderField;

/// The D-Bus message type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    MethodCall,
    MethodReturn,
    Error,
    Signal,
}

impl MessageType {
    pub fn to_byte(self) -> u8 {
        match self {
            MessageType::MethodCall => 1,
            MessageType::MethodReturn => 2,
            MessageType::Error => 3,
            MessageType::Signal => 4,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(MessageType::MethodCall),
            2 => Some(MessageType::MethodReturn),
            3 => Some(MessageType::Error),
            4 => Some(MessageType::Signal),
            _ => None,
        }
    }
}

/// The message-flags bitset from the D-Bus header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageFlags(pub u8);

impl MessageFlags {
    pub const NONE: MessageFlags = MessageFlags(0);
    pub const NO_REPLY_EXPECTED: MessageFlags = MessageFlags(0x1);
    pub const NO_AUTO_START: MessageFlags = MessageFlags(0x2);
    pub const ALLOW_INTERACTIVE_AUTHORIZATION: MessageFlags = MessageFlags(0x4);

    pub fn contains(self, other: MessageFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for MessageFlags {
    type Output = MessageFlags;
    fn bitor(self, rhs: MessageFlags) -> MessageFlags {
        MessageFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum MessageError {
    Name(ValidationError),
    MissingRequiredField {
        message_type: MessageType,
        field: &'static str,
    },
    BodyArityMismatch {
        expected: usize,
        got: usize,
    },
}

impl std::fmt::Display for MessageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageError::Name(e) => write!(f, "{e}"),
            MessageError::MissingRequiredField { message_type, field } => {
                write!(f, "{message_type:?} message is missing required field '{field}'")
            }
            MessageError::BodyArityMismatch { expected, got } => write!(
                f,
                "body has {got} value(s), signature expects {expected}"
            ),
        }
    }
}

impl std::error::Error for MessageError {}

impl From<ValidationError> for MessageError {
    fn from(e: ValidationError) -> Self {
        MessageError::Name(e)
    }
}

/// A complete D-Bus message: routing metadata plus a typed body.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub destination: Option<String>,
    pub path: Option<String>,
    pub interface: Option<String>,
    pub member: Option<String>,
    pub message_type: MessageType,
    pub flags: MessageFlags,
    pub error_name: Option<String>,
    pub reply_serial: Option<u32>,
    pub sender: Option<String>,
    pub unix_fds: Vec<u32>,
    pub signature: Signature,
    pub body: Vec<Value>,
    pub serial: u32,
}

/// Everything needed to construct a [`Message`], gathered up so
/// construction can validate the whole set at once.
pub struct MessageBuilder {
    pub destination: Option<String>,
    pub path: Option<String>,
    pub interface: Option<String>,
    pub member: Option<String>,
    pub message_type: MessageType,
    pub flags: MessageFlags,
    pub error_name: Option<String>,
    pub reply_serial: Option<u32>,
    pub sender: Option<String>,
    pub unix_fds: Vec<u32>,
    pub signature: Signature,
    pub body: Vec<Value>,
    pub serial: u32,
}

impl MessageBuilder {
    pub fn new(message_type: MessageType) -> Self {
        MessageBuilder {
            destination: None,
            path: None,
            interface: None,
            member: None,
            message_type,
            flags: MessageFlags::NONE,
            error_name: None,
            reply_serial: None,
            sender: None,
            unix_fds: Vec::new(),
            signature: signature::parse("").expect("empty signature always parses"),
            body: Vec::new(),
            serial: 0,
        }
    }

    pub fn build(self) -> Result<Message, MessageError> {
        if let Some(d) = &self.destination {
            validation::validate_bus_name(d)?;
        }
        if let Some(i) = &self.interface {
            validation::validate_interface(i)?;
        }
        if let Some(p) = &self.path {
            validation::validate_object_path(p)?;
        }
        if let Some(m) = &self.member {
            validation::validate_member_name(m)?;
        }
        if let Some(e) = &self.error_name {
            validation::validate_error_name(e)?;
        }
        if self.body.len() != self.signature.children().len() {
            return Err(MessageError::BodyArityMismatch {
                expected: self.signature.children().len(),
                got: self.body.len(),
            });
        }
        check_required_fields(
            self.message_type,
            self.path.is_some(),
            self.interface.is_some(),
            self.member.is_some(),
            self.error_name.is_some(),
            self.reply_serial.is_some(),
        )?;
        Ok(Message {
            destination: self.destination,
            path: self.path,
            interface: self.interface,
            member: self.member,
            message_type: self.message_type,
            flags: self.flags,
            error_name: self.error_name,
            reply_serial: self.reply_serial,
            sender: self.sender,
            unix_fds: self.unix_fds,
            signature: self.signature,
            body: self.body,
            serial: self.serial,
        })
    }
}

fn check_required_fields(
    message_type: MessageType,
    has_path: bool,
    has_interface: bool,
    has_member: bool,
    has_error_name: bool,
    has_reply_serial: bool,
) -> Result<(), MessageError> {
    let missing = |field| MessageError::MissingRequiredField { message_type, field };
    match message_type {
        MessageType::MethodCall => {
            if !has_path {
                return Err(missing("path"));
            }
            if !has_member {
                return Err(missing("member"));
            }
        }
        MessageType::Signal => {
            if !has_path {
                return Err(missing("path"));
            }
            if !has_member {
                return Err(missing("member"));
            }
            if !has_interface {
                return Err(missing("interface"));
            }
        }
        MessageType::MethodReturn => {
            if !has_reply_serial {
                return Err(missing("reply_serial"));
            }
        }
        MessageType::Error => {
            if !has_error_name {
                return Err(missing("error_name"));
            }
            if !has_reply_serial {
                return Err(missing("reply_serial"));
            }
        }
    }
    Ok(())
}

/// Build a `Message` from a decoded header-field list and body, as produced
/// by the unmarshaller. Unknown field IDs are ignored; duplicate IDs are
/// last-writer-wins (the caller already saw them arrive in wire order).
pub fn assemble(
    message_type: MessageType,
    flags: MessageFlags,
    serial: u32,
    fields: Vec<HeaderField>,
    signature: Signature,
    body: Vec<Value>,
    unix_fds: Vec<u32>,
) -> Result<Message, MessageError> {
    let mut destination = None;
    let mut path = None;
    let mut interface = None;
    let mut member = None;
    let mut error_name = None;
    let mut reply_serial = None;
    let mut sender = None;

    for field in fields {
        match field {
            HeaderField::Path(v) => path = Some(v),
            HeaderField::Interface(v) => interface = Some(v),
            HeaderField::Member(v) => member = Some(v),
            HeaderField::ErrorName(v) => error_name = Some(v),
            HeaderField::ReplySerial(v) => reply_serial = Some(v),
            HeaderField::Destination(v) => destination = Some(v),
            HeaderField::Sender(v) => sender = Some(v),
            HeaderField::Signature(_) | HeaderField::UnixFds(_) => {}
        }
    }

    check_required_fields(
        message_type,
        path.is_some(),
        interface.is_some(),
        member.is_some(),
        error_name.is_some(),
        reply_serial.is_some(),
    )?;

    Ok(Message {
        destination,
        path,
        interface,
        member,
        message_type,
        flags,
        error_name,
        reply_serial,
        sender,
        unix_fds,
        signature,
        body,
        serial,
    })
}
