//! Serializing a verified value tree, and whole messages, into wire bytes.

use crate::message::Message;
use crate::signature::{self, Signature};
use crate::value::Value;
use crate::verify;
use crate::wire::errors::MarshalError;
use crate::wire::{util, ByteOrder, HeaderField, MAX_ARRAY_LEN, MAX_MESSAGE_LEN};

/// Marshal a message body under `signature`. Runs [`verify::verify`] first so
/// no partial bytes are ever produced for a body that does not conform.
pub fn marshal_body(signature: &Signature, body: &[Value]) -> Result<Vec<u8>, MarshalError> {
    verify::verify(signature, body)?;
    let mut buf = Vec::new();
    for (child_sig, value) in signature.children().iter().zip(body.iter()) {
        marshal_value(ByteOrder::LittleEndian, child_sig, value, &mut buf)?;
    }
    Ok(buf)
}

fn marshal_value(
    byteorder: ByteOrder,
    sig: &Signature,
    value: &Value,
    buf: &mut Vec<u8>,
) -> Result<(), MarshalError> {
    util::pad_to_align(signature::alignment(sig.code()), buf);
    match (sig.code(), value) {
        ('y', Value::Byte(b)) => buf.push(*b),
        ('b', Value::Boolean(b)) => util::write_u32(*b as u32, byteorder, buf),
        ('n', Value::Int16(v)) => util::write_u16(*v as u16, byteorder, buf),
        ('q', Value::Uint16(v)) => util::write_u16(*v, byteorder, buf),
        ('i', Value::Int32(v)) => util::write_u32(*v as u32, byteorder, buf),
        ('u', Value::Uint32(v)) => util::write_u32(*v, byteorder, buf),
        ('h', Value::UnixFd(v)) => util::write_u32(*v, byteorder, buf),
        ('x', Value::Int64(v)) => util::write_u64(*v as u64, byteorder, buf),
        ('t', Value::Uint64(v)) => util::write_u64(*v, byteorder, buf),
        ('d', Value::Double(v)) => util::write_u64(v.to_bits(), byteorder, buf),
        ('s', Value::String(s)) | ('o', Value::ObjectPath(s)) => {
            util::write_string(s, byteorder, buf)
        }
        ('g', Value::Signature(s)) | ('g', Value::String(s)) => {
            if s.len() > signature::MAX_SIGNATURE_LEN {
                return Err(MarshalError::SignatureTooLong);
            }
            util::write_signature_str(s, buf);
        }
        ('v', Value::Variant(v)) => {
            if v.signature.text().len() > signature::MAX_SIGNATURE_LEN {
                return Err(MarshalError::SignatureTooLong);
            }
            util::write_signature_str(v.signature.text(), buf);
            marshal_value(byteorder, &v.signature, &v.value, buf)?;
        }
        ('a', Value::ByteArray(bytes)) => {
            if bytes.len() > MAX_ARRAY_LEN {
                return Err(MarshalError::ArrayTooLong { len: bytes.len() });
            }
            util::write_u32(bytes.len() as u32, byteorder, buf);
            buf.extend_from_slice(bytes);
        }
        ('a', Value::Dict(entries)) => {
            let len_offset = reserve_len(buf);
            let key_sig = &sig.children()[0].children()[0];
            let value_sig = &sig.children()[0].children()[1];
            // dict-entry struct is always 8-aligned, independent of the key's
            // own alignment (e.g. `a{sv}`'s `s` key is only 4-aligned).
            util::pad_to_align(8, buf);
            let start = buf.len();
            for (key, value) in entries {
                util::pad_to_align(8, buf);
                marshal_value(byteorder, key_sig, key, buf)?;
                marshal_value(byteorder, value_sig, value, buf)?;
            }
            backfill_len(byteorder, buf, len_offset, start)?;
        }
        ('a', Value::Array(items)) => {
            let len_offset = reserve_len(buf);
            let child = &sig.children()[0];
            if signature::alignment(child.code()) == 8 {
                util::pad_to_align(8, buf);
            }
            let start = buf.len();
            for item in items {
                marshal_value(byteorder, child, item, buf)?;
            }
            backfill_len(byteorder, buf, len_offset, start)?;
        }
        ('(', Value::Struct(items)) | ('r', Value::Struct(items)) => {
            for (field_sig, item) in sig.children().iter().zip(items.iter()) {
                marshal_value(byteorder, field_sig, item, buf)?;
            }
        }
        (code, value) => unreachable!(
            "verify should have rejected code '{code}' paired with a {} value",
            value.kind_label()
        ),
    }
    Ok(())
}

fn reserve_len(buf: &mut Vec<u8>) -> usize {
    util::pad_to_align(4, buf);
    let offset = buf.len();
    buf.extend_from_slice(&[0, 0, 0, 0]);
    offset
}

fn backfill_len(
    byteorder: ByteOrder,
    buf: &mut [u8],
    len_offset: usize,
    start: usize,
) -> Result<(), MarshalError> {
    let len = buf.len() - start;
    if len > MAX_ARRAY_LEN {
        return Err(MarshalError::ArrayTooLong { len });
    }
    util::insert_u32(byteorder, len as u32, &mut buf[len_offset..len_offset + 4]);
    Ok(())
}

fn header_field_entry(id: u8, inner_sig: &str, inner: Value) -> Value {
    Value::Struct(vec![
        Value::Byte(id),
        Value::Variant(crate::value::Variant::new(
            signature::parse_one(inner_sig).expect("header field signatures are fixed"),
            inner,
        )),
    ])
}

/// Marshal a whole message: body first, then the fixed `yyyyuua(yv)` header
/// with its header-field array, padded to an 8-byte boundary, then the body.
/// Always emitted little-endian.
pub fn marshal_message(msg: &Message, fd_negotiation: bool) -> Result<Vec<u8>, MarshalError> {
    let byteorder = ByteOrder::LittleEndian;
    let body_bytes = marshal_body(&msg.signature, &msg.body)?;

    let mut fields = Vec::new();
    if let Some(path) = &msg.path {
        fields.push(header_field_entry(HeaderField::Path(String::new()).id(), "o", Value::ObjectPath(path.clone())));
    }
    if let Some(interface) = &msg.interface {
        fields.push(header_field_entry(HeaderField::Interface(String::new()).id(), "s", Value::String(interface.clone())));
    }
    if let Some(member) = &msg.member {
        fields.push(header_field_entry(HeaderField::Member(String::new()).id(), "s", Value::String(member.clone())));
    }
    if let Some(error_name) = &msg.error_name {
        fields.push(header_field_entry(HeaderField::ErrorName(String::new()).id(), "s", Value::String(error_name.clone())));
    }
    if let Some(reply_serial) = msg.reply_serial {
        fields.push(header_field_entry(HeaderField::ReplySerial(0).id(), "u", Value::Uint32(reply_serial)));
    }
    if let Some(destination) = &msg.destination {
        fields.push(header_field_entry(HeaderField::Destination(String::new()).id(), "s", Value::String(destination.clone())));
    }
    fields.push(header_field_entry(
        HeaderField::Signature(String::new()).id(),
        "g",
        Value::Signature(msg.signature.text().to_string()),
    ));
    if fd_negotiation && !msg.unix_fds.is_empty() {
        fields.push(header_field_entry(
            HeaderField::UnixFds(0).id(),
            "u",
            Value::Uint32(msg.unix_fds.len() as u32),
        ));
    }

    let fields_sig = signature::parse_one("a(yv)").expect("fixed header fields signature");
    let fields_value = Value::Array(fields);

    let mut header = Vec::new();
    header.push(byteorder.to_byte());
    header.push(msg.message_type.to_byte());
    header.push(msg.flags.0);
    header.push(1); // protocol version
    util::write_u32(body_bytes.len() as u32, byteorder, &mut header);
    util::write_u32(msg.serial, byteorder, &mut header);
    marshal_value(byteorder, &fields_sig, &fields_value, &mut header)?;
    util::pad_to_align(8, &mut header);

    let total_len = header.len() + body_bytes.len();
    if total_len > MAX_MESSAGE_LEN {
        return Err(MarshalError::MessageTooLong { len: total_len });
    }

    header.extend_from_slice(&body_bytes);
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageBuilder, MessageType};
    use crate::signature::parse;
    use std::convert::TryInto;

    #[test]
    fn marshals_flat_strings_with_alignment() {
        let sig = parse("ss").unwrap();
        let body = vec![Value::String("hello".into()), Value::String("world".into())];
        let bytes = marshal_body(&sig, &body).unwrap();
        assert_eq!(&bytes[0..4], &5u32.to_le_bytes());
        assert_eq!(&bytes[4..9], b"hello");
        assert_eq!(bytes[9], 0);
    }

    #[test]
    fn marshals_byte_array_without_per_element_padding() {
        let sig = parse("ay").unwrap();
        let body = vec![Value::ByteArray(vec![0u8; 10_000])];
        let bytes = marshal_body(&sig, &body).unwrap();
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 10_000);
        assert_eq!(bytes.len(), 4 + 10_000);
    }

    #[test]
    fn marshals_ping_call() {
        let msg = MessageBuilder::new(MessageType::MethodCall)
            .tap(|b| {
                b.destination = Some("org.freedesktop.DBus".into());
                b.path = Some("/org/freedesktop/DBus".into());
                b.interface = Some("org.freedesktop.DBus.Peer".into());
                b.member = Some("Ping".into());
                b.serial = 1;
            })
            .build()
            .unwrap();
        let bytes = marshal_message(&msg, false).unwrap();
        assert_eq!(&bytes[0..4], &[b'l', 1, 0, 1]);
        assert_eq!(&bytes[4..8], &0u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_le_bytes());
        assert_eq!(bytes.len() % 8, 0);
    }

    trait Tap: Sized {
        fn tap(mut self, f: impl FnOnce(&mut Self)) -> Self {
            f(&mut self);
            self
        }
    }
    impl Tap for MessageBuilder {}
}
