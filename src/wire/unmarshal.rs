//! Decoding wire bytes into [`Message`]s.
//!
//! [`Unmarshaller`] is resumable: bytes (and, separately, file descriptors
//! that arrived out-of-band over a Unix socket's ancillary data) are fed in
//! as they arrive, and [`Unmarshaller::try_next`] returns `Ok(None)` until a
//! complete message is buffered. A message is decoded in full, atomically;
//! partial decode attempts never corrupt the unmarshaller's state.

use crate::message::{self, Message, MessageFlags, MessageType};
use crate::signature::{self, Signature};
use crate::value::{Value, Variant};
use crate::wire::errors::UnmarshalError;
use crate::wire::util;
use crate::wire::{ByteOrder, HeaderField, MAX_ARRAY_LEN, MAX_MESSAGE_LEN};

struct PendingHeader {
    byteorder: ByteOrder,
    message_type: MessageType,
    flags: MessageFlags,
    serial: u32,
    fields: Vec<HeaderField>,
    signature: Signature,
    unix_fds_count: u32,
    header_len: usize,
    body_len: usize,
}

enum State {
    NeedHeader,
    NeedBody(PendingHeader),
    Done(UnmarshalError),
}

/// A resumable message decoder fed from a byte stream (and, for Unix-socket
/// transports, an accompanying stream of received file descriptors).
pub struct Unmarshaller {
    buf: Vec<u8>,
    fds: Vec<u32>,
    state: State,
}

impl Default for Unmarshaller {
    fn default() -> Self {
        Self::new()
    }
}

impl Unmarshaller {
    pub fn new() -> Self {
        Unmarshaller {
            buf: Vec::new(),
            fds: Vec::new(),
            state: State::NeedHeader,
        }
    }

    /// Append newly-received bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append newly-received file descriptors, in the order they arrived.
    pub fn feed_fds(&mut self, fds: &[u32]) {
        self.fds.extend_from_slice(fds);
    }

    /// Take up to `count` descriptors off the front of the fd sidecar queue.
    /// Callers use the `UNIX_FDS` header field on a decoded message to learn
    /// how many to take, then pass them (with the message's signature and
    /// body) to [`crate::fd::lift`].
    pub fn take_pending_fds(&mut self, count: usize) -> Vec<u32> {
        let count = count.min(self.fds.len());
        self.fds.drain(0..count).collect()
    }

    /// Attempt to decode the next complete message. `Ok(None)` means more
    /// bytes are needed; once a decode error occurs the unmarshaller is
    /// poisoned and every subsequent call re-returns the same error, since
    /// the byte stream can no longer be trusted to be message-aligned.
    pub fn try_next(&mut self) -> Result<Option<Message>, UnmarshalError> {
        if let State::Done(e) = &self.state {
            return Err(e.clone());
        }
        if let State::NeedHeader = self.state {
            match parse_header(&self.buf)? {
                None => return Ok(None),
                Some(pending) => self.state = State::NeedBody(pending),
            }
        }
        let pending = match std::mem::replace(&mut self.state, State::NeedHeader) {
            State::NeedBody(p) => p,
            _ => unreachable!("state was just set to NeedBody above"),
        };
        if self.buf.len() < pending.header_len + pending.body_len
            || self.fds.len() < pending.unix_fds_count as usize
        {
            self.state = State::NeedBody(pending);
            return Ok(None);
        }
        match self.finish_message(pending) {
            Ok(msg) => Ok(Some(msg)),
            Err(e) => {
                self.state = State::Done(e.clone());
                Err(e)
            }
        }
    }

    fn finish_message(&mut self, pending: PendingHeader) -> Result<Message, UnmarshalError> {
        let body_end = pending.header_len + pending.body_len;
        let mut offset = 0;
        let mut body = Vec::new();
        {
            let body_bytes = &self.buf[pending.header_len..body_end];
            for child_sig in pending.signature.children() {
                let (new_offset, value) =
                    unmarshal_value(pending.byteorder, child_sig, body_bytes, offset)?;
                offset = new_offset;
                body.push(value);
            }
            if offset != body_bytes.len() {
                return Err(UnmarshalError::NotAllBytesUsed);
            }
        }
        // try_next already waited for this many fds to arrive via feed_fds.
        let unix_fds = self.take_pending_fds(pending.unix_fds_count as usize);
        let msg = message::assemble(
            pending.message_type,
            pending.flags,
            pending.serial,
            pending.fields,
            pending.signature,
            body,
            unix_fds,
        )
        .map_err(|_| UnmarshalError::InvalidHeaderFields)?;
        self.buf.drain(0..body_end);
        Ok(msg)
    }
}

fn need(buf: &[u8], offset: usize, n: usize) -> Result<(), UnmarshalError> {
    if buf.len() < offset + n {
        Err(UnmarshalError::NotEnoughBytes)
    } else {
        Ok(())
    }
}

/// Decode the fixed 16-byte header plus the header-fields array, returning
/// `None` if `buf` does not yet hold all of it.
fn parse_header(buf: &[u8]) -> Result<Option<PendingHeader>, UnmarshalError> {
    if buf.len() < 16 {
        return Ok(None);
    }
    let byteorder = ByteOrder::from_byte(buf[0]).ok_or(UnmarshalError::InvalidByteOrder)?;
    let message_type =
        MessageType::from_byte(buf[1]).ok_or(UnmarshalError::InvalidMessageType(buf[1]))?;
    let flags = MessageFlags(buf[2]);
    let protocol_version = buf[3];
    if protocol_version != 1 {
        return Err(UnmarshalError::InvalidProtocolVersion(protocol_version));
    }
    let (_, body_len) = util::parse_u32(&buf[4..], byteorder)?;
    let (_, serial) = util::parse_u32(&buf[8..], byteorder)?;

    let fields_byte_len = match util::parse_u32(&buf[12..], byteorder) {
        Ok((_, v)) => v,
        Err(UnmarshalError::NotEnoughBytes) => return Ok(None),
        Err(e) => return Err(e),
    };
    if fields_byte_len as usize > MAX_ARRAY_LEN {
        return Err(UnmarshalError::ArrayTooLong {
            len: fields_byte_len as usize,
        });
    }

    let fields_sig = signature::parse_one("a(yv)").expect("fixed header fields signature");
    let (after_fields, fields_value) = match unmarshal_value(byteorder, &fields_sig, buf, 12) {
        Ok(v) => v,
        Err(UnmarshalError::NotEnoughBytes) => return Ok(None),
        Err(e) => return Err(e),
    };

    let header_len = after_fields + pad_amount(after_fields, 8);
    if buf.len() < header_len {
        return Ok(None);
    }

    let body_len = body_len as usize;
    let total_len = header_len + body_len;
    if total_len > MAX_MESSAGE_LEN {
        return Err(UnmarshalError::MessageTooLong { len: total_len });
    }
    if header_len > after_fields && buf[after_fields..header_len].iter().any(|b| *b != 0) {
        return Err(UnmarshalError::PaddingContainedData);
    }

    let (fields, signature_text, unix_fds_count) = interpret_header_fields(fields_value)?;
    let signature = if signature_text.is_empty() {
        signature::parse("").expect("empty signature always parses")
    } else {
        signature::parse(&signature_text)?
    };

    Ok(Some(PendingHeader {
        byteorder,
        message_type,
        flags,
        serial,
        fields,
        signature,
        unix_fds_count,
        header_len,
        body_len,
    }))
}

fn pad_amount(offset: usize, align_to: usize) -> usize {
    let rem = offset % align_to;
    if rem == 0 {
        0
    } else {
        align_to - rem
    }
}

/// Split the raw decoded `a(yv)` array into [`HeaderField`]s plus the two
/// fields message assembly needs directly: the body's signature text and the
/// UNIX_FDS count (an `a(yv)` entry itself, not otherwise surfaced to callers).
fn interpret_header_fields(
    value: Value,
) -> Result<(Vec<HeaderField>, String, u32), UnmarshalError> {
    let entries = match value {
        Value::Array(entries) => entries,
        _ => return Err(UnmarshalError::InvalidHeaderFields),
    };
    let mut fields = Vec::new();
    let mut signature_text = String::new();
    let mut unix_fds_count = 0u32;
    for entry in entries {
        let (id, variant) = match entry {
            Value::Struct(struct_fields) if struct_fields.len() == 2 => {
                let mut iter = struct_fields.into_iter();
                let id = match iter.next() {
                    Some(Value::Byte(id)) => id,
                    _ => return Err(UnmarshalError::InvalidHeaderFields),
                };
                let variant = match iter.next() {
                    Some(Value::Variant(v)) => v,
                    _ => return Err(UnmarshalError::InvalidHeaderFields),
                };
                (id, variant)
            }
            _ => return Err(UnmarshalError::InvalidHeaderFields),
        };
        match (id, *variant.value) {
            (1, Value::ObjectPath(v)) => fields.push(HeaderField::Path(v)),
            (2, Value::String(v)) => fields.push(HeaderField::Interface(v)),
            (3, Value::String(v)) => fields.push(HeaderField::Member(v)),
            (4, Value::String(v)) => fields.push(HeaderField::ErrorName(v)),
            (5, Value::Uint32(v)) => fields.push(HeaderField::ReplySerial(v)),
            (6, Value::String(v)) => fields.push(HeaderField::Destination(v)),
            (7, Value::String(v)) => fields.push(HeaderField::Sender(v)),
            (8, Value::Signature(v)) => {
                signature_text = v.clone();
                fields.push(HeaderField::Signature(v));
            }
            (9, Value::Uint32(v)) => {
                unix_fds_count = v;
                fields.push(HeaderField::UnixFds(v));
            }
            _ => {} // unknown field id, or a known id with the wrong variant type: ignored
        }
    }
    Ok((fields, signature_text, unix_fds_count))
}

/// Decode one value of type `sig` starting at the given absolute offset into
/// `buf`. `buf` is indexed from the start of whatever frame the caller is
/// decoding (the whole message, for header fields; the body alone, for
/// everything else, which is always 8-byte aligned relative to the message).
fn unmarshal_value(
    byteorder: ByteOrder,
    sig: &Signature,
    buf: &[u8],
    offset: usize,
) -> Result<(usize, Value), UnmarshalError> {
    let mut offset = offset + util::align_offset(signature::alignment(sig.code()), buf, offset)?;
    let value = match sig.code() {
        'y' => {
            need(buf, offset, 1)?;
            let v = buf[offset];
            offset += 1;
            Value::Byte(v)
        }
        'b' => {
            let (n, v) = util::parse_u32(&buf[offset..], byteorder)?;
            offset += n;
            if v > 1 {
                return Err(UnmarshalError::InvalidBoolean(v));
            }
            Value::Boolean(v == 1)
        }
        'n' => {
            let (n, v) = util::parse_u16(&buf[offset..], byteorder)?;
            offset += n;
            Value::Int16(v as i16)
        }
        'q' => {
            let (n, v) = util::parse_u16(&buf[offset..], byteorder)?;
            offset += n;
            Value::Uint16(v)
        }
        'i' => {
            let (n, v) = util::parse_u32(&buf[offset..], byteorder)?;
            offset += n;
            Value::Int32(v as i32)
        }
        'u' => {
            let (n, v) = util::parse_u32(&buf[offset..], byteorder)?;
            offset += n;
            Value::Uint32(v)
        }
        'h' => {
            let (n, v) = util::parse_u32(&buf[offset..], byteorder)?;
            offset += n;
            Value::UnixFd(v)
        }
        'x' => {
            let (n, v) = util::parse_u64(&buf[offset..], byteorder)?;
            offset += n;
            Value::Int64(v as i64)
        }
        't' => {
            let (n, v) = util::parse_u64(&buf[offset..], byteorder)?;
            offset += n;
            Value::Uint64(v)
        }
        'd' => {
            let (n, v) = util::parse_u64(&buf[offset..], byteorder)?;
            offset += n;
            Value::Double(f64::from_bits(v))
        }
        's' => {
            let (n, s) = util::unmarshal_str(&buf[offset..], byteorder)?;
            let s = s.to_string();
            offset += n;
            Value::String(s)
        }
        'o' => {
            let (n, s) = util::unmarshal_str(&buf[offset..], byteorder)?;
            let s = s.to_string();
            offset += n;
            Value::ObjectPath(s)
        }
        'g' => {
            let (n, s) = util::unmarshal_signature_str(&buf[offset..])?;
            let s = s.to_string();
            offset += n;
            Value::Signature(s)
        }
        'v' => {
            let (n, s) = util::unmarshal_signature_str(&buf[offset..])?;
            offset += n;
            let inner_sig = signature::parse_one(s)?;
            let (new_offset, inner) = unmarshal_value(byteorder, &inner_sig, buf, offset)?;
            offset = new_offset;
            Value::Variant(Variant::new(inner_sig, inner))
        }
        'a' => {
            let (n, len) = util::parse_u32(&buf[offset..], byteorder)?;
            offset += n;
            if len as usize > MAX_ARRAY_LEN {
                return Err(UnmarshalError::ArrayTooLong { len: len as usize });
            }
            let child = &sig.children()[0];
            if child.code() == 'y' {
                need(buf, offset, len as usize)?;
                let bytes = buf[offset..offset + len as usize].to_vec();
                offset += len as usize;
                Value::ByteArray(bytes)
            } else {
                if signature::alignment(child.code()) == 8 {
                    offset += util::align_offset(8, buf, offset)?;
                }
                let end = offset + len as usize;
                if child.code() == '{' {
                    let key_sig = &child.children()[0];
                    let value_sig = &child.children()[1];
                    let mut entries = Vec::new();
                    while offset < end {
                        offset += util::align_offset(8, buf, offset)?;
                        let (o1, key) = unmarshal_value(byteorder, key_sig, buf, offset)?;
                        offset = o1;
                        let (o2, val) = unmarshal_value(byteorder, value_sig, buf, offset)?;
                        offset = o2;
                        entries.push((key, val));
                    }
                    Value::Dict(entries)
                } else {
                    let mut items = Vec::new();
                    while offset < end {
                        let (o, item) = unmarshal_value(byteorder, child, buf, offset)?;
                        offset = o;
                        items.push(item);
                    }
                    Value::Array(items)
                }
            }
        }
        '(' | 'r' => {
            let mut items = Vec::new();
            for child_sig in sig.children() {
                let (o, item) = unmarshal_value(byteorder, child_sig, buf, offset)?;
                offset = o;
                items.push(item);
            }
            Value::Struct(items)
        }
        other => unreachable!("signature parsing should never produce code {other:?}"),
    };
    Ok((offset, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageBuilder, MessageType};
    use crate::wire::marshal::marshal_message;

    fn tap(mut b: MessageBuilder, f: impl FnOnce(&mut MessageBuilder)) -> MessageBuilder {
        f(&mut b);
        b
    }

    #[test]
    fn round_trips_a_ping_call() {
        let msg = tap(MessageBuilder::new(MessageType::MethodCall), |b| {
            b.destination = Some("org.freedesktop.DBus".into());
            b.path = Some("/org/freedesktop/DBus".into());
            b.interface = Some("org.freedesktop.DBus.Peer".into());
            b.member = Some("Ping".into());
            b.serial = 7;
        })
        .build()
        .unwrap();
        let bytes = marshal_message(&msg, false).unwrap();

        let mut un = Unmarshaller::new();
        assert!(un.try_next().unwrap().is_none());
        un.feed(&bytes);
        let decoded = un.try_next().unwrap().unwrap();
        assert_eq!(decoded.member.as_deref(), Some("Ping"));
        assert_eq!(decoded.path.as_deref(), Some("/org/freedesktop/DBus"));
        assert_eq!(decoded.serial, 7);
        assert!(un.try_next().unwrap().is_none());
    }

    #[test]
    fn round_trips_a_signal_with_a_string_body() {
        let sig = signature::parse("s").unwrap();
        let msg = tap(MessageBuilder::new(MessageType::Signal), |b| {
            b.path = Some("/a".into());
            b.interface = Some("com.example.Iface".into());
            b.member = Some("Changed".into());
            b.signature = sig;
            b.body = vec![Value::String("hello there".into())];
            b.serial = 42;
        })
        .build()
        .unwrap();
        let bytes = marshal_message(&msg, false).unwrap();
        let mut un = Unmarshaller::new();
        un.feed(&bytes);
        let decoded = un.try_next().unwrap().unwrap();
        assert_eq!(decoded.body, vec![Value::String("hello there".into())]);
    }

    #[test]
    fn feeding_one_byte_at_a_time_still_resolves() {
        let msg = tap(MessageBuilder::new(MessageType::Signal), |b| {
            b.path = Some("/a".into());
            b.interface = Some("com.example.Iface".into());
            b.member = Some("Changed".into());
            b.serial = 1;
        })
        .build()
        .unwrap();
        let bytes = marshal_message(&msg, false).unwrap();
        let mut un = Unmarshaller::new();
        let mut result = None;
        for byte in &bytes {
            assert!(result.is_none());
            un.feed(std::slice::from_ref(byte));
            result = un.try_next().unwrap();
        }
        assert!(result.is_some());
    }

    #[test]
    fn rejects_bad_byte_order() {
        let mut un = Unmarshaller::new();
        un.feed(&[b'x', 1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(un.try_next(), Err(UnmarshalError::InvalidByteOrder));
        assert_eq!(un.try_next(), Err(UnmarshalError::InvalidByteOrder));
    }

    #[test]
    fn large_byte_array_round_trips() {
        let sig = signature::parse("ay").unwrap();
        let msg = tap(MessageBuilder::new(MessageType::Signal), |b| {
            b.path = Some("/a".into());
            b.interface = Some("com.example.Iface".into());
            b.member = Some("Blob".into());
            b.signature = sig;
            b.body = vec![Value::ByteArray(vec![0xAB; 10_000])];
            b.serial = 3;
        })
        .build()
        .unwrap();
        let bytes = marshal_message(&msg, false).unwrap();
        let mut un = Unmarshaller::new();
        un.feed(&bytes);
        let decoded = un.try_next().unwrap().unwrap();
        assert_eq!(decoded.body, vec![Value::ByteArray(vec![0xAB; 10_000])]);
    }
}
