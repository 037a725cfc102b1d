//! Byte-order aware primitive readers/writers shared by the marshaller and
//! unmarshaller.

use crate::wire::errors::UnmarshalError;
use crate::wire::ByteOrder;

#[inline(always)]
pub fn pad_to_align(align_to: usize, buf: &mut Vec<u8>) {
    let padding_needed = align_to - (buf.len() % align_to);
    if padding_needed != align_to {
        buf.resize(buf.len() + padding_needed, 0);
    }
}

pub fn write_u16(val: u16, byteorder: ByteOrder, buf: &mut Vec<u8>) {
    match byteorder {
        ByteOrder::LittleEndian => buf.extend_from_slice(&val.to_le_bytes()),
        ByteOrder::BigEndian => buf.extend_from_slice(&val.to_be_bytes()),
    }
}
pub fn write_u32(val: u32, byteorder: ByteOrder, buf: &mut Vec<u8>) {
    match byteorder {
        ByteOrder::LittleEndian => buf.extend_from_slice(&val.to_le_bytes()),
        ByteOrder::BigEndian => buf.extend_from_slice(&val.to_be_bytes()),
    }
}
pub fn write_u64(val: u64, byteorder: ByteOrder, buf: &mut Vec<u8>) {
    match byteorder {
        ByteOrder::LittleEndian => buf.extend_from_slice(&val.to_le_bytes()),
        ByteOrder::BigEndian => buf.extend_from_slice(&val.to_be_bytes()),
    }
}

/// Back-patch a 4-byte length placeholder written earlier at `buf[offset..]`.
pub fn insert_u32(byteorder: ByteOrder, val: u32, buf: &mut [u8]) {
    let bytes = match byteorder {
        ByteOrder::LittleEndian => val.to_le_bytes(),
        ByteOrder::BigEndian => val.to_be_bytes(),
    };
    buf.copy_from_slice(&bytes);
}

pub fn write_string(val: &str, byteorder: ByteOrder, buf: &mut Vec<u8>) {
    write_u32(val.len() as u32, byteorder, buf);
    buf.extend_from_slice(val.as_bytes());
    buf.push(0);
}

pub fn write_signature_str(val: &str, buf: &mut Vec<u8>) {
    buf.push(val.len() as u8);
    buf.extend_from_slice(val.as_bytes());
    buf.push(0);
}

pub fn parse_u16(bytes: &[u8], byteorder: ByteOrder) -> Result<(usize, u16), UnmarshalError> {
    if bytes.len() < 2 {
        return Err(UnmarshalError::NotEnoughBytes);
    }
    let arr = [bytes[0], bytes[1]];
    let val = match byteorder {
        ByteOrder::LittleEndian => u16::from_le_bytes(arr),
        ByteOrder::BigEndian => u16::from_be_bytes(arr),
    };
    Ok((2, val))
}

pub fn parse_u32(bytes: &[u8], byteorder: ByteOrder) -> Result<(usize, u32), UnmarshalError> {
    if bytes.len() < 4 {
        return Err(UnmarshalError::NotEnoughBytes);
    }
    let arr = [bytes[0], bytes[1], bytes[2], bytes[3]];
    let val = match byteorder {
        ByteOrder::LittleEndian => u32::from_le_bytes(arr),
        ByteOrder::BigEndian => u32::from_be_bytes(arr),
    };
    Ok((4, val))
}

pub fn parse_u64(bytes: &[u8], byteorder: ByteOrder) -> Result<(usize, u64), UnmarshalError> {
    if bytes.len() < 8 {
        return Err(UnmarshalError::NotEnoughBytes);
    }
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&bytes[..8]);
    let val = match byteorder {
        ByteOrder::LittleEndian => u64::from_le_bytes(arr),
        ByteOrder::BigEndian => u64::from_be_bytes(arr),
    };
    Ok((8, val))
}

/// Compute the padding needed at `offset` for `align_to` and check that it
/// is present and all-zero. Returns the number of padding bytes consumed.
pub fn align_offset(align_to: usize, buf: &[u8], offset: usize) -> Result<usize, UnmarshalError> {
    let padding = align_to - (offset % align_to);
    let padding = if padding == align_to { 0 } else { padding };
    if buf[offset..].len() < padding {
        return Err(UnmarshalError::NotEnoughBytes);
    }
    if buf[offset..offset + padding].iter().any(|b| *b != 0) {
        return Err(UnmarshalError::PaddingContainedData);
    }
    Ok(padding)
}

/// Decode a `g`-typed signature string: one length byte, that many ASCII
/// bytes, one NUL. Returns the bytes consumed and the string.
pub fn unmarshal_signature_str(buf: &[u8]) -> Result<(usize, &str), UnmarshalError> {
    if buf.is_empty() {
        return Err(UnmarshalError::NotEnoughBytes);
    }
    let len = buf[0] as usize;
    if buf.len() < len + 2 {
        return Err(UnmarshalError::NotEnoughBytes);
    }
    let text = std::str::from_utf8(&buf[1..1 + len]).map_err(|_| UnmarshalError::InvalidUtf8)?;
    Ok((len + 2, text))
}

/// Decode an `s`/`o`-typed string: uint32 length, UTF-8 bytes, one NUL.
pub fn unmarshal_str(buf: &[u8], byteorder: ByteOrder) -> Result<(usize, &str), UnmarshalError> {
    let (_, len) = parse_u32(buf, byteorder)?;
    let len = len as usize;
    if buf.len() < len + 5 {
        return Err(UnmarshalError::NotEnoughBytes);
    }
    let text = std::str::from_utf8(&buf[4..4 + len]).map_err(|_| UnmarshalError::InvalidUtf8)?;
    if text.contains('\0') {
        return Err(UnmarshalError::StringContainsNullByte);
    }
    Ok((len + 5, text))
}
