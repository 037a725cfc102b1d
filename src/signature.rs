//! D-Bus type signatures: parsing a signature string into a tree of typed nodes.
//!
//! Every node carries the exact substring of the original signature it spans.
//! Two parses of the same text return the same `Arc` allocation: parsing is
//! memoized in a pair of process-wide caches, one for complete top-level
//! signatures (the synthetic `r` root) and one for single complete types.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

/// Maximum signature length in bytes, matching the `g` type's one-byte length prefix.
pub const MAX_SIGNATURE_LEN: usize = 255;
/// Maximum struct and array nesting depth, checked independently.
pub const MAX_NESTING_DEPTH: u8 = 32;

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum SignatureError {
    TooLong,
    NestingTooDeep,
    EmptySignature,
    UnknownTypeCode(u8),
    MissingArrayElementType,
    UnclosedStruct,
    EmptyStruct,
    UnclosedDictEntry,
    DictEntryKeyNotBasic,
    DictEntryMissingValue,
    UnexpectedClosingBracket,
    TrailingContent,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::TooLong => write!(f, "signature longer than {MAX_SIGNATURE_LEN} bytes"),
            SignatureError::NestingTooDeep => write!(f, "struct/array nesting exceeds {MAX_NESTING_DEPTH}"),
            SignatureError::EmptySignature => write!(f, "signature is empty"),
            SignatureError::UnknownTypeCode(c) => write!(f, "unknown type code {:?}", *c as char),
            SignatureError::MissingArrayElementType => write!(f, "'a' not followed by an element type"),
            SignatureError::UnclosedStruct => write!(f, "missing closing ')' for struct"),
            SignatureError::EmptyStruct => write!(f, "struct must have at least one field"),
            SignatureError::UnclosedDictEntry => write!(f, "missing closing '}}' for dict entry"),
            SignatureError::DictEntryKeyNotBasic => write!(f, "dict entry key must be a basic type"),
            SignatureError::DictEntryMissingValue => write!(f, "dict entry is missing a value type"),
            SignatureError::UnexpectedClosingBracket => write!(f, "unexpected ')' or '}}' with no matching opener"),
            SignatureError::TrailingContent => write!(f, "trailing content after a single complete type"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// A node in a parsed signature tree, hashable and comparable by `text` alone.
#[derive(Debug)]
pub struct SigNode {
    text: Box<str>,
    code: u8,
    children: Vec<Signature>,
}

/// Shared, immutable handle to a parsed signature (sub)tree.
pub type Signature = Arc<SigNode>;

impl SigNode {
    /// The exact substring of the original signature this node spans.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The D-Bus type code for this node: one of `y b n q i u x t d s o g h v a ( { r`.
    pub fn code(&self) -> char {
        self.code as char
    }

    pub fn children(&self) -> &[Signature] {
        &self.children
    }

    pub fn is_basic(&self) -> bool {
        is_basic_code(self.code)
    }

    /// True for the synthetic root produced by [`parse`].
    pub fn is_root(&self) -> bool {
        self.code == b'r'
    }
}

impl PartialEq for SigNode {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}
impl Eq for SigNode {}

impl std::hash::Hash for SigNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

fn is_basic_code(code: u8) -> bool {
    matches!(
        code,
        b'y' | b'b' | b'n' | b'q' | b'i' | b'u' | b'x' | b't' | b'd' | b's' | b'o' | b'g' | b'h'
    )
}

type Cache = Mutex<HashMap<Box<str>, Signature>>;

fn root_cache() -> &'static Cache {
    static CACHE: OnceLock<Cache> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn type_cache() -> &'static Cache {
    static CACHE: OnceLock<Cache> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn mk(text: &str, code: u8, children: Vec<Signature>) -> Signature {
    Arc::new(SigNode {
        text: text.into(),
        code,
        children,
    })
}

/// Parse one complete type starting at `idx`, returning the node and the
/// index just past it. Depths are tracked independently for struct and array
/// nesting, mirroring the D-Bus reference limits.
fn parse_next(
    text: &str,
    idx: usize,
    struct_depth: u8,
    array_depth: u8,
) -> Result<(Signature, usize), SignatureError> {
    let bytes = text.as_bytes();
    let code = bytes[idx];
    match code {
        b'a' => {
            if array_depth >= MAX_NESTING_DEPTH {
                return Err(SignatureError::NestingTooDeep);
            }
            if idx + 1 >= bytes.len() {
                return Err(SignatureError::MissingArrayElementType);
            }
            let (child, next) = parse_next(text, idx + 1, struct_depth, array_depth + 1)?;
            Ok((mk(&text[idx..next], b'a', vec![child]), next))
        }
        b'(' => {
            if struct_depth >= MAX_NESTING_DEPTH {
                return Err(SignatureError::NestingTooDeep);
            }
            let mut children = Vec::new();
            let mut cur = idx + 1;
            loop {
                if cur >= bytes.len() {
                    return Err(SignatureError::UnclosedStruct);
                }
                if bytes[cur] == b')' {
                    cur += 1;
                    break;
                }
                let (child, next) = parse_next(text, cur, struct_depth + 1, array_depth)?;
                children.push(child);
                cur = next;
            }
            if children.is_empty() {
                return Err(SignatureError::EmptyStruct);
            }
            Ok((mk(&text[idx..cur], b'(', children), cur))
        }
        b'{' => {
            if idx + 1 >= bytes.len() {
                return Err(SignatureError::DictEntryMissingValue);
            }
            let (key, next1) = parse_next(text, idx + 1, struct_depth, array_depth)?;
            if !key.children.is_empty() || !is_basic_code(key.code) {
                return Err(SignatureError::DictEntryKeyNotBasic);
            }
            if next1 >= bytes.len() || bytes[next1] == b'}' {
                return Err(SignatureError::DictEntryMissingValue);
            }
            let (value, next2) = parse_next(text, next1, struct_depth, array_depth)?;
            if next2 >= bytes.len() || bytes[next2] != b'}' {
                return Err(SignatureError::UnclosedDictEntry);
            }
            let cur = next2 + 1;
            Ok((mk(&text[idx..cur], b'{', vec![key, value]), cur))
        }
        b')' | b'}' => Err(SignatureError::UnexpectedClosingBracket),
        b'y' | b'b' | b'n' | b'q' | b'i' | b'u' | b'x' | b't' | b'd' | b's' | b'o' | b'g'
        | b'h' | b'v' => Ok((mk(&text[idx..idx + 1], code, Vec::new()), idx + 1)),
        other => Err(SignatureError::UnknownTypeCode(other)),
    }
}

/// Parse a full signature string into a synthetic `r` root whose children
/// are the sequence of complete types it contains. An empty string yields a
/// root with no children.
pub fn parse(text: &str) -> Result<Signature, SignatureError> {
    if text.len() > MAX_SIGNATURE_LEN {
        return Err(SignatureError::TooLong);
    }
    if let Some(hit) = root_cache().lock().unwrap().get(text) {
        return Ok(hit.clone());
    }
    let mut children = Vec::new();
    let mut idx = 0;
    while idx < text.len() {
        let (child, next) = parse_next(text, idx, 0, 0)?;
        children.push(child);
        idx = next;
    }
    let node = mk(text, b'r', children);
    root_cache().lock().unwrap().insert(text.into(), node.clone());
    Ok(node)
}

/// Parse exactly one complete type. Fails if `text` is empty or has trailing
/// content after the first complete type.
pub fn parse_one(text: &str) -> Result<Signature, SignatureError> {
    if text.is_empty() {
        return Err(SignatureError::EmptySignature);
    }
    if text.len() > MAX_SIGNATURE_LEN {
        return Err(SignatureError::TooLong);
    }
    if let Some(hit) = type_cache().lock().unwrap().get(text) {
        return Ok(hit.clone());
    }
    let (node, next) = parse_next(text, 0, 0, 0)?;
    if next != text.len() {
        return Err(SignatureError::TrailingContent);
    }
    type_cache().lock().unwrap().insert(text.into(), node.clone());
    Ok(node)
}

/// Byte alignment a value of the given code must be padded to before marshalling.
pub fn alignment(code: char) -> usize {
    match code {
        'y' | 'g' | 'v' => 1,
        'n' | 'q' => 2,
        'b' | 'i' | 'u' | 'h' | 'a' => 4,
        'x' | 't' | 'd' | '(' | 'r' | '{' => 8,
        's' | 'o' => 4,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_types() {
        let root = parse("ybnqiuxtdsogh").unwrap();
        assert_eq!(root.code(), 'r');
        assert_eq!(root.children().len(), 13);
        assert_eq!(root.text(), "ybnqiuxtdsogh");
    }

    #[test]
    fn parse_is_memoized_by_identity() {
        let a = parse("a{sv}").unwrap();
        let b = parse("a{sv}").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn parse_one_rejects_trailing_content() {
        assert_eq!(parse_one("ss"), Err(SignatureError::TrailingContent));
    }

    #[test]
    fn parse_one_rejects_empty() {
        assert_eq!(parse_one(""), Err(SignatureError::EmptySignature));
    }

    #[test]
    fn array_requires_element_type() {
        assert_eq!(parse("a"), Err(SignatureError::MissingArrayElementType));
    }

    #[test]
    fn struct_must_close() {
        assert_eq!(parse("(s"), Err(SignatureError::UnclosedStruct));
    }

    #[test]
    fn struct_must_be_nonempty() {
        assert_eq!(parse("()"), Err(SignatureError::EmptyStruct));
    }

    #[test]
    fn dict_entry_requires_basic_key() {
        assert_eq!(parse("a{(s)s}"), Err(SignatureError::DictEntryKeyNotBasic));
    }

    #[test]
    fn dict_entry_requires_value() {
        assert_eq!(parse("a{s}"), Err(SignatureError::DictEntryMissingValue));
    }

    #[test]
    fn dict_entry_must_close() {
        assert_eq!(parse("a{ss"), Err(SignatureError::UnclosedDictEntry));
    }

    #[test]
    fn nested_struct_and_dict_shapes() {
        let root = parse("a{sa{sv}}").unwrap();
        let array = &root.children()[0];
        assert_eq!(array.code(), 'a');
        let entry = &array.children()[0];
        assert_eq!(entry.code(), '{');
        assert_eq!(entry.children()[0].code(), 's');
        assert_eq!(entry.children()[1].code(), 'a');
    }

    #[test]
    fn rejects_signature_too_long() {
        let long: String = std::iter::repeat('y').take(256).collect();
        assert_eq!(parse(&long), Err(SignatureError::TooLong));
    }

    #[test]
    fn rejects_nesting_too_deep() {
        let deep: String = std::iter::repeat('a').take(33).chain(std::iter::once('y')).collect();
        assert_eq!(parse(&deep), Err(SignatureError::NestingTooDeep));
    }

    #[test]
    fn text_round_trips_through_reparse() {
        for sig in ["", "s", "ai", "a{sv}", "(ybnqiuxtdsogh)", "a(ii)"] {
            let parsed = parse(sig).unwrap();
            assert_eq!(parsed.text(), sig);
            let reparsed = parse(parsed.text()).unwrap();
            assert_eq!(parsed, reparsed);
        }
    }
}
