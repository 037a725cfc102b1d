//! Swapping file descriptors between their "inline value" and "sidecar
//! index" representations in a value tree.
//!
//! `lower` turns raw descriptors embedded in the body into indices plus a
//! side table; `lift` is the inverse, used after the wire's body (which only
//! ever carries indices) has been decoded and the real descriptors have
//! arrived out-of-band.

use crate::signature::Signature;
use crate::value::{Value, Variant};

/// Sentinel used by [`lift`] when a body references an fd index with no
/// corresponding entry in the sidecar table.
pub const FD_ABSENT: u32 = u32::MAX;

/// Replace every `h` value in `body` with an index into a deduplicated
/// sidecar table of the raw descriptors encountered, in first-occurrence
/// order. Variants are always descended into, even though their contained
/// signature is not reflected in `signature`'s own text.
pub fn lower(signature: &Signature, body: &[Value]) -> (Vec<Value>, Vec<u32>) {
    let mut fds = Vec::new();
    let children = signature.children();
    let lowered = children
        .iter()
        .zip(body.iter())
        .map(|(sig, value)| lower_value(sig, value, &mut fds))
        .collect();
    (lowered, fds)
}

fn lower_value(sig: &Signature, value: &Value, fds: &mut Vec<u32>) -> Value {
    if !needs_descent(sig.text()) {
        return value.clone();
    }
    match (sig.code(), value) {
        ('h', Value::UnixFd(raw)) => {
            let idx = match fds.iter().position(|existing| existing == raw) {
                Some(idx) => idx,
                None => {
                    fds.push(*raw);
                    fds.len() - 1
                }
            };
            Value::UnixFd(idx as u32)
        }
        ('v', Value::Variant(v)) => Value::Variant(Variant::new(
            v.signature.clone(),
            lower_value(&v.signature, &v.value, fds),
        )),
        ('(', Value::Struct(items)) | ('r', Value::Struct(items)) => Value::Struct(
            sig.children()
                .iter()
                .zip(items.iter())
                .map(|(child_sig, item)| lower_value(child_sig, item, fds))
                .collect(),
        ),
        ('a', Value::Dict(entries)) => {
            let child = &sig.children()[0];
            let key_sig = &child.children()[0];
            let value_sig = &child.children()[1];
            Value::Dict(
                entries
                    .iter()
                    .map(|(k, v)| {
                        (
                            lower_value(key_sig, k, fds),
                            lower_value(value_sig, v, fds),
                        )
                    })
                    .collect(),
            )
        }
        ('a', Value::Array(items)) => {
            let child = &sig.children()[0];
            Value::Array(
                items
                    .iter()
                    .map(|item| lower_value(child, item, fds))
                    .collect(),
            )
        }
        _ => value.clone(),
    }
}

/// Inverse of [`lower`]: replace each fd index in `body` with the real
/// descriptor at that position in `fds`, or [`FD_ABSENT`] if the index is
/// out of bounds.
pub fn lift(signature: &Signature, body: &[Value], fds: &[u32]) -> Vec<Value> {
    signature
        .children()
        .iter()
        .zip(body.iter())
        .map(|(sig, value)| lift_value(sig, value, fds))
        .collect()
}

fn lift_value(sig: &Signature, value: &Value, fds: &[u32]) -> Value {
    if !needs_descent(sig.text()) {
        return value.clone();
    }
    match (sig.code(), value) {
        ('h', Value::UnixFd(idx)) => {
            let real = fds.get(*idx as usize).copied().unwrap_or(FD_ABSENT);
            Value::UnixFd(real)
        }
        ('v', Value::Variant(v)) => Value::Variant(Variant::new(
            v.signature.clone(),
            lift_value(&v.signature, &v.value, fds),
        )),
        ('(', Value::Struct(items)) | ('r', Value::Struct(items)) => Value::Struct(
            sig.children()
                .iter()
                .zip(items.iter())
                .map(|(child_sig, item)| lift_value(child_sig, item, fds))
                .collect(),
        ),
        ('a', Value::Dict(entries)) => {
            let child = &sig.children()[0];
            let key_sig = &child.children()[0];
            let value_sig = &child.children()[1];
            Value::Dict(
                entries
                    .iter()
                    .map(|(k, v)| {
                        (
                            lift_value(key_sig, k, fds),
                            lift_value(value_sig, v, fds),
                        )
                    })
                    .collect(),
            )
        }
        ('a', Value::Array(items)) => {
            let child = &sig.children()[0];
            Value::Array(
                items
                    .iter()
                    .map(|item| lift_value(child, item, fds))
                    .collect(),
            )
        }
        _ => value.clone(),
    }
}

fn needs_descent(text: &str) -> bool {
    text.contains('h') || text.contains('v')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{parse, parse_one};

    #[test]
    fn lowers_and_lifts_a_plain_fd() {
        let sig = parse("h").unwrap();
        let body = vec![Value::UnixFd(42)];
        let (lowered, fds) = lower(&sig, &body);
        assert_eq!(lowered, vec![Value::UnixFd(0)]);
        assert_eq!(fds, vec![42]);
        let lifted = lift(&sig, &lowered, &fds);
        assert_eq!(lifted, body);
    }

    #[test]
    fn dedups_repeated_fds() {
        let sig = parse("ah").unwrap();
        let body = vec![Value::Array(vec![
            Value::UnixFd(7),
            Value::UnixFd(7),
            Value::UnixFd(9),
        ])];
        let (lowered, fds) = lower(&sig, &body);
        assert_eq!(fds, vec![7, 9]);
        assert_eq!(
            lowered,
            vec![Value::Array(vec![
                Value::UnixFd(0),
                Value::UnixFd(0),
                Value::UnixFd(1)
            ])]
        );
    }

    #[test]
    fn lift_out_of_bounds_index_yields_sentinel() {
        let sig = parse("h").unwrap();
        let body = vec![Value::UnixFd(5)];
        let lifted = lift(&sig, &body, &[]);
        assert_eq!(lifted, vec![Value::UnixFd(FD_ABSENT)]);
    }

    #[test]
    fn descends_through_variants() {
        let sig = parse("v").unwrap();
        let inner_sig = parse_one("h").unwrap();
        let body = vec![Value::Variant(Variant::new(inner_sig, Value::UnixFd(3)))];
        let (lowered, fds) = lower(&sig, &body);
        assert_eq!(fds, vec![3]);
        match &lowered[0] {
            Value::Variant(v) => assert_eq!(*v.value, Value::UnixFd(0)),
            _ => panic!("expected variant"),
        }
    }

    #[test]
    fn short_circuits_without_descent() {
        let sig = parse("s").unwrap();
        let body = vec![Value::String("no fds here".into())];
        let (lowered, fds) = lower(&sig, &body);
        assert_eq!(lowered, body);
        assert!(fds.is_empty());
    }
}
