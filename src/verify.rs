//! Verifying a value tree conforms to a signature tree.

use crate::signature::Signature;
use crate::validation;
use crate::value::Value;

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct VerifyError {
    pub path: String,
    pub reason: String,
}

impl VerifyError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        VerifyError {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "signature/body mismatch at {}: {}", self.path, self.reason)
    }
}

impl std::error::Error for VerifyError {}

/// Verify a whole message body (one value per child of `signature`, which
/// must be a root node of code `r`) against its signature.
pub fn verify(signature: &Signature, body: &[Value]) -> Result<(), VerifyError> {
    let children = signature.children();
    if body.len() != children.len() {
        return Err(VerifyError::new(
            "body",
            format!(
                "expected {} top-level value(s), got {}",
                children.len(),
                body.len()
            ),
        ));
    }
    for (idx, (child_sig, value)) in children.iter().zip(body.iter()).enumerate() {
        verify_value(child_sig, value, &format!("body[{idx}]"))?;
    }
    Ok(())
}

fn verify_value(sig: &Signature, value: &Value, path: &str) -> Result<(), VerifyError> {
    let code = sig.code();
    match (code, value) {
        ('y', Value::Byte(_)) => Ok(()),
        ('b', Value::Boolean(_)) => Ok(()),
        ('n', Value::Int16(_)) => Ok(()),
        ('q', Value::Uint16(_)) => Ok(()),
        ('i', Value::Int32(_)) => Ok(()),
        ('u', Value::Uint32(_)) => Ok(()),
        ('x', Value::Int64(_)) => Ok(()),
        ('t', Value::Uint64(_)) => Ok(()),
        ('d', Value::Double(_)) => Ok(()),
        ('h', Value::UnixFd(_)) => Ok(()),
        ('s', Value::String(_)) => Ok(()),
        ('o', Value::ObjectPath(p)) => validation::validate_object_path(p)
            .map_err(|e| VerifyError::new(path, format!("invalid object path: {e}"))),
        ('g', Value::Signature(s)) | ('g', Value::String(s)) => {
            if s.len() > crate::signature::MAX_SIGNATURE_LEN {
                Err(VerifyError::new(path, "signature string longer than 255 bytes"))
            } else {
                Ok(())
            }
        }
        ('v', Value::Variant(v)) => {
            verify_value(&v.signature, &v.value, &format!("{path}.variant"))
        }
        ('a', Value::Dict(entries)) => {
            let child = sig.children().first().ok_or_else(|| {
                VerifyError::new(path, "array signature is missing its element type")
            })?;
            if child.code() != '{' {
                return Err(VerifyError::new(
                    path,
                    format!("expected {}, got a dict", child.text()),
                ));
            }
            let key_sig = &child.children()[0];
            let val_sig = &child.children()[1];
            for (idx, (k, v)) in entries.iter().enumerate() {
                verify_value(key_sig, k, &format!("{path}.dict[{idx}].key"))?;
                verify_value(val_sig, v, &format!("{path}.dict[{idx}].value"))?;
            }
            Ok(())
        }
        ('a', Value::ByteArray(_)) => {
            let child = sig.children().first().ok_or_else(|| {
                VerifyError::new(path, "array signature is missing its element type")
            })?;
            if child.code() != 'y' {
                Err(VerifyError::new(
                    path,
                    format!("expected array of {}, got a byte array", child.text()),
                ))
            } else {
                Ok(())
            }
        }
        ('a', Value::Array(items)) => {
            let child = sig.children().first().ok_or_else(|| {
                VerifyError::new(path, "array signature is missing its element type")
            })?;
            if child.code() == '{' {
                return Err(VerifyError::new(
                    path,
                    "expected a dict, got a plain array",
                ));
            }
            for (idx, item) in items.iter().enumerate() {
                verify_value(child, item, &format!("{path}[{idx}]"))?;
            }
            Ok(())
        }
        ('(', Value::Struct(items)) | ('r', Value::Struct(items)) => {
            if items.len() != sig.children().len() {
                return Err(VerifyError::new(
                    path,
                    format!(
                        "struct {} expects {} field(s), got {}",
                        sig.text(),
                        sig.children().len(),
                        items.len()
                    ),
                ));
            }
            for (idx, (field_sig, item)) in sig.children().iter().zip(items.iter()).enumerate() {
                verify_value(field_sig, item, &format!("{path}.{idx}"))?;
            }
            Ok(())
        }
        (c, v) => Err(VerifyError::new(
            path,
            format!("expected type '{c}', got a value shaped like '{}'", v.kind_label()),
        )),
    }
}
