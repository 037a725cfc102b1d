//! Name validators for the D-Bus naming conventions (object paths, interface
//! names, member names, bus names) applied at `Message` construction time.

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum ValidationError {
    InvalidObjectPath,
    InvalidInterface,
    InvalidErrorName,
    InvalidMemberName,
    InvalidBusName,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ValidationError::InvalidObjectPath => "not a valid object path",
            ValidationError::InvalidInterface => "not a valid interface name",
            ValidationError::InvalidErrorName => "not a valid error name",
            ValidationError::InvalidMemberName => "not a valid member name",
            ValidationError::InvalidBusName => "not a valid bus name",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ValidationError {}

type Result<T> = std::result::Result<T, ValidationError>;

pub fn validate_object_path(path: &str) -> Result<()> {
    if path.is_empty() || !path.starts_with('/') {
        return Err(ValidationError::InvalidObjectPath);
    }
    if path.len() > 1 {
        let elements: Vec<&str> = path.split('/').collect();
        if elements.len() < 2 {
            return Err(ValidationError::InvalidObjectPath);
        }
        for element in &elements[1..] {
            if element.is_empty() {
                return Err(ValidationError::InvalidObjectPath);
            }
            if element.chars().next().map(|c| c.is_numeric()) == Some(true) {
                return Err(ValidationError::InvalidObjectPath);
            }
            if !element.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(ValidationError::InvalidObjectPath);
            }
        }
    }
    Ok(())
}

pub fn validate_interface(name: &str) -> Result<()> {
    if name.len() < 3 || !name.contains('.') {
        return Err(ValidationError::InvalidInterface);
    }
    let elements: Vec<&str> = name.split('.').collect();
    if elements.len() < 2 {
        return Err(ValidationError::InvalidInterface);
    }
    for element in elements {
        if element.is_empty() {
            return Err(ValidationError::InvalidInterface);
        }
        if element.chars().next().map(|c| c.is_numeric()) == Some(true) {
            return Err(ValidationError::InvalidInterface);
        }
        if !element.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(ValidationError::InvalidInterface);
        }
    }
    Ok(())
}

pub fn validate_error_name(name: &str) -> Result<()> {
    validate_interface(name).map_err(|_| ValidationError::InvalidErrorName)
}

pub fn validate_member_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(ValidationError::InvalidMemberName);
    }
    Ok(())
}

pub fn validate_bus_name(name: &str) -> Result<()> {
    if name.len() < 3 || !name.contains('.') {
        return Err(ValidationError::InvalidBusName);
    }
    let (unique, rest) = if let Some(stripped) = name.strip_prefix(':') {
        (true, stripped)
    } else {
        (false, name)
    };
    let elements: Vec<&str> = rest.split('.').collect();
    if elements.len() < 2 {
        return Err(ValidationError::InvalidBusName);
    }
    for element in elements {
        if element.is_empty() {
            return Err(ValidationError::InvalidBusName);
        }
        if !unique && element.chars().next().map(|c| c.is_numeric()) == Some(true) {
            return Err(ValidationError::InvalidBusName);
        }
        if !element
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ValidationError::InvalidBusName);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_paths() {
        assert!(validate_object_path("/").is_ok());
        assert!(validate_object_path("/org/freedesktop/DBus").is_ok());
        assert!(validate_object_path("").is_err());
        assert!(validate_object_path("no/leading/slash").is_err());
        assert!(validate_object_path("/trailing/").is_err());
        assert!(validate_object_path("/1abc").is_err());
    }

    #[test]
    fn interfaces() {
        assert!(validate_interface("org.freedesktop.DBus.Peer").is_ok());
        assert!(validate_interface("noseparator").is_err());
        assert!(validate_interface("org.1abc").is_err());
    }

    #[test]
    fn member_names() {
        assert!(validate_member_name("Ping").is_ok());
        assert!(validate_member_name("").is_err());
        assert!(validate_member_name("has.dot").is_err());
    }

    #[test]
    fn bus_names() {
        assert!(validate_bus_name("org.freedesktop.DBus").is_ok());
        assert!(validate_bus_name(":1.42").is_ok());
        assert!(validate_bus_name("org.1abc").is_err());
        assert!(validate_bus_name(":1.42-foo").is_ok());
    }
}
