use thiserror::Error;

const MAX_ID_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("ID is empty")]
    Empty,
    #[error("ID exceeds {MAX_ID_LEN} characters")]
    TooLong,
    #[error("ID contains invalid character {0:?}")]
    InvalidCharacter(char),
}

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Ids come from URL paths and request bodies; only `[A-Za-z0-9_-]` is accepted.
pub fn validate_id(id: &str) -> Result<(), IdError> {
    if id.is_empty() {
        return Err(IdError::Empty);
    }
    if id.len() > MAX_ID_LEN {
        return Err(IdError::TooLong);
    }
    match id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        Some(c) => Err(IdError::InvalidCharacter(c)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_valid_and_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert!(validate_id(&a).is_ok());
    }

    #[test]
    fn rejects_bad_ids() {
        assert_eq!(validate_id(""), Err(IdError::Empty));
        assert_eq!(validate_id("a/b"), Err(IdError::InvalidCharacter('/')));
        assert_eq!(validate_id(&"x".repeat(65)), Err(IdError::TooLong));
        assert!(validate_id("65f1c0ab12_x-9").is_ok());
    }
}
