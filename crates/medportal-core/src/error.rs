use thiserror::Error;

/// Core error types for MedPortal domain operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid ID: {0}")]
    InvalidId(String),

    #[error("Invalid date/time: {0}")]
    InvalidDateTime(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Time formatting error: {0}")]
    TimeFormat(#[from] time::error::Format),
}

impl CoreError {
    /// Create a new InvalidId error
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    /// Create a new InvalidDateTime error
    pub fn invalid_date_time(datetime: impl Into<String>) -> Self {
        Self::InvalidDateTime(datetime.into())
    }

    /// Create a new InvalidRole error
    pub fn invalid_role(role: impl Into<String>) -> Self {
        Self::InvalidRole(role.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(CoreError::invalid_id("a/b").to_string(), "Invalid ID: a/b");
        assert_eq!(
            CoreError::invalid_role("nurse").to_string(),
            "Invalid role: nurse"
        );
    }
}
