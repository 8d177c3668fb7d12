use thiserror::Error;

#[derive(Debug, Error)]
pub enum JourneyError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("not allowed")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl JourneyError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Text safe to hand back to a caller. Internal failures never leak detail.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "Server error".to_string(),
            other => other.to_string(),
        }
    }
}

pub type JourneyResult<T> = Result<T, JourneyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_not_leaked() {
        let err: JourneyError = anyhow::anyhow!("connection refused on 10.0.0.4").into();
        assert_eq!(err.public_message(), "Server error");

        let err = JourneyError::validation("start_location", "must not be blank");
        assert_eq!(err.public_message(), "invalid start_location: must not be blank");
        assert_eq!(JourneyError::NotFound("journey").to_string(), "journey not found");
    }
}
