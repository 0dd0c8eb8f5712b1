use thiserror::Error;

/// Error type shared by the API, CLI and risk-table loading.
///
/// The simulation engine itself never fails; everything here is raised at the
/// boundary before or after the pure computation runs.
#[derive(Debug, Error)]
pub enum SimError {
    // ── Request validation ──────────────────────────────────────────
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    // ── Users ───────────────────────────────────────────────────────
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    // ── Risk data ───────────────────────────────────────────────────
    #[error("Risk table error: {0}")]
    RiskTable(String),

    #[error("File I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl SimError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        SimError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Request field the error refers to, if any.
    pub fn location(&self) -> Option<&'static str> {
        match self {
            SimError::MissingField(field) | SimError::Validation { field, .. } => Some(*field),
            SimError::UsernameTaken(_) => Some("username"),
            _ => None,
        }
    }

    /// Message without the field or value it concerns; the field goes in
    /// `location`.
    pub fn message(&self) -> String {
        match self {
            SimError::MissingField(_) => "Missing field".to_string(),
            SimError::Validation { message, .. } => message.clone(),
            SimError::UsernameTaken(_) => "Username already taken".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for SimError {
    fn from(e: std::io::Error) -> Self {
        SimError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for SimError {
    fn from(e: serde_json::Error) -> Self {
        SimError::Json(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_reported_for_field_errors_only() {
        assert_eq!(SimError::MissingField("ea").location(), Some("ea"));
        assert_eq!(
            SimError::validation("year", "must be >= 0").location(),
            Some("year")
        );
        assert_eq!(
            SimError::UsernameTaken("saver".into()).location(),
            Some("username")
        );
        assert_eq!(SimError::UserNotFound("x".into()).location(), None);
        assert_eq!(SimError::MalformedRequest("eof".into()).location(), None);
    }

    #[test]
    fn message_drops_the_field() {
        assert_eq!(SimError::MissingField("ea").message(), "Missing field");
        assert_eq!(
            SimError::validation("year", "must be >= 0").message(),
            "must be >= 0"
        );
        assert_eq!(
            SimError::UsernameTaken("saver".into()).message(),
            "Username already taken"
        );
        assert_eq!(
            SimError::UserNotFound("x".into()).message(),
            "User not found: x"
        );
    }

    #[test]
    fn display_includes_field_and_message() {
        let err = SimError::validation("currentFund", "must be a finite number");
        assert_eq!(err.to_string(), "Invalid currentFund: must be a finite number");
    }

    #[test]
    fn json_errors_convert() {
        let err: SimError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, SimError::Json(_)));
    }
}
