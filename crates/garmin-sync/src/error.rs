use thiserror::Error;

/// Main error type for garmin-sync
#[derive(Error, Debug)]
pub enum GarminError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authentication required. Store an OAuth2 token for this profile first.")]
    NotAuthenticated,

    #[error("Rate limited. Please wait before retrying.")]
    RateLimited,

    #[error("Connection error: {0}")]
    Connectivity(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response shape: {0}")]
    Protocol(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unrecognized activity file format")]
    UnrecognizedFormat,

    #[error("Malformed activity file: {0}")]
    MalformedFile(String),

    #[error("Failed to decode activity file: {0}")]
    Decode(String),

    #[error("Activity {0} already exists")]
    DuplicateActivity(i64),

    #[error("Database error: {0}")]
    Database(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("A sync run is already in progress")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, GarminError>;

impl GarminError {
    /// Create an authentication error from a message
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a configuration error from a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a protocol error for an unexpected response body
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create an invalid parameter error from a message
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedFile(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Errors caused by the network or the remote service refusing us
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Connectivity(_)
                | Self::Http(_)
                | Self::RateLimited
                | Self::NotAuthenticated
                | Self::Authentication(_)
        )
    }

    /// Errors about the content of a downloaded activity file
    pub fn is_file_content(&self) -> bool {
        matches!(
            self,
            Self::UnrecognizedFormat | Self::MalformedFile(_) | Self::Decode(_)
        )
    }
}

/// Render an error for the terminal, with a hint where one helps
pub fn format_user_error(err: &GarminError) -> String {
    match err {
        GarminError::NotAuthenticated | GarminError::Authentication(_) => format!(
            "{}\nHint: save a valid oauth2_token.json in the profile data directory and retry.",
            err
        ),
        GarminError::Http(e) if e.is_timeout() => {
            format!("Request timed out: {}", e)
        }
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GarminError::Authentication("Invalid credentials".to_string());
        assert_eq!(err.to_string(), "Authentication error: Invalid credentials");
    }

    #[test]
    fn test_not_authenticated_hint() {
        let err = GarminError::NotAuthenticated;
        let rendered = format_user_error(&err);
        assert!(rendered.contains("oauth2_token.json"));
    }

    #[test]
    fn test_duplicate_activity_display() {
        let err = GarminError::DuplicateActivity(555);
        assert_eq!(err.to_string(), "Activity 555 already exists");
    }

    #[test]
    fn test_classification() {
        assert!(GarminError::RateLimited.is_connectivity());
        assert!(GarminError::NotAuthenticated.is_connectivity());
        assert!(!GarminError::UnrecognizedFormat.is_connectivity());

        assert!(GarminError::UnrecognizedFormat.is_file_content());
        assert!(GarminError::malformed("no laps").is_file_content());
        assert!(GarminError::decode("bad crc").is_file_content());

        assert!(GarminError::NotFound("activity 1".into()).is_not_found());
        assert!(!GarminError::Database("locked".into()).is_not_found());
    }

    #[test]
    fn test_error_constructors() {
        let auth_err = GarminError::auth("test auth");
        assert!(matches!(auth_err, GarminError::Authentication(_)));

        let config_err = GarminError::config("test config");
        assert!(matches!(config_err, GarminError::Config(_)));

        let response_err = GarminError::protocol("bad response");
        assert!(matches!(response_err, GarminError::Protocol(_)));

        let param_err = GarminError::invalid_param("bad param");
        assert!(matches!(param_err, GarminError::InvalidParameter(_)));
    }
}
