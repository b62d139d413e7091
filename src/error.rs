/// Error Handling Module
///
/// One error type per concern, unified under `AppError`, which is the only
/// error that crosses into the HTTP layer. It covers:
/// 1. Domain-specific error types (validation, auth, token, store, config)
/// 2. HTTP response mapping with structured logging
/// 3. Request-scoped error context

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for caller-supplied input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("username or email is required")]
    MissingIdentifier,
    #[error("{0} is empty")]
    EmptyField(&'static str),
    #[error("{0} is too short (minimum {1} characters)")]
    TooShort(&'static str, usize),
    #[error("{0} is too long (maximum {1} characters)")]
    TooLong(&'static str, usize),
    #[error("{0} has invalid format")]
    InvalidFormat(&'static str),
    #[error("{0} contains suspicious content")]
    SuspiciousContent(&'static str),
}

/// Authentication errors
///
/// `UserNotFound` and `InvalidCredentials` are kept apart for logging only;
/// both render the same response so callers cannot tell which accounts exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("user does not exist")]
    UserNotFound,
    #[error("password incorrect")]
    InvalidCredentials,
    #[error("missing access token")]
    MissingToken,
    #[error("invalid or expired access token")]
    InvalidAccessToken,
}

/// Refresh-token lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("refresh token is expired or used")]
    RefreshTokenReused,
    #[error("token has expired")]
    ExpiredToken,
    #[error("something went wrong while generating access and refresh token")]
    TokenGenerationFailed,
}

/// Document store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate entry: {0}")]
    Duplicate(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("query error: {0}")]
    Query(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Duplicate("user with username or email already exists".to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Query(err.to_string()),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required config: {0}")]
    MissingRequired(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(err.into())
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Message shared by every credential failure.
pub const INCORRECT_CREDENTIALS: &str = "Incorrect username, email or password";

/// Error response body
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl AppError {
    /// Status, machine code and client-facing message for this error.
    ///
    /// Internal detail (store topology, signing failures) never reaches the message.
    pub fn public_parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),

            AppError::Auth(e) => match e {
                AuthError::UserNotFound | AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    INCORRECT_CREDENTIALS.to_string(),
                ),
                AuthError::MissingToken => (
                    StatusCode::UNAUTHORIZED,
                    "MISSING_TOKEN",
                    "Unauthorized request".to_string(),
                ),
                AuthError::InvalidAccessToken => (
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_INVALID",
                    "Invalid or expired token".to_string(),
                ),
            },

            AppError::Token(e) => match e {
                TokenError::InvalidRefreshToken => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_REFRESH_TOKEN",
                    e.to_string(),
                ),
                TokenError::RefreshTokenReused => (
                    StatusCode::UNAUTHORIZED,
                    "REFRESH_TOKEN_REUSED",
                    e.to_string(),
                ),
                TokenError::ExpiredToken => {
                    (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED", e.to_string())
                }
                TokenError::TokenGenerationFailed => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "TOKEN_GENERATION_FAILED",
                    e.to_string(),
                ),
            },

            AppError::Store(e) => match e {
                StoreError::Duplicate(_) => (
                    StatusCode::CONFLICT,
                    "DUPLICATE_ENTRY",
                    "User with username or email already exists".to_string(),
                ),
                StoreError::Unavailable(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Store temporarily unavailable".to_string(),
                ),
                StoreError::Query(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "Store error occurred".to_string(),
                ),
            },

            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Server configuration error".to_string(),
            ),

            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = self.public_parts();
        let body = ErrorResponse::new(
            request_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
        );
        (status, body)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Token(TokenError::TokenGenerationFailed) => {
                tracing::error!(request_id = request_id, error = %self, "Token generation error");
            }
            AppError::Token(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Refresh token rejected");
            }
            AppError::Store(StoreError::Duplicate(_)) => {
                tracing::warn!(request_id = request_id, error = %self, "Duplicate entry attempt");
            }
            AppError::Store(e) => {
                tracing::error!(request_id = request_id, error = %e, "Store error");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, body) = <Self as ErrorHandler>::error_response(self, &request_id);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.public_parts().0
    }
}

// ============================================================================
// 4. ERROR CONTEXT
// ============================================================================

/// Request-scoped context attached to handler logs
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: impl ToString) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    /// Log `error` under this context and tag it with the same request id.
    pub fn fail(&self, error: impl Into<AppError>) -> TrackedError {
        let error = error.into();
        self.log_error(&error);
        TrackedError {
            request_id: self.request_id.clone(),
            error,
        }
    }

    pub fn log_error(&self, error: &AppError) {
        let context = serde_json::json!({
            "request_id": self.request_id,
            "operation": self.operation,
            "user_id": self.user_id,
            "timestamp": self.timestamp.to_rfc3339(),
        });

        match error {
            AppError::Validation(_) | AppError::Auth(_) => {
                tracing::warn!(error = %error, context = ?context, "Request rejected");
            }
            AppError::Token(TokenError::TokenGenerationFailed) => {
                tracing::error!(error = %error, context = ?context, "Token generation error");
            }
            AppError::Token(_) => {
                tracing::warn!(error = %error, context = ?context, "Refresh token rejected");
            }
            _ => {
                tracing::error!(error = %error, context = ?context, "Request failed");
            }
        }
    }
}

/// An `AppError` bound to the request id it was logged under, so the
/// `error_id` a client sees matches the handler's log entry.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct TrackedError {
    request_id: String,
    error: AppError,
}

impl TrackedError {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn error(&self) -> &AppError {
        &self.error
    }
}

/// Errors raised outside any `ErrorContext` get their own id, logged here.
impl From<AppError> for TrackedError {
    fn from(error: AppError) -> Self {
        let request_id = uuid::Uuid::new_v4().to_string();
        error.log_error(&request_id);
        Self { request_id, error }
    }
}

impl ResponseError for TrackedError {
    fn error_response(&self) -> HttpResponse {
        let (status, body) = ErrorHandler::error_response(&self.error, &self.request_id);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.error.public_parts().0
    }
}
