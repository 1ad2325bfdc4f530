use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

const DATABASE_SAFE_MESSAGE: &str = "An internal error occurred. Please try again later.";
const CONFIGURATION_SAFE_MESSAGE: &str = "A server configuration error occurred.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Idempotency,
    NotFound,
    Security,
    Database,
    Configuration,
    RateLimit,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Idempotency => "IdempotencyError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Security => "SecurityError",
            ErrorKind::Database => "DatabaseError",
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::RateLimit => "RateLimitError",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
        value: Option<String>,
    },

    #[error("Transaction {tx_id} already processed")]
    Idempotency { tx_id: String },

    #[error("{resource} not found")]
    NotFound { resource: String, identifier: String },

    #[error("{message}")]
    Security {
        message: String,
        security_context: Option<String>,
    },

    #[error("{message}")]
    Database {
        message: String,
        operation: Option<String>,
        driver_error: Option<String>,
    },

    #[error("{message}")]
    Configuration {
        message: String,
        config_key: Option<String>,
    },

    #[error("{message}")]
    RateLimit {
        message: String,
        limit: u32,
        window: String,
        retry_after_secs: u64,
    },
}

/// Full diagnostic view of an error. Goes to logs, never over the wire.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub kind: &'static str,
    pub message: String,
    pub internal_detail: Option<String>,
    pub structured_context: Map<String, Value>,
}

/// Client-safe rendering written into HTTP responses.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SafeErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
}

impl SafeErrorBody {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: kind.as_str(),
            message: message.into(),
            field: None,
            tx_id: None,
            limit: None,
            window: None,
        }
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.into()),
            value: None,
        }
    }

    pub fn validation_with_value(
        message: impl Into<String>,
        field: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.into()),
            value: Some(value.to_string()),
        }
    }

    pub fn not_found(resource: impl Into<String>, identifier: impl Into<String>) -> Self {
        AppError::NotFound {
            resource: resource.into(),
            identifier: identifier.into(),
        }
    }

    pub fn security(message: impl Into<String>, security_context: impl Into<String>) -> Self {
        AppError::Security {
            message: message.into(),
            security_context: Some(security_context.into()),
        }
    }

    pub fn database(
        message: impl Into<String>,
        operation: impl Into<String>,
        driver_error: impl ToString,
    ) -> Self {
        AppError::Database {
            message: message.into(),
            operation: Some(operation.into()),
            driver_error: Some(driver_error.to_string()),
        }
    }

    pub fn configuration(message: impl Into<String>, config_key: impl Into<String>) -> Self {
        AppError::Configuration {
            message: message.into(),
            config_key: Some(config_key.into()),
        }
    }

    pub fn rate_limited(limit: u32, window: impl Into<String>, retry_after_secs: u64) -> Self {
        AppError::RateLimit {
            message: "Rate limit exceeded".to_string(),
            limit,
            window: window.into(),
            retry_after_secs,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation { .. } => ErrorKind::Validation,
            AppError::Idempotency { .. } => ErrorKind::Idempotency,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::Security { .. } => ErrorKind::Security,
            AppError::Database { .. } => ErrorKind::Database,
            AppError::Configuration { .. } => ErrorKind::Configuration,
            AppError::RateLimit { .. } => ErrorKind::RateLimit,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Idempotency { .. } => StatusCode::CONFLICT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Security { .. } => StatusCode::UNAUTHORIZED,
            AppError::Database { .. } | AppError::Configuration { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn internal_record(&self) -> ErrorRecord {
        let mut context = Map::new();
        let internal_detail = match self {
            AppError::Validation { field, value, .. } => {
                if let Some(field) = field {
                    context.insert("field".into(), json!(field));
                    if let Some(value) = value {
                        context.insert("invalid_value".into(), json!(value));
                    }
                }
                field
                    .as_ref()
                    .map(|f| format!("Validation failed for field: {}", f))
            }
            AppError::Idempotency { tx_id } => {
                context.insert("tx_id".into(), json!(tx_id));
                Some(format!("Duplicate tx_id: {}", tx_id))
            }
            AppError::NotFound {
                resource,
                identifier,
            } => {
                context.insert("resource".into(), json!(resource));
                context.insert("identifier".into(), json!(identifier));
                Some(format!(
                    "{} with id '{}' does not exist",
                    resource, identifier
                ))
            }
            AppError::Security {
                security_context, ..
            } => {
                if let Some(ctx) = security_context {
                    context.insert("security_context".into(), json!(ctx));
                }
                security_context
                    .as_ref()
                    .map(|ctx| format!("Security failure in: {}", ctx))
            }
            AppError::Database {
                operation,
                driver_error,
                ..
            } => {
                if let Some(op) = operation {
                    context.insert("operation".into(), json!(op));
                }
                if let Some(err) = driver_error {
                    context.insert("database_error".into(), json!(err));
                }
                match (operation, driver_error) {
                    (Some(op), Some(err)) => {
                        Some(format!("Failed database operation: {}: {}", op, err))
                    }
                    (Some(op), None) => Some(format!("Failed database operation: {}", op)),
                    (None, Some(err)) => Some(err.clone()),
                    (None, None) => None,
                }
            }
            AppError::Configuration { config_key, .. } => {
                if let Some(key) = config_key {
                    context.insert("config_key".into(), json!(key));
                }
                config_key
                    .as_ref()
                    .map(|key| format!("Configuration error for: {}", key))
            }
            AppError::RateLimit { limit, window, .. } => {
                context.insert("limit".into(), json!(limit));
                context.insert("window".into(), json!(window));
                Some(format!("Rate limit exceeded: {}/{}", limit, window))
            }
        };

        ErrorRecord {
            kind: self.kind().as_str(),
            message: self.to_string(),
            internal_detail,
            structured_context: context,
        }
    }

    pub fn sanitized(&self) -> SafeErrorBody {
        let kind = self.kind();
        match self {
            AppError::Validation { message, field, .. } => SafeErrorBody {
                field: field.clone(),
                ..SafeErrorBody::new(kind, message.clone())
            },
            AppError::Idempotency { tx_id } => SafeErrorBody {
                tx_id: Some(tx_id.clone()),
                ..SafeErrorBody::new(kind, self.to_string())
            },
            AppError::NotFound { .. } => SafeErrorBody::new(kind, self.to_string()),
            AppError::Security { message, .. } => SafeErrorBody::new(kind, message.clone()),
            AppError::Database { .. } => SafeErrorBody::new(kind, DATABASE_SAFE_MESSAGE),
            AppError::Configuration { .. } => {
                SafeErrorBody::new(kind, CONFIGURATION_SAFE_MESSAGE)
            }
            AppError::RateLimit {
                message,
                limit,
                window,
                ..
            } => SafeErrorBody {
                limit: Some(*limit),
                window: Some(window.clone()),
                ..SafeErrorBody::new(kind, message.clone())
            },
        }
    }

    fn log(&self, status: StatusCode) {
        let record = self.internal_record();
        let context = Value::Object(record.structured_context.clone());
        let detail = record.internal_detail.as_deref().unwrap_or("");
        if status.is_server_error() {
            tracing::error!(
                error_kind = record.kind,
                detail = %detail,
                context = %context,
                "[{}] {}",
                record.kind,
                record.message
            );
        } else {
            tracing::warn!(
                error_kind = record.kind,
                detail = %detail,
                context = %context,
                "[{}] {}",
                record.kind,
                record.message
            );
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        self.log(status);

        let mut response = (status, Json(self.sanitized())).into_response();
        if let AppError::RateLimit {
            retry_after_secs, ..
        } = &self
        {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        // Read back by the metrics middleware.
        response.extensions_mut().insert(self.kind());
        response
    }
}
