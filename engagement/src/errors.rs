use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder, ResponseError};
use charybdis::errors::CharybdisError;
use serde_json::json;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum RedisError {
    PoolError(deadpool::managed::PoolError<redis::RedisError>),
    RedisError(redis::RedisError),
}

impl fmt::Display for RedisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedisError::PoolError(e) => write!(f, "Pool Error: {}", e),
            RedisError::RedisError(e) => write!(f, "Redis Error: {}", e),
        }
    }
}

impl Error for RedisError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RedisError::PoolError(e) => Some(e),
            RedisError::RedisError(e) => Some(e),
        }
    }
}

#[derive(Debug)]
pub enum EngagementError {
    // 400s
    Unauthorized(&'static str),
    NotFound(String),
    ValidationError((String, String)),
    // 503
    RedisError(RedisError),
    CharybdisError(CharybdisError),
    Timeout(String),
    LockerError(String),
    // 500
    ConfigError(String),
    InternalServerError(String),
}

impl EngagementError {
    /// Infrastructure failures that a caller may retry. Anything else is either a caller
    /// mistake or a bug, and retrying it yields the same result.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngagementError::RedisError(_)
                | EngagementError::CharybdisError(_)
                | EngagementError::Timeout(_)
                | EngagementError::LockerError(_)
        )
    }
}

impl fmt::Display for EngagementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngagementError::Unauthorized(e) => write!(f, "Unauthorized: {}", e),
            EngagementError::NotFound(e) => write!(f, "Not Found: {}", e),
            EngagementError::ValidationError((field, message)) => {
                write!(f, "Validation Error: {}: {}", field, message)
            }
            EngagementError::RedisError(e) => write!(f, "Redis Error: \n{}", e),
            EngagementError::CharybdisError(e) => write!(f, "Charybdis Error: \n{}", e),
            EngagementError::Timeout(e) => write!(f, "Timeout: {}", e),
            EngagementError::LockerError(e) => write!(f, "Locker Error: {}", e),
            EngagementError::ConfigError(e) => write!(f, "Config Error: {}", e),
            EngagementError::InternalServerError(e) => write!(f, "InternalServerError: \n{}", e),
        }
    }
}

impl Error for EngagementError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngagementError::RedisError(e) => Some(e),
            EngagementError::CharybdisError(e) => Some(e),
            EngagementError::Unauthorized(_)
            | EngagementError::NotFound(_)
            | EngagementError::ValidationError(_)
            | EngagementError::Timeout(_)
            | EngagementError::LockerError(_)
            | EngagementError::ConfigError(_)
            | EngagementError::InternalServerError(_) => None,
        }
    }
}

impl ResponseError for EngagementError {
    fn error_response(&self) -> HttpResponse {
        match self {
            EngagementError::Unauthorized(e) => HttpResponse::Unauthorized().json(json!({
                "status": 401,
                "message": e
            })),
            EngagementError::ValidationError((field, message)) => HttpResponse::BadRequest().json(json!({
                "status": 400,
                "message": {field: message}
            })),
            EngagementError::NotFound(e) => HttpResponse::NotFound().json(json!({
                "status": 404,
                "message": e
            })),
            e if e.is_retryable() => {
                log::warn!("Service Unavailable: {}", e);

                HttpResponseBuilder::new(StatusCode::SERVICE_UNAVAILABLE).json(json!({
                    "status": 503,
                    "message": "Interaction store unavailable, retry later",
                    "retryable": true
                }))
            }
            _ => {
                log::error!("Internal Server Error: {}", self);

                HttpResponse::InternalServerError().json(json!({
                    "status": 500,
                    "message": self.to_string()
                }))
            }
        }
    }
}

impl From<CharybdisError> for EngagementError {
    fn from(e: CharybdisError) -> Self {
        EngagementError::CharybdisError(e)
    }
}

impl From<deadpool::managed::PoolError<redis::RedisError>> for EngagementError {
    fn from(e: deadpool::managed::PoolError<redis::RedisError>) -> Self {
        EngagementError::RedisError(RedisError::PoolError(e))
    }
}

impl From<redis::RedisError> for EngagementError {
    fn from(e: redis::RedisError) -> Self {
        EngagementError::RedisError(RedisError::RedisError(e))
    }
}

impl From<toml::de::Error> for EngagementError {
    fn from(e: toml::de::Error) -> Self {
        EngagementError::ConfigError(e.to_string())
    }
}
