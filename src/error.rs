//! Error types for texter.

use crate::campaign::model::CampaignId;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Audience source error: {0}")]
    Source(#[from] SourceError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Campaign system error: {0}")]
    External(#[from] ExternalError),

    #[error("Campaign error: {0}")]
    Campaign(#[from] CampaignError),

    #[error("Approval error: {0}")]
    Approval(#[from] ApprovalError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Record store errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Subscriber / representative data source errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Audience source unavailable: {0}")]
    Unavailable(String),

    #[error("Audience query failed: {0}")]
    Query(String),
}

impl From<DatabaseError> for SourceError {
    fn from(e: DatabaseError) -> Self {
        SourceError::Unavailable(e.to_string())
    }
}

/// Outbound SMS transport errors.
///
/// Every variant carries (or implies) the transport-level status code, see
/// [`TransportError::status`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("got a bad phone number: to [{to}] from [{from}]")]
    InvalidNumber { to: String, from: String },

    /// Provider rejected the message and explained why.
    #[error("{message}")]
    Rejected {
        status: u16,
        message: String,
        code: i64,
        more_info: String,
    },

    #[error("unauthorized")]
    Unauthorized,

    #[error("couldn't find what you were looking for")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("too many requests")]
    RateLimited,

    #[error("unknown transport response (HTTP {0})")]
    UnexpectedResponse(u16),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl TransportError {
    /// Status code reported to callers for this failure.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidNumber { .. } => 400,
            Self::Rejected { status, .. } => *status,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::RateLimited => 429,
            Self::UnexpectedResponse(_) | Self::Http(_) => 500,
        }
    }
}

/// Errors talking to the external campaign system of record.
#[derive(Debug, thiserror::Error)]
pub enum ExternalError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("{endpoint} responded with HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

/// Campaign lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    /// Start failed before a worker could be registered. Carries the original
    /// failure and, when the termination notice also failed, that error too.
    #[error(
        "Campaign {id} failed to start: {source}; termination notice: {}",
        .notify_error.as_ref().map(|e| e.to_string()).unwrap_or_else(|| "delivered".to_string())
    )]
    StartFailed {
        id: CampaignId,
        #[source]
        source: Box<Error>,
        notify_error: Option<Box<Error>>,
    },

    #[error("Source campaign {id} has no saved state")]
    SourceNotFound { id: CampaignId },
}

/// Approval workflow errors.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("No approval request found for campaign {campaign_ref}")]
    RequestNotFound { campaign_ref: i64 },

    #[error("Requested Approver phone number not found in the list: {phone}")]
    ApproverNotFound { phone: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
