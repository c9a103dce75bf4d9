//! Error types for contactbook.
//!
//! This module defines all error types used throughout the contactbook crate,
//! providing enough context for callers to report failures and roll back
//! optimistic state.

use std::path::PathBuf;
use thiserror::Error;

use crate::store::MutationRequest;

/// The main error type for contactbook operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Contact Errors ===
    /// A document could not be mapped onto a contact.
    #[error("failed to decode document '{id}': {message}")]
    Decode {
        /// Identifier of the offending document.
        id: String,
        /// Description of what went wrong.
        message: String,
    },

    /// A contact failed validation before being written.
    #[error("invalid contact: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    // === Store Errors ===
    /// The requested document does not exist.
    #[error("document {collection}/{id} not found")]
    NotFound {
        /// Collection that was searched.
        collection: String,
        /// Identifier that was requested.
        id: String,
    },

    /// A live subscription reported a failure.
    #[error("subscription to '{collection}' failed: {message}")]
    Subscription {
        /// Collection the subscription was watching.
        collection: String,
        /// Description of the failure.
        message: String,
    },

    /// A write, patch or delete was rejected.
    #[error("failed to {request}: {message}")]
    Mutation {
        /// The request that failed, so the caller can roll back.
        request: Box<MutationRequest>,
        /// Description of the failure.
        message: String,
    },

    // === Photo Errors ===
    /// Encoding or decoding a contact photo failed.
    #[error("photo error: {0}")]
    Photo(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML serialization failed.
    #[error("TOML error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for contactbook operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new decode error for the given document.
    #[must_use]
    pub fn decode(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Create a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Create a subscription error.
    #[must_use]
    pub fn subscription(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscription {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Create a mutation error carrying the failed request.
    #[must_use]
    pub fn mutation(request: MutationRequest, message: impl Into<String>) -> Self {
        Self::Mutation {
            request: Box::new(request),
            message: message.into(),
        }
    }

    /// Create a new photo error.
    #[must_use]
    pub fn photo(message: impl Into<String>) -> Self {
        Self::Photo(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means the document does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error came from a rejected mutation.
    #[must_use]
    pub fn is_mutation_error(&self) -> bool {
        matches!(self, Self::Mutation { .. })
    }

    /// Check if this error came from a live subscription.
    #[must_use]
    pub fn is_subscription_error(&self) -> bool {
        matches!(self, Self::Subscription { .. })
    }

    /// The request that failed, if this is a mutation error.
    #[must_use]
    pub fn mutation_request(&self) -> Option<&MutationRequest> {
        match self {
            Self::Mutation { request, .. } => Some(request),
            _ => None,
        }
    }
}
