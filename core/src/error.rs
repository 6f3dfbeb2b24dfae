use thiserror::Error;

#[derive(Debug, Error)]
pub enum RowmapError {
    /// Operation attempted before `connect()` (or after `close()`)
    #[error("Adapter is not connected")]
    NotConnected,

    /// Underlying statement execution failure, dialect-agnostic form
    #[error("Driver error: {0}")]
    Driver(String),

    /// Invalid entity configuration, relation mapping, or query request
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Rendered placeholder count does not match the bound parameter count
    #[error("Placeholder mismatch: query has {expected} placeholders but {actual} parameters were bound")]
    PlaceholderMismatch { expected: usize, actual: usize },

    /// Error with transaction handling
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A computed property implementation failed; recovered per property
    #[error("Computed property '{property}' failed: {message}")]
    ComputedProperty { property: String, message: String },

    /// Error converting between rows and entities
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// No rows returned when at least one was expected
    #[error("No rows found")]
    NotFound,

    /// A hook handler rejected or failed the operation
    #[error("Hook error: {0}")]
    Hook(String),

    /// Rusqlite specific errors
    #[cfg(feature = "rusqlite")]
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for database operations
pub type Result<T> = std::result::Result<T, RowmapError>;
