//! Error types for Talon

use thiserror::Error;

/// The main error type for Talon operations
#[derive(Debug, Error)]
pub enum TalonError {
    /// Spawning with a missing template is a contract violation at the
    /// call site, never a silent no-op.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Anchor not found: {0}")]
    AnchorNotFound(String),

    /// Kill-tracking bookkeeping lost sight of a tracked spawn. Callers
    /// log and skip the update rather than aborting the tick.
    #[error("Tracked spawn desync in spawner {spawner}: {detail}")]
    TrackedSpawnDesync { spawner: String, detail: String },

    /// Checkpoint load found no snapshot for the requested identity.
    /// Callers fall back to the default/unfired state.
    #[error("No checkpoint state for actor: {0}")]
    StateNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Stage error: {0}")]
    StageError(String),

    #[error("Duplicate actor name: {0}")]
    DuplicateActorName(String),

    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    #[error("Value out of range: {field} must be between {min} and {max}, got {value}")]
    ValueOutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),
}

/// Result type alias for Talon operations
pub type Result<T> = std::result::Result<T, TalonError>;

impl From<toml::de::Error> for TalonError {
    fn from(err: toml::de::Error) -> Self {
        TalonError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for TalonError {
    fn from(err: toml::ser::Error) -> Self {
        TalonError::TomlSerError(err.to_string())
    }
}
