//! Error types for the entry store and its collaborators.

use thiserror::Error;

/// Main error type for store, draft and journal operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage initialization failed: {0}")]
    Init(String),

    #[error("Storage write rejected: {0}")]
    Write(String),

    #[error("Storage read failed: {0}")]
    Read(String),

    #[error("Malformed draft: {0}")]
    MalformedDraft(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,

    #[error("Storage task failed: {0}")]
    Task(String),
}

/// Coarse classification used at the UI boundary to pick a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Init,
    Write,
    Read,
    MalformedDraft,
    Validation,
    Other,
}

impl StoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Init(_) | StoreError::Locked | StoreError::NotInitialized => {
                ErrorKind::Init
            }
            StoreError::Write(_) => ErrorKind::Write,
            StoreError::Read(_) | StoreError::Corruption(_) | StoreError::ChecksumMismatch { .. } => {
                ErrorKind::Read
            }
            StoreError::MalformedDraft(_) => ErrorKind::MalformedDraft,
            StoreError::Validation(_) => ErrorKind::Validation,
            _ => ErrorKind::Other,
        }
    }

    /// User-facing notice for this error.
    pub fn notice(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Init => "Datenbank konnte nicht initialisiert werden.",
            ErrorKind::Write => "Eintrag konnte nicht gespeichert werden.",
            ErrorKind::Read => "Historie konnte nicht geladen werden.",
            ErrorKind::MalformedDraft => "Daten konnten nicht geladen werden.",
            ErrorKind::Validation => {
                "Bitte Datum eintragen, bevor der Eintrag gespeichert wird."
            }
            ErrorKind::Other => "Unerwarteter Fehler.",
        }
    }

    /// Fold a failure inside `ready()` into the init taxonomy.
    pub(crate) fn into_init(self) -> Self {
        match self {
            StoreError::Locked
            | StoreError::NotInitialized
            | StoreError::Corruption(_)
            | StoreError::Init(_) => self,
            other => StoreError::Init(other.to_string()),
        }
    }

    /// Fold a failure inside `save`/`delete` into the write taxonomy.
    pub(crate) fn into_write(self) -> Self {
        match self {
            StoreError::Locked | StoreError::NotInitialized | StoreError::Write(_) => self,
            other => StoreError::Write(other.to_string()),
        }
    }

    /// Fold a failure inside `get`/`get_all` into the read taxonomy.
    pub(crate) fn into_read(self) -> Self {
        match self {
            StoreError::Locked
            | StoreError::NotInitialized
            | StoreError::Corruption(_)
            | StoreError::Read(_) => self,
            other => StoreError::Read(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
