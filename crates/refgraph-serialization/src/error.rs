//! Errors raised while writing or reading distributed binary metadata

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializationError {
    /// Two distinct objects of one classifier share an identifier.
    #[error("Identifier clash for classifier {classifier}: '{identifier}'")]
    IdentifierClash { classifier: String, identifier: String },

    #[error("Too many partitions: limit of {0} reached")]
    TooManyPartitions(u32),

    #[error("Invalid metadata name: {0:?}")]
    InvalidMetadataName(String),

    #[error("Invalid metadata specification: {0}")]
    InvalidMetadataSpecification(String),

    #[error("Unknown classifier: {0}")]
    UnknownClassifier(String),

    #[error("Unknown instance: classifier={classifier}, identifier={identifier}")]
    UnknownInstance { classifier: String, identifier: String },

    /// A string was requested that the cache never collected.
    #[error("String not in cache: {0:?}")]
    UnknownString(String),

    #[error("Unknown string id: {0}")]
    UnknownStringId(i32),

    #[error("Obj is not fully defined: {0}")]
    ObjNotFullyDefined(String),

    #[error("Missing file: {0}")]
    MissingFile(String),

    #[error("Corrupt metadata in {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SerializationError>;
