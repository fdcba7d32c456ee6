//! Errors raised while building or loading a model graph

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown node: {0}")]
    UnknownNode(crate::NodeId),

    #[error("unknown node key '{key}' referenced from '{from}'")]
    UnknownNodeKey { key: String, from: String },

    #[error("duplicate node key '{0}'")]
    DuplicateNodeKey(String),

    #[error("invalid package path '{0}'")]
    InvalidPackagePath(String),

    #[error("'{path}' is not a package (classifier {classifier})")]
    NotAPackage { path: String, classifier: String },

    #[error("invalid model document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
