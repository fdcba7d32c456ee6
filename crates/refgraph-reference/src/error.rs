//! Reference-id error taxonomy
//!
//! Validation errors (`InvalidElement`, `OverlappingElements`) come from
//! malformed model data. Provisioning (`CannotProvide`) and resolution
//! (`InvalidReferenceId`, `UnresolvableReferenceId`) errors are per-request.

use refgraph_core::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("{0}")]
    InvalidElement(String),

    #[error("Distinct elements with overlapping source information: {first} ({first_span}), {second} ({second_span})")]
    OverlappingElements {
        first: String,
        first_span: String,
        second: String,
        second_span: String,
    },

    #[error("Unknown classifier '{0}'")]
    UnknownClassifier(String),

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Cannot provide reference id for {reference}: {reason}")]
    CannotProvide {
        reference: String,
        owner: Option<String>,
        reason: String,
        #[source]
        source: Option<Box<ReferenceError>>,
    },

    #[error("Invalid reference id '{id}': {reason}")]
    InvalidReferenceId { id: String, reason: String },

    #[error("Unresolvable reference id '{id}': {reason}")]
    UnresolvableReferenceId { id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ReferenceError>;
