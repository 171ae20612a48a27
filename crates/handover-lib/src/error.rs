//! Error types surfaced to callers of the handover core

use crate::models::{CellId, UeId};
use thiserror::Error;

/// Failures that are returned to the caller rather than resolved into a
/// decision outcome
#[derive(Debug, Error)]
pub enum HandoverError {
    #[error("unknown UE: {0}")]
    UnknownUe(UeId),
    #[error("unknown cell: {0}")]
    UnknownCell(CellId),
    #[error("already registered: {0}")]
    AlreadyRegistered(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, HandoverError>;
