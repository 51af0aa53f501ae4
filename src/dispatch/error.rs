//! Error definitions for request dispatch

use thiserror::Error;

use crate::sysfs::ExecError;

/// Reasons a request is answered with `success: false`
///
/// The display strings are sent to the requester verbatim.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Error encountered unmarshalling json: {0}")]
    Unmarshal(#[from] serde_json::Error),

    #[error("The objects array is required")]
    MissingObjects,

    #[error("portName is required")]
    MissingPortName,

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Worker management failures
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("worker inbox is full")]
    InboxFull,

    #[error("worker is no longer running")]
    WorkerGone,

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
