//! Error definitions for the sysfs module

use std::time::Duration;
use thiserror::Error;

/// Rejected operation names
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("Operation is required")]
    Missing,

    #[error("Invalid operation specified")]
    Invalid(String),
}

/// Failures while running the device-control utility
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program could not be started or awaited
    #[error("unable to run {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran but reported failure
    ///
    /// `stderr` carries the tool's own error text so it reaches the requester.
    #[error("{program} failed ({status}): {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The program did not finish in time and was killed
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}
