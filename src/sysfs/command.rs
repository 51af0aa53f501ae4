//! Operation tokens and argument lists for the device-control utility

use std::fmt;
use std::str::FromStr;

use super::codec;
use super::error::OperationError;
use crate::dispatch::request::ObjectSpec;

/// Utility keyword for reading an object
pub const READ_TOKEN: &str = "show";
/// Utility keyword for writing an object
pub const WRITE_TOKEN: &str = "store";

/// Kind of device-object operation, selected by the request topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    /// Keyword passed to the utility
    pub fn token(self) -> &'static str {
        match self {
            Operation::Read => READ_TOKEN,
            Operation::Write => WRITE_TOKEN,
        }
    }

    /// Topic segment naming this operation
    pub fn route(self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Write => "write",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route())
    }
}

impl FromStr for Operation {
    type Err = OperationError;

    fn from_str(segment: &str) -> Result<Self, Self::Err> {
        match segment {
            "" => Err(OperationError::Missing),
            "read" => Ok(Operation::Read),
            "write" => Ok(Operation::Write),
            other => Err(OperationError::Invalid(other.to_string())),
        }
    }
}

/// Builds the utility arguments for one object
///
/// Always `[token, "<port>/<name>"]`; writes append the encoded value when the
/// object carries one. Reads never pass a value.
pub fn translate(operation: Operation, port_name: &str, object: &ObjectSpec) -> Vec<String> {
    let mut args = vec![
        operation.token().to_string(),
        format!("{}/{}", port_name, object.name),
    ];

    if operation == Operation::Write {
        if let Some(value) = &object.value {
            args.push(codec::encode(value));
        }
    }

    args
}
