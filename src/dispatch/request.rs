//! Typed request and response payloads
//!
//! Unknown fields are kept so a successful response echoes the request
//! exactly, with values resolved and `success`/`timestamp` added.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::RequestError;
use crate::sysfs::ObjectValue;

/// One addressable object within a port
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObjectSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ObjectValue>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObjectSpec {
    pub fn new(name: impl Into<String>, value: Option<ObjectValue>) -> Self {
        Self {
            name: name.into(),
            value,
            extra: Map::new(),
        }
    }
}

/// Inbound payload as decoded, before presence checks
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default)]
    pub port_name: Option<String>,

    #[serde(default)]
    pub objects: Option<Vec<ObjectSpec>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A request with both mandatory fields present
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRequest {
    pub port_name: String,
    pub objects: Vec<ObjectSpec>,
    pub extra: Map<String, Value>,
}

impl Request {
    pub fn from_slice(payload: &[u8]) -> Result<Self, RequestError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Checks `objects` first, then `portName`
    ///
    /// On failure the request is handed back so its fields can be echoed.
    pub fn validate(self) -> Result<ValidRequest, (RequestError, Request)> {
        let Request {
            port_name,
            objects,
            extra,
        } = self;

        match (port_name, objects) {
            (Some(port_name), Some(objects)) => Ok(ValidRequest {
                port_name,
                objects,
                extra,
            }),
            (port_name, objects) => {
                let error = if objects.is_none() {
                    RequestError::MissingObjects
                } else {
                    RequestError::MissingPortName
                };
                Err((
                    error,
                    Request {
                        port_name,
                        objects,
                        extra,
                    },
                ))
            }
        }
    }
}

/// Outbound payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<ObjectSpec>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,

    pub timestamp: String,
}

impl Response {
    /// Echoes the request with resolved objects
    pub fn success(request: ValidRequest) -> Self {
        let mut extra = request.extra;
        extra.remove("success");
        extra.remove("timestamp");

        Self {
            success: true,
            error: None,
            port_name: Some(request.port_name),
            objects: Some(request.objects),
            extra,
            timestamp: timestamp(),
        }
    }

    /// Failure payload carrying whatever of the request was parsed
    pub fn failure(
        error: &RequestError,
        port_name: Option<String>,
        objects: Option<Vec<ObjectSpec>>,
    ) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            port_name,
            objects,
            extra: Map::new(),
            timestamp: timestamp(),
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Current UTC time in RFC3339 with second precision
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
