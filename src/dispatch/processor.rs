//! Request processing: validation, per-object execution and response publishing

use std::sync::Arc;

use tracing::{debug, error};

use super::error::RequestError;
use super::request::{ObjectSpec, Request, Response, ValidRequest};
use super::SessionContext;
use crate::sysfs::{codec, command, CommandRunner, Operation, SYSFS_PROGRAM};

/// Executes requests against the device-control utility
///
/// Objects run in array order; the first failing object aborts the rest and
/// the requester sees a failure carrying the original, unresolved objects.
pub struct RequestProcessor {
    context: Arc<SessionContext>,
    runner: Arc<dyn CommandRunner>,
}

impl RequestProcessor {
    pub fn new(context: Arc<SessionContext>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { context, runner }
    }

    /// Handles one payload and publishes the response for `operation`
    ///
    /// Returns the published bytes, or `None` when the response could not be
    /// serialised and nothing was sent.
    pub async fn process(&self, operation: Operation, payload: &[u8]) -> Option<Vec<u8>> {
        debug!(
            "Payload received for {}: {}",
            operation,
            String::from_utf8_lossy(payload)
        );

        let response = self.respond(operation, payload).await;

        let bytes = match response.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Error marshalling json response: {}", e);
                return None;
            }
        };

        let topic = self.context.response_topic(operation);
        debug!(
            "Publishing response {} to topic {}",
            String::from_utf8_lossy(&bytes),
            topic
        );
        if let Err(e) = self.context.client().publish(&topic, bytes.clone()).await {
            error!("Error publishing to topic {}: {}", topic, e);
        }

        Some(bytes)
    }

    /// Builds the response without publishing it
    pub async fn respond(&self, operation: Operation, payload: &[u8]) -> Response {
        let request = match Request::from_slice(payload) {
            Ok(request) => request,
            Err(e) => {
                error!("{}", e);
                return Response::failure(&e, None, None);
            }
        };

        let request = match request.validate() {
            Ok(request) => request,
            Err((e, request)) => {
                error!("Rejecting {} request: {}", operation, e);
                return Response::failure(&e, request.port_name, request.objects);
            }
        };

        let outcome = self.execute(operation, &request).await;
        match outcome {
            Ok(objects) => Response::success(ValidRequest { objects, ..request }),
            Err(e) => {
                error!(
                    "Error executing {} {} command: {}",
                    SYSFS_PROGRAM,
                    operation.token(),
                    e
                );
                Response::failure(&e, Some(request.port_name), Some(request.objects))
            }
        }
    }

    async fn execute(
        &self,
        operation: Operation,
        request: &ValidRequest,
    ) -> Result<Vec<ObjectSpec>, RequestError> {
        let mut resolved = Vec::with_capacity(request.objects.len());

        for object in &request.objects {
            let args = command::translate(operation, &request.port_name, object);
            debug!("Executing command: {:?}", args);

            let stdout = self.runner.run(&args).await?;

            let mut object = object.clone();
            if operation == Operation::Read {
                object.value = Some(codec::decode(&stdout));
            }
            resolved.push(object);
        }

        Ok(resolved)
    }
}
