//! # Request Dispatch
//!
//! Turns inbound request messages into device commands and publishes the
//! outcome.
//!
//! ```text
//! InboundMessage ──► DispatchWorker ──► RequestProcessor ──► CommandRunner
//!   (topic)           (classify)         (validate, run)        (utility)
//!                                              │
//!                                              ▼
//!                                   {topicRoot}/{op}/response
//! ```
//!
//! Requests are handled strictly one at a time by a single worker.

pub mod error;
pub mod processor;
pub mod request;
pub mod worker;

use std::sync::Arc;

pub use error::{DispatchError, RequestError};
pub use processor::RequestProcessor;
pub use request::{ObjectSpec, Request, Response};
pub use worker::{DispatchWorker, WorkerHandle};

use crate::mqtt::mqtt_handler::BrokerClient;
use crate::sysfs::Operation;

/// Default prefix for all bridge topics
pub const DEFAULT_TOPIC_ROOT: &str = "wayside/mtsio";

/// Session-wide values shared with every worker
///
/// Built once the topic root is known and never mutated afterwards; a new
/// session replaces the whole context.
pub struct SessionContext {
    topic_root: String,
    client: Arc<dyn BrokerClient>,
}

impl SessionContext {
    pub fn new(topic_root: impl Into<String>, client: Arc<dyn BrokerClient>) -> Self {
        Self {
            topic_root: topic_root.into(),
            client,
        }
    }

    pub fn topic_root(&self) -> &str {
        &self.topic_root
    }

    pub fn client(&self) -> &Arc<dyn BrokerClient> {
        &self.client
    }

    /// Filter covering every request topic
    pub fn request_filter(&self) -> String {
        format!("{}/+/request", self.topic_root)
    }

    pub fn response_topic(&self, operation: Operation) -> String {
        format!("{}/{}/response", self.topic_root, operation.route())
    }
}
