//! Fakes for the collaborator traits, shared by the unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::ConfigError;
use crate::mqtt::mqtt_handler::{BrokerClient, SessionEvent, SessionEvents, TransportError};
use crate::persistence::adapter_config::{AdapterConfigSource, AdapterRow};
use crate::sysfs::{CommandRunner, ExecError};

pub fn tool_failure(stderr: &str) -> ExecError {
    ExecError::Failed {
        program: "mts-io-sysfs".to_string(),
        status: "exit status: 1".to_string(),
        stderr: stderr.to_string(),
    }
}

/// Records argument lists and replays scripted outcomes
///
/// Once the script is exhausted every call succeeds with empty output.
pub struct FakeRunner {
    calls: Mutex<Vec<Vec<String>>>,
    outcomes: Mutex<VecDeque<Result<String, ExecError>>>,
    delay: Duration,
}

impl FakeRunner {
    pub fn new(outcomes: Vec<Result<String, ExecError>>) -> Arc<Self> {
        Self::with_delay(outcomes, Duration::ZERO)
    }

    pub fn with_delay(outcomes: Vec<Result<String, ExecError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            outcomes: Mutex::new(outcomes.into()),
            delay,
        })
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, args: &[String]) -> Result<String, ExecError> {
        self.calls.lock().unwrap().push(args.to_vec());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let outcome = self.outcomes.lock().unwrap().pop_front();
        outcome.unwrap_or_else(|| Ok(String::new()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    Subscribe(String),
    Publish(String, Vec<u8>),
}

/// Broker client that reports every call on a channel
pub struct FakeClient {
    calls: mpsc::UnboundedSender<ClientCall>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
    failing_subscribes: AtomicUsize,
    failing_publishes: AtomicBool,
}

impl FakeClient {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ClientCall>) {
        let (calls, calls_rx) = mpsc::unbounded_channel();
        let client = Arc::new(Self {
            calls,
            published: Mutex::new(Vec::new()),
            failing_subscribes: AtomicUsize::new(0),
            failing_publishes: AtomicBool::new(false),
        });
        (client, calls_rx)
    }

    /// Makes the next `count` subscribe calls fail
    pub fn fail_subscribes(&self, count: usize) {
        self.failing_subscribes.store(count, Ordering::SeqCst);
    }

    pub fn fail_publishes(&self) {
        self.failing_publishes.store(true, Ordering::SeqCst);
    }

    /// Successfully published messages
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }
}

/// What a client reports when its event loop is gone
fn request_dropped() -> TransportError {
    TransportError::Client(rumqttc::ClientError::Request(rumqttc::Request::Disconnect(
        rumqttc::Disconnect,
    )))
}

#[async_trait]
impl BrokerClient for FakeClient {
    async fn subscribe(&self, filter: &str) -> Result<(), TransportError> {
        let _ = self.calls.send(ClientCall::Subscribe(filter.to_string()));

        let failing = self
            .failing_subscribes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(request_dropped());
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let _ = self
            .calls
            .send(ClientCall::Publish(topic.to_string(), payload.clone()));

        if self.failing_publishes.load(Ordering::SeqCst) {
            return Err(request_dropped());
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
        Ok(())
    }
}

/// Session events fed from a channel; pends forever once the sender is gone
pub struct ScriptedEvents {
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

pub fn scripted_events() -> (mpsc::UnboundedSender<SessionEvent>, ScriptedEvents) {
    let (tx, events) = mpsc::unbounded_channel();
    (tx, ScriptedEvents { events })
}

#[async_trait]
impl SessionEvents for ScriptedEvents {
    async fn next_event(&mut self) -> SessionEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }
}

/// Configuration source returning a fixed row and counting lookups
pub struct StaticConfig {
    row: Option<AdapterRow>,
    fetches: Arc<AtomicUsize>,
}

impl StaticConfig {
    pub fn new(row: Option<AdapterRow>) -> Self {
        Self {
            row,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fetches(&self) -> Arc<AtomicUsize> {
        self.fetches.clone()
    }
}

#[async_trait]
impl AdapterConfigSource for StaticConfig {
    async fn fetch(&self, _adapter_name: &str) -> Result<Option<AdapterRow>, ConfigError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.row.clone())
    }
}
