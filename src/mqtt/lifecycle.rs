//! Connection lifecycle: authentication, subscription and worker supervision
//!
//! # State Machine
//!
//! ```text
//!                 AuthFail (retry in 1 min)
//!                   ┌──────┐
//!                   ▼      │
//! Disconnected ──► Authenticating ──AuthOk──► Authenticated ──► Subscribing ──SubOk──► Active
//!      ▲                                                         │    ▲                  │
//!      │                                                         └────┘                  │
//!      │                                               SubFail (retry in 30 s)           │
//!      └───────────────────────────── Disconnected ──────────────────────────────────────┘
//! ```
//!
//! Transitions are computed by [`ConnectionState::on_event`] and carry the
//! [`Action`]s the [`LifecycleManager`] performs: scheduling retries, issuing
//! the subscribe and starting or stopping the dispatch worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::mqtt_handler::{BrokerClient, SessionEvent, SessionEvents};
use crate::config::BridgeConfig;
use crate::dispatch::{RequestProcessor, SessionContext, WorkerHandle};
use crate::mqtt::message_manager::InboundMessage;
use crate::persistence::adapter_config::{resolve_topic_root, AdapterConfigSource};
use crate::sysfs::CommandRunner;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Authenticating,
    Authenticated,
    Subscribing,
    Active,
}

/// Inputs of the connection state machine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    AuthOk,
    AuthFail(String),
    SubOk,
    SubFail(String),
    Disconnected(String),
}

/// Side effects requested by a transition, performed in order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    ScheduleAuthRetry,
    Subscribe,
    ScheduleSubscribeRetry,
    StartWorker,
    StopWorker,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub next: ConnectionState,
    pub actions: Vec<Action>,
}

impl Transition {
    fn to(next: ConnectionState, actions: &[Action]) -> Self {
        Self {
            next,
            actions: actions.to_vec(),
        }
    }
}

impl ConnectionState {
    pub fn on_event(self, event: &LifecycleEvent) -> Transition {
        use ConnectionState::*;

        match (self, event) {
            (_, LifecycleEvent::AuthOk) => {
                Transition::to(Authenticated, &[Action::StopWorker, Action::Subscribe])
            }
            (_, LifecycleEvent::Disconnected(_)) => {
                Transition::to(Disconnected, &[Action::StopWorker])
            }
            (Disconnected | Authenticating, LifecycleEvent::AuthFail(_)) => {
                Transition::to(Authenticating, &[Action::ScheduleAuthRetry])
            }
            (Subscribing, LifecycleEvent::SubOk) => Transition::to(Active, &[Action::StartWorker]),
            (Subscribing, LifecycleEvent::SubFail(_)) => {
                Transition::to(Subscribing, &[Action::ScheduleSubscribeRetry])
            }
            (state, _) => Transition::to(state, &[]),
        }
    }
}

/// Timing and naming used by the [`LifecycleManager`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleSettings {
    pub auth_retry: Duration,
    pub subscribe_retry: Duration,
    pub adapter_name: String,
    pub default_topic_root: String,
    pub inbox_capacity: usize,
}

impl From<&BridgeConfig> for LifecycleSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            auth_retry: Duration::from_secs(config.retry.auth_secs),
            subscribe_retry: Duration::from_secs(config.retry.subscribe_secs),
            adapter_name: config.adapter.name.clone(),
            default_topic_root: config.adapter.topic_root.clone(),
            inbox_capacity: config.mqtt.channel_capacity,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RetryKind {
    Auth,
    Subscribe,
}

#[derive(Clone, Copy, Debug)]
struct PendingRetry {
    kind: RetryKind,
    deadline: Instant,
}

/// Drives the broker session and keeps exactly one dispatch worker alive
/// while subscribed
pub struct LifecycleManager<E: SessionEvents> {
    events: E,
    client: Arc<dyn BrokerClient>,
    runner: Arc<dyn CommandRunner>,
    config_source: Box<dyn AdapterConfigSource>,
    settings: LifecycleSettings,
    state: ConnectionState,
    context: Option<Arc<SessionContext>>,
    worker: Option<WorkerHandle>,
    retry: Option<PendingRetry>,
}

impl<E: SessionEvents> LifecycleManager<E> {
    pub fn new(
        events: E,
        client: Arc<dyn BrokerClient>,
        runner: Arc<dyn CommandRunner>,
        config_source: Box<dyn AdapterConfigSource>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            events,
            client,
            runner,
            config_source,
            settings,
            state: ConnectionState::Disconnected,
            context: None,
            worker: None,
            retry: None,
        }
    }

    /// Runs until `shutdown` is cancelled
    ///
    /// While an authentication retry is pending the session is not polled, so
    /// no reconnect is attempted before the delay expires. Subscribe retries
    /// keep polling to serve keep-alives.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Connecting to MQTT broker");
        self.state = ConnectionState::Authenticating;

        loop {
            let retry = self.retry;
            let polling = !matches!(retry, Some(PendingRetry { kind: RetryKind::Auth, .. }));
            let deadline = retry.map(|r| r.deadline).unwrap_or_else(Instant::now);

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, leaving {:?}", self.state);
                    break;
                }

                _ = tokio::time::sleep_until(deadline), if retry.is_some() => {
                    self.fire_retry().await;
                }

                event = self.events.next_event(), if polling => {
                    self.handle_session_event(event).await;
                }
            }
        }

        self.stop_worker().await;
    }

    async fn handle_session_event(&mut self, event: SessionEvent) {
        let event = match event {
            SessionEvent::Message(message) => return self.forward(message),
            SessionEvent::Connected => {
                info!("Connected to MQTT broker");
                LifecycleEvent::AuthOk
            }
            SessionEvent::ConnectFailed(reason) => {
                error!("Error authenticating with MQTT broker: {}", reason);
                LifecycleEvent::AuthFail(reason)
            }
            SessionEvent::Subscribed => LifecycleEvent::SubOk,
            SessionEvent::SubscribeFailed(reason) => LifecycleEvent::SubFail(reason),
            SessionEvent::Disconnected(reason) => {
                info!("Connection to broker was lost: {}", reason);
                LifecycleEvent::Disconnected(reason)
            }
        };

        self.apply(event).await;
    }

    /// Feeds an event through the state machine, including any follow-up
    /// events produced by the actions
    async fn apply(&mut self, event: LifecycleEvent) {
        let mut pending = Some(event);

        while let Some(event) = pending.take() {
            let transition = self.state.on_event(&event);
            if transition.next == self.state && transition.actions.is_empty() {
                warn!("Ignoring {:?} in state {:?}", event, self.state);
                continue;
            }

            debug!("{:?} --{:?}--> {:?}", self.state, event, transition.next);
            self.state = transition.next;

            for action in transition.actions {
                if let Some(follow_up) = self.perform(action).await {
                    pending = Some(follow_up);
                }
            }
        }
    }

    async fn perform(&mut self, action: Action) -> Option<LifecycleEvent> {
        match action {
            Action::ScheduleAuthRetry => {
                error!(
                    "Will retry authentication in {:?}",
                    self.settings.auth_retry
                );
                self.schedule(RetryKind::Auth, self.settings.auth_retry);
                None
            }
            Action::ScheduleSubscribeRetry => {
                error!(
                    "Will retry subscription in {:?}",
                    self.settings.subscribe_retry
                );
                self.schedule(RetryKind::Subscribe, self.settings.subscribe_retry);
                None
            }
            Action::Subscribe => self.subscribe().await,
            Action::StartWorker => {
                self.retry = None;
                self.start_worker().await;
                None
            }
            Action::StopWorker => {
                self.retry = None;
                self.stop_worker().await;
                None
            }
        }
    }

    fn schedule(&mut self, kind: RetryKind, delay: Duration) {
        self.retry = Some(PendingRetry {
            kind,
            deadline: Instant::now() + delay,
        });
    }

    async fn fire_retry(&mut self) {
        let Some(retry) = self.retry.take() else {
            return;
        };

        match retry.kind {
            RetryKind::Auth => info!("Retrying authentication"),
            RetryKind::Subscribe if self.state == ConnectionState::Subscribing => {
                info!("Retrying subscription");
                if let Some(event) = self.subscribe().await {
                    self.apply(event).await;
                }
            }
            RetryKind::Subscribe => debug!("Dropping stale subscribe retry in {:?}", self.state),
        }
    }

    /// Issues the request subscription; the broker's answer arrives later as
    /// a session event
    ///
    /// A subscribe retry stays armed until the acknowledgement arrives.
    async fn subscribe(&mut self) -> Option<LifecycleEvent> {
        let context = self.session_context().await;
        self.state = ConnectionState::Subscribing;

        let filter = context.request_filter();
        debug!("Configuring subscription {}", filter);
        match self.client.subscribe(&filter).await {
            Ok(()) => {
                self.schedule(RetryKind::Subscribe, self.settings.subscribe_retry);
                None
            }
            Err(e) => {
                error!("Error subscribing to {}: {}", filter, e);
                Some(LifecycleEvent::SubFail(e.to_string()))
            }
        }
    }

    /// Returns the session context, looking up the topic root on first use
    async fn session_context(&mut self) -> Arc<SessionContext> {
        if let Some(context) = &self.context {
            return context.clone();
        }

        info!("Retrieving adapter configuration");
        let topic_root = resolve_topic_root(
            self.config_source.as_ref(),
            &self.settings.adapter_name,
            &self.settings.default_topic_root,
        )
        .await;
        let context = Arc::new(SessionContext::new(topic_root, self.client.clone()));
        info!("Using topic root {}", context.topic_root());
        self.context = Some(context.clone());
        context
    }

    async fn start_worker(&mut self) {
        self.stop_worker().await;

        let Some(context) = self.context.clone() else {
            error!("No session context, dispatch worker not started");
            return;
        };

        let processor = RequestProcessor::new(context, self.runner.clone());
        self.worker = Some(WorkerHandle::spawn(
            processor,
            self.settings.inbox_capacity,
        ));
    }

    async fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.stop().await {
                error!("Dispatch worker ended abnormally: {}", e);
            }
        }
    }

    fn forward(&self, message: InboundMessage) {
        match &self.worker {
            Some(worker) => {
                if let Err(e) = worker.deliver(message) {
                    warn!("Dropping request: {}", e);
                }
            }
            None => warn!("Dropping {}: no active dispatch worker", message),
        }
    }
}
