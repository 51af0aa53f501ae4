//! Dispatch worker with statum state machine
//!
//! A single consumer that drains the request inbox in arrival order and hands
//! each classified message to the [`RequestProcessor`].
//!
//! # State Machine
//!
//! ```text
//! Ready ──► Running ──► Stopped
//!              │           ▲
//!              └───────────┘
//!          (stop signal / inbox closed)
//! ```
//!
//! [`WorkerHandle::stop`] waits for the task to finish, so a replacement
//! worker never overlaps with the one it replaces.

use statum::{machine, state};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::DispatchError;
use super::processor::RequestProcessor;
use crate::mqtt::message_manager::InboundMessage;
use crate::sysfs::{Operation, OperationError};

/// Topic suffix shared by all request topics
pub const REQUEST_SUFFIX: &str = "/request";

/// States for the dispatch worker lifecycle
#[state]
#[derive(Debug, Clone)]
pub enum WorkerState {
    Ready,   // Inbox and processor wired up
    Running, // Consuming the inbox
    Stopped, // Loop exited, inbox released
}

#[machine]
pub struct DispatchWorker<S: WorkerState> {
    inbox: mpsc::Receiver<InboundMessage>,
    processor: RequestProcessor,
    handled: usize,
}

impl<S: WorkerState> DispatchWorker<S> {
    /// Number of classified requests handed to the processor
    pub fn handled(&self) -> usize {
        self.handled
    }
}

impl DispatchWorker<Ready> {
    pub fn create(inbox: mpsc::Receiver<InboundMessage>, processor: RequestProcessor) -> Self {
        Self::new(inbox, processor, 0)
    }

    pub fn start(self) -> DispatchWorker<Running> {
        debug!("Starting dispatch worker");
        self.transition()
    }
}

impl DispatchWorker<Running> {
    /// Classifies one message and processes it
    ///
    /// Messages whose topic does not end in `read/request` or `write/request`
    /// are logged and dropped without a response.
    pub async fn dispatch(&mut self, message: InboundMessage) -> Option<Vec<u8>> {
        match classify(message.topic()) {
            Ok(operation) => {
                debug!(
                    "{} request received on {} at {}",
                    operation,
                    message.topic(),
                    message.received_at()
                );
                self.handled += 1;
                self.processor.process(operation, message.payload()).await
            }
            Err(e) => {
                debug!(
                    "Unknown request received: topic = {}, payload = {:?} ({})",
                    message.topic(),
                    String::from_utf8_lossy(message.payload()),
                    e
                );
                None
            }
        }
    }

    /// Main loop, runs until the stop signal arrives or the inbox closes
    ///
    /// The stop signal is checked first, but a request already being
    /// processed always runs to completion.
    pub async fn run_until_stopped(
        mut self,
        mut stop_rx: oneshot::Receiver<()>,
    ) -> DispatchWorker<Stopped> {
        loop {
            tokio::select! {
                biased;

                _ = &mut stop_rx => {
                    info!("Stopping dispatch worker");
                    break;
                }

                message = self.inbox.recv() => match message {
                    Some(message) => {
                        self.dispatch(message).await;
                    }
                    None => {
                        info!("Request inbox closed, stopping dispatch worker");
                        break;
                    }
                }
            }
        }

        self.transition()
    }
}

impl DispatchWorker<Stopped> {}

/// Determines the operation from the request topic
///
/// Matching is by suffix, so `xread/request` is a read. Anything else is
/// reported through the operation parser using the last route segment.
pub fn classify(topic: &str) -> Result<Operation, OperationError> {
    let Some(prefix) = topic.strip_suffix(REQUEST_SUFFIX) else {
        return Err(OperationError::Invalid(topic.to_string()));
    };

    [Operation::Read, Operation::Write]
        .into_iter()
        .find(|operation| prefix.ends_with(operation.route()))
        .map_or_else(|| prefix.rsplit('/').next().unwrap_or_default().parse(), Ok)
}

/// Handle for a dispatch worker running in a tokio task
pub struct WorkerHandle {
    inbox: mpsc::Sender<InboundMessage>,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<usize>,
}

impl WorkerHandle {
    /// Spawns a running worker with a bounded inbox
    pub fn spawn(processor: RequestProcessor, capacity: usize) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(capacity);
        let (stop_tx, stop_rx) = oneshot::channel();

        let worker = DispatchWorker::create(inbox_rx, processor).start();
        let task = tokio::spawn(async move {
            let stopped = worker.run_until_stopped(stop_rx).await;
            stopped.handled()
        });

        info!("Dispatch worker started");
        Self {
            inbox: inbox_tx,
            stop_tx,
            task,
        }
    }

    /// Queues a message without waiting
    pub fn deliver(&self, message: InboundMessage) -> Result<(), DispatchError> {
        self.inbox.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => DispatchError::InboxFull,
            TrySendError::Closed(_) => DispatchError::WorkerGone,
        })
    }

    /// Signals the worker and waits until its task has finished
    ///
    /// Returns the number of requests the worker handled.
    pub async fn stop(self) -> Result<usize, DispatchError> {
        let WorkerHandle { stop_tx, task, .. } = self;

        if stop_tx.send(()).is_err() {
            warn!("Dispatch worker already terminated");
        }

        let handled = task.await?;
        info!("Dispatch worker stopped after {} requests", handled);
        Ok(handled)
    }
}
