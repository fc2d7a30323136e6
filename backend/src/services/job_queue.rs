//! In-process job transport feeding a pool of background workers.
//!
//! Producers call [`JobQueue::enqueue`]; [`JobQueue::spawn_workers`] starts
//! tasks that take messages off the shared receiver one at a time and hand
//! them to the [`JobHandler`] registered for their job type.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::error::{EngineError, EngineResult};

/// Consumer side of a job type. Knows nothing about the transport.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> &'static str;

    /// Process one job. Errors are logged by the worker and the job is dropped.
    async fn handle(&self, payload: Value) -> EngineResult<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub job_type: String,
    pub payload: Value,
}

/// Handlers keyed by the job type they consume.
pub type HandlerMap = HashMap<&'static str, Arc<dyn JobHandler>>;

pub fn handler_map(handlers: Vec<Arc<dyn JobHandler>>) -> HandlerMap {
    handlers.into_iter().map(|h| (h.job_type(), h)).collect()
}

/// Bounded in-process queue.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<QueueMessage>,
    receiver: Arc<Mutex<mpsc::Receiver<QueueMessage>>>,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Hand a job to the workers, waiting for room when the queue is full.
    pub async fn enqueue(&self, job_type: &str, payload: Value) -> EngineResult<()> {
        self.sender
            .send(QueueMessage {
                job_type: job_type.to_string(),
                payload,
            })
            .await
            .map_err(|_| EngineError::QueueUnavailable("all workers have stopped".into()))?;
        log::debug!("Enqueued {} job", job_type);
        Ok(())
    }

    /// Start `count` workers. Each processes one job at a time until the
    /// queue is dropped by every producer.
    pub fn spawn_workers(&self, count: usize, handlers: HandlerMap) -> Vec<JoinHandle<()>> {
        let handlers = Arc::new(handlers);
        (0..count.max(1))
            .map(|worker| {
                let receiver = self.receiver.clone();
                let handlers = handlers.clone();
                tokio::spawn(async move {
                    log::info!("Validation worker {} started", worker);
                    loop {
                        let message = receiver.lock().await.recv().await;
                        let Some(message) = message else { break };
                        dispatch(worker, &handlers, message).await;
                    }
                    log::info!("Validation worker {} stopped", worker);
                })
            })
            .collect()
    }
}

async fn dispatch(worker: usize, handlers: &HandlerMap, message: QueueMessage) {
    let Some(handler) = handlers.get(message.job_type.as_str()) else {
        log::warn!(
            "Worker {} dropped job of unknown type {}",
            worker,
            message.job_type
        );
        return;
    };
    if let Err(e) = handler.handle(message.payload).await {
        log::error!("Worker {} failed {} job: {}", worker, message.job_type, e);
    }
}
