//! Turn submission: one query in flight at a time, one assistant turn per query

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::{QueryBackend, QueryError};
use crate::state::{Conversation, Turn};

/// Shown when the backend answers without any text
pub const FALLBACK_RESPONSE: &str = "Sorry, I couldn't process your request.";

/// Shown when the query fails for any reason
pub const ERROR_RESPONSE: &str =
    "Sorry, there was an error processing your request. Please try again.";

/// Result of one backend call, as delivered to the session
pub type Outcome = Result<Option<String>, QueryError>;

/// Why `submit` did not start a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    Blank,
    Busy,
}

struct InFlight {
    rx: oneshot::Receiver<Outcome>,
    task: JoinHandle<()>,
}

pub struct ChatSession {
    conversation: Conversation,
    backend: Arc<dyn QueryBackend>,
    in_flight: Option<InFlight>,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self {
            conversation: Conversation::new(),
            backend,
            in_flight: None,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn endpoint(&self) -> &str {
        self.backend.endpoint()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Append the user turn and start the backend call.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self, text: &str) -> Result<(), Rejected> {
        if text.trim().is_empty() {
            return Err(Rejected::Blank);
        }
        if self.is_busy() {
            warn!("submission ignored, a query is already in flight");
            return Err(Rejected::Busy);
        }

        let turn = Turn::user(text);
        info!(turn_id = %turn.id(), chars = text.chars().count(), "submitting query");
        self.conversation.push(turn);

        let (tx, rx) = oneshot::channel();
        let backend = Arc::clone(&self.backend);
        let query = text.to_string();
        let task = tokio::spawn(async move {
            let outcome = backend.query(&query).await;
            // Receiver is gone when the session was dropped mid-flight
            let _ = tx.send(outcome);
        });

        self.in_flight = Some(InFlight { rx, task });
        Ok(())
    }

    /// Apply a finished query without blocking. Returns true if one completed.
    pub fn poll(&mut self) -> bool {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return false;
        };

        match in_flight.rx.try_recv() {
            Ok(outcome) => {
                self.apply(Some(outcome));
                true
            }
            Err(oneshot::error::TryRecvError::Empty) => false,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.apply(None);
                true
            }
        }
    }

    /// Wait for the in-flight query to finish.
    ///
    /// Never resolves while idle, so it can sit in a `select!` arm. Cancel-safe:
    /// dropping the future leaves the query in flight. The returned value goes
    /// to [`ChatSession::apply`]; `None` means the task died without reporting.
    pub async fn wait_outcome(&mut self) -> Option<Outcome> {
        match self.in_flight.as_mut() {
            Some(in_flight) => (&mut in_flight.rx).await.ok(),
            None => std::future::pending().await,
        }
    }

    /// Append the assistant turn for the finished query, then clear busy.
    pub fn apply(&mut self, outcome: Option<Outcome>) {
        if self.in_flight.is_none() {
            return;
        }

        let content = match outcome {
            Some(Ok(Some(text))) if !text.is_empty() => text,
            Some(Ok(_)) => {
                info!("backend returned no response text");
                FALLBACK_RESPONSE.to_string()
            }
            Some(Err(err)) => {
                warn!(error = %err, "query failed");
                ERROR_RESPONSE.to_string()
            }
            None => {
                warn!("query task ended without a result");
                ERROR_RESPONSE.to_string()
            }
        };

        let turn = Turn::assistant(content);
        info!(turn_id = %turn.id(), "query completed");
        self.conversation.push(turn);
        self.in_flight = None;
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
    }
}
