//! Latest-wins request gate.
//!
//! Each outgoing request gets a [`Ticket`] carrying its id and a cancellation
//! token. Opening a new ticket cancels the previous one, so at most one
//! request per gate is ever still running, and a superseded request resolves
//! to `None` instead of its response.

use std::future::Future;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use atelier::generation::RequestId;

#[derive(Debug, Default)]
pub struct RequestGate {
    current: Mutex<Option<(RequestId, CancellationToken)>>,
}

#[derive(Debug, Clone)]
pub struct Ticket {
    id: RequestId,
    token: CancellationToken,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a ticket for `id`, cancelling the one before it.
    pub fn open(&self, id: RequestId) -> Ticket {
        let token = CancellationToken::new();
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((old, old_token)) = current.replace((id, token.clone())) {
            if old != id {
                debug!(superseded = %old, by = %id, "request superseded");
            }
            old_token.cancel();
        }
        Ticket { id, token }
    }

    /// Cancel whatever is in flight.
    pub fn cancel(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((id, token)) = current.take() {
            debug!(request = %id, "request cancelled");
            token.cancel();
        }
    }

    pub fn current(&self) -> Option<RequestId> {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.as_ref().map(|(id, _)| *id)
    }
}

impl Ticket {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive `fut` unless the ticket is superseded first.
    pub async fn run<F, T>(&self, fut: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn newer_ticket_cancels_the_older_one() {
        let gate = RequestGate::new();
        let first = gate.open(RequestId(1));
        let second = gate.open(RequestId(2));
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(gate.current(), Some(RequestId(2)));

        assert_eq!(first.run(async { 1 }).await, None);
        assert_eq!(second.run(async { 2 }).await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn superseding_interrupts_a_running_request() {
        let gate = std::sync::Arc::new(RequestGate::new());
        let ticket = gate.open(RequestId(1));
        let slow = tokio::spawn(async move {
            ticket
                .run(tokio::time::sleep(Duration::from_secs(120)))
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        gate.open(RequestId(2));
        assert_eq!(slow.await.expect("join"), None);
    }

    #[tokio::test]
    async fn cancel_clears_the_gate() {
        let gate = RequestGate::new();
        let t = gate.open(RequestId(5));
        gate.cancel();
        assert!(t.is_cancelled());
        assert_eq!(gate.current(), None);
    }
}
