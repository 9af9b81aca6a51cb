//! Debounced search with stale-response filtering.
//!
//! Every new query cancels the one still waiting, and a [`SearchTicket`] lets the caller
//! drop a response that arrives after a newer query started.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Quiet period before a search is sent.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Clone, Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Arc<Mutex<Option<CancellationToken>>>,
}

/// Proof that a query survived the debounce window.
#[derive(Debug, Clone)]
pub struct SearchTicket {
    token: CancellationToken,
}

impl SearchTicket {
    /// `false` once a newer query has been submitted.
    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled()
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait out the debounce window. `None` if a newer call superseded this one meanwhile.
    pub async fn settle(&self) -> Option<SearchTicket> {
        let token = CancellationToken::new();
        {
            let mut pending = self.pending.lock().await;
            if let Some(previous) = pending.replace(token.clone()) {
                previous.cancel();
            }
        }

        tokio::select! {
            _ = token.cancelled() => {
                debug!("search superseded during debounce");
                None
            }
            _ = tokio::time::sleep(self.delay) => Some(SearchTicket { token }),
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_latest_query_settles() {
        let d = Debouncer::new(Duration::from_millis(50));
        let first = {
            let d = d.clone();
            tokio::spawn(async move { d.settle().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = d.settle().await;

        assert!(first.await.unwrap().is_none());
        assert!(second.is_some_and(|t| t.is_current()));
    }

    #[tokio::test]
    async fn ticket_goes_stale_after_newer_query() {
        let d = Debouncer::new(Duration::from_millis(5));
        let ticket = d.settle().await.unwrap();
        assert!(ticket.is_current());
        let _newer = d.settle().await;
        assert!(!ticket.is_current());
    }
}
