//! Concurrent enrichment pipeline
//!
//! ```text
//! steps -> scheduler -> dispatcher -+-> video producer   -+
//!                                   +-> music producer   -+-> arbiter -> collector
//!                                   +-> history producer -+
//! ```
//!
//! Each unit is a tokio task that owns the receiving end of one unbounded
//! channel. Input ends with an explicit [`Signal::Stop`]; units also watch a
//! shared [`CancellationToken`](tokio_util::sync::CancellationToken), checked
//! every `poll_interval` while idle.

use std::time::Duration;
use tokio::sync::mpsc;

use crate::model::ContentCandidate;

pub mod arbiter;
pub mod collector;
pub mod driver;
pub mod events;
pub mod producer;
pub mod scheduler;

pub use arbiter::Arbiter;
pub use collector::{order_results, Collector};
pub use driver::{Pipeline, PipelineOutcome};
pub use events::{event_channel, EventEmitter, EventReceiver, EventSender, PipelineEvent};
pub use producer::ContentAgent;
pub use scheduler::Scheduler;

/// A channel item: data, or the end-of-input marker
#[derive(Debug, Clone, PartialEq)]
pub enum Signal<T> {
    Data(T),
    Stop,
}

/// A producer's candidate for one step
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMessage {
    pub step_id: String,
    pub candidate: ContentCandidate,
}

/// Outcome of one bounded wait on a unit's input
pub(crate) enum Polled<T> {
    Item(T),
    Idle,
    Closed,
}

/// Wait up to `interval` for the next item.
pub(crate) async fn poll_next<T>(rx: &mut mpsc::UnboundedReceiver<T>, interval: Duration) -> Polled<T> {
    match tokio::time::timeout(interval, rx.recv()).await {
        Ok(Some(item)) => Polled::Item(item),
        Ok(None) => Polled::Closed,
        Err(_) => Polled::Idle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_poll_next_states() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Signal<u32>>();
        let interval = Duration::from_millis(10);

        assert!(matches!(poll_next(&mut rx, interval).await, Polled::Idle));

        tx.send(Signal::Data(7)).unwrap();
        assert!(matches!(poll_next(&mut rx, interval).await, Polled::Item(Signal::Data(7))));

        drop(tx);
        assert!(matches!(poll_next(&mut rx, interval).await, Polled::Closed));
    }
}
