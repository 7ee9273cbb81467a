//! Collector: accumulates final selections and restores step order

use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::model::SelectedContent;

use super::events::EventEmitter;
use super::{poll_next, Polled, Signal};

static STEP_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*)_(\d+)$").unwrap());

fn numeric_suffix(id: &str) -> Option<u64> {
    STEP_ID_RE
        .captures(id)
        .and_then(|caps| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// Order selections by the numeric suffix of `<prefix>_<n>` ids.
///
/// If any id lacks such a suffix the whole set is ordered by id instead.
pub fn order_results(items: impl IntoIterator<Item = SelectedContent>) -> Vec<SelectedContent> {
    let mut items: Vec<SelectedContent> = items.into_iter().collect();

    if items.iter().all(|s| numeric_suffix(&s.step_id).is_some()) {
        items.sort_by(|a, b| {
            numeric_suffix(&a.step_id)
                .cmp(&numeric_suffix(&b.step_id))
                .then_with(|| a.step_id.cmp(&b.step_id))
        });
    } else {
        items.sort_by(|a, b| a.step_id.cmp(&b.step_id));
    }
    items
}

/// Gathers one selection per step until the expected total is reached.
pub struct Collector {
    expected: usize,
    entries: HashMap<String, SelectedContent>,
    progress: Arc<AtomicUsize>,
    events: EventEmitter,
}

impl Collector {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            entries: HashMap::new(),
            progress: Arc::new(AtomicUsize::new(0)),
            events: EventEmitter::disabled(),
        }
    }

    /// Share a counter that tracks distinct collected steps
    pub fn with_progress(mut self, progress: Arc<AtomicUsize>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    /// Store a selection, replacing any earlier one for the same step.
    /// Returns true once the expected total has been reached.
    pub fn accept(&mut self, selection: SelectedContent) -> bool {
        let step_id = selection.step_id.clone();
        if self.entries.insert(step_id.clone(), selection).is_some() {
            tracing::debug!(step_id = %step_id, "Replaced earlier selection");
        }

        let collected = self.entries.len();
        self.progress.store(collected, Ordering::SeqCst);
        tracing::info!(step_id = %step_id, "Collected result ({}/{})", collected, self.expected);
        self.events.step_collected(&step_id, collected, self.expected);

        self.is_complete()
    }

    pub fn collected(&self) -> usize {
        self.entries.len()
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn is_complete(&self) -> bool {
        self.entries.len() >= self.expected
    }

    /// Current selections in step order
    pub fn results(&self) -> Vec<SelectedContent> {
        order_results(self.entries.values().cloned())
    }

    /// Read until complete, stopped, closed or cancelled; return what arrived.
    pub async fn run(
        mut self,
        mut rx: UnboundedReceiver<Signal<SelectedContent>>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Vec<SelectedContent> {
        tracing::info!(expected = self.expected, "Collector started");

        while !self.is_complete() {
            if cancel.is_cancelled() {
                tracing::debug!("Collector cancelled");
                break;
            }

            match poll_next(&mut rx, poll_interval).await {
                Polled::Idle => continue,
                Polled::Closed | Polled::Item(Signal::Stop) => break,
                Polled::Item(Signal::Data(selection)) => {
                    if self.accept(selection) {
                        tracing::info!("All steps collected");
                    }
                }
            }
        }

        tracing::info!(collected = self.collected(), expected = self.expected, "Collector stopped");
        order_results(self.entries.into_values())
    }
}
