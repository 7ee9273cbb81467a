//! Run events for live observation
//!
//! Every pipeline unit reports what it is doing through an optional
//! [`EventEmitter`]. Callers that want a live view register an
//! [`EventSender`] and drain the matching receiver; runs without one pay only
//! for the `Option` check.
//!
//! # Example
//!
//! ```rust,ignore
//! use wayfarer_core::pipeline::events::{event_channel, PipelineEvent};
//!
//! let (tx, mut rx) = event_channel();
//!
//! tokio::spawn(async move {
//!     while let Some(event) = rx.recv().await {
//!         if let PipelineEvent::StepCollected { step_id, collected, total, .. } = event {
//!             println!("{} done ({}/{})", step_id, collected, total);
//!         }
//!     }
//! });
//!
//! let handle = engine.with_events(tx).start("Paris", "Lyon", Some(3));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::model::ContentCategory;

/// Something that happened during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A route was fetched and the pipeline is starting
    RunStarted {
        run_id: String,
        origin: String,
        destination: String,
        total_steps: usize,
        timestamp: DateTime<Utc>,
    },

    /// The scheduler queued a step
    StepScheduled {
        step_id: String,
        instruction: String,
        timestamp: DateTime<Utc>,
    },

    /// A producer emitted its candidate for a step
    CandidateProduced {
        step_id: String,
        category: ContentCategory,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// A producer gave up on a step
    ProducerFailed {
        step_id: String,
        category: ContentCategory,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// The arbiter chose a candidate
    StepJudged {
        step_id: String,
        selected: ContentCategory,
        reasoning: String,
        timestamp: DateTime<Utc>,
    },

    /// The collector stored a final selection
    StepCollected {
        step_id: String,
        collected: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// Steps still waiting on candidates when the arbiter stopped
    StrandedSteps {
        step_ids: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// The run ended, successfully or not
    RunFinished {
        run_id: String,
        collected: usize,
        total: usize,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Get the step this event concerns, if any
    pub fn step_id(&self) -> Option<&str> {
        match self {
            PipelineEvent::StepScheduled { step_id, .. }
            | PipelineEvent::CandidateProduced { step_id, .. }
            | PipelineEvent::ProducerFailed { step_id, .. }
            | PipelineEvent::StepJudged { step_id, .. }
            | PipelineEvent::StepCollected { step_id, .. } => Some(step_id),
            PipelineEvent::RunStarted { .. }
            | PipelineEvent::StrandedSteps { .. }
            | PipelineEvent::RunFinished { .. } => None,
        }
    }

    /// Get the event timestamp
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            PipelineEvent::RunStarted { timestamp, .. }
            | PipelineEvent::StepScheduled { timestamp, .. }
            | PipelineEvent::CandidateProduced { timestamp, .. }
            | PipelineEvent::ProducerFailed { timestamp, .. }
            | PipelineEvent::StepJudged { timestamp, .. }
            | PipelineEvent::StepCollected { timestamp, .. }
            | PipelineEvent::StrandedSteps { timestamp, .. }
            | PipelineEvent::RunFinished { timestamp, .. } => *timestamp,
        }
    }
}

/// Sender half of an event channel
pub type EventSender = mpsc::UnboundedSender<PipelineEvent>;

/// Receiver half of an event channel
pub type EventReceiver = mpsc::UnboundedReceiver<PipelineEvent>;

/// Creates a new event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Clonable handle the pipeline units emit through.
///
/// Sending never blocks. A dropped receiver is ignored.
#[derive(Clone, Default)]
pub struct EventEmitter {
    sender: Option<EventSender>,
}

impl EventEmitter {
    pub fn new(sender: Option<EventSender>) -> Self {
        Self { sender }
    }

    /// An emitter that discards everything
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Emit an event
    pub fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.sender {
            if sender.send(event).is_err() {
                tracing::trace!("Event receiver dropped");
            }
        }
    }

    pub fn run_started(&self, run_id: &str, origin: &str, destination: &str, total_steps: usize) {
        self.emit(PipelineEvent::RunStarted {
            run_id: run_id.to_string(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            total_steps,
            timestamp: Utc::now(),
        });
    }

    pub fn step_scheduled(&self, step_id: &str, instruction: &str) {
        self.emit(PipelineEvent::StepScheduled {
            step_id: step_id.to_string(),
            instruction: instruction.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn candidate_produced(&self, step_id: &str, category: ContentCategory, title: &str) {
        self.emit(PipelineEvent::CandidateProduced {
            step_id: step_id.to_string(),
            category,
            title: title.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn producer_failed(&self, step_id: &str, category: ContentCategory, error: &str) {
        self.emit(PipelineEvent::ProducerFailed {
            step_id: step_id.to_string(),
            category,
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn step_judged(&self, step_id: &str, selected: ContentCategory, reasoning: &str) {
        self.emit(PipelineEvent::StepJudged {
            step_id: step_id.to_string(),
            selected,
            reasoning: reasoning.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn step_collected(&self, step_id: &str, collected: usize, total: usize) {
        self.emit(PipelineEvent::StepCollected {
            step_id: step_id.to_string(),
            collected,
            total,
            timestamp: Utc::now(),
        });
    }

    pub fn stranded_steps(&self, step_ids: Vec<String>) {
        self.emit(PipelineEvent::StrandedSteps {
            step_ids,
            timestamp: Utc::now(),
        });
    }

    pub fn run_finished(&self, run_id: &str, collected: usize, total: usize, error: Option<String>) {
        self.emit(PipelineEvent::RunFinished {
            run_id: run_id.to_string(),
            collected,
            total,
            error,
            timestamp: Utc::now(),
        });
    }
}
