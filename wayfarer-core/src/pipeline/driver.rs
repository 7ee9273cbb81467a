//! Pipeline driver: wires the units, feeds the steps, shuts down in order

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::llm::{LLMConfig, LLMProvider};
use crate::model::{ContentCategory, RouteStep, SelectedContent};
use crate::prompts::PromptTemplates;
use crate::search::SearchProvider;

use super::events::EventEmitter;
use super::{poll_next, Arbiter, Collector, ContentAgent, Polled, Scheduler, Signal};

/// What a pipeline run produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Selections in step order
    pub results: Vec<SelectedContent>,
    /// Steps that entered the pipeline
    pub total: usize,
    /// The collect timeout elapsed before shutdown finished
    pub timed_out: bool,
}

impl PipelineOutcome {
    /// Every step produced a selection
    pub fn is_complete(&self) -> bool {
        self.results.len() == self.total
    }
}

/// Runs a batch of steps through producers, arbiter and collector.
pub struct Pipeline {
    llm: Arc<dyn LLMProvider>,
    search: Arc<dyn SearchProvider>,
    templates: PromptTemplates,
    llm_config: LLMConfig,
    config: PipelineConfig,
    events: EventEmitter,
    progress: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        search: Arc<dyn SearchProvider>,
        templates: PromptTemplates,
        config: PipelineConfig,
    ) -> Self {
        Self {
            llm,
            search,
            templates,
            llm_config: LLMConfig::default(),
            config,
            events: EventEmitter::disabled(),
            progress: Arc::new(AtomicUsize::new(0)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_llm_config(mut self, llm_config: LLMConfig) -> Self {
        self.llm_config = llm_config;
        self
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    /// Share the collected-step counter with an observer
    pub fn with_progress(mut self, progress: Arc<AtomicUsize>) -> Self {
        self.progress = progress;
        self
    }

    /// Use an externally owned token; cancelling it stops every unit
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn progress(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.progress)
    }

    /// Push `steps` through the pipeline and wait for the collector.
    ///
    /// # Errors
    ///
    /// Fails only on wiring problems: a closed work channel or a unit task
    /// that panicked. Per-step failures surface as missing results.
    pub async fn run(&self, steps: Vec<RouteStep>) -> Result<PipelineOutcome> {
        let total = steps.len();
        let poll = self.config.poll_interval;
        let cancel = self.cancel.child_token();

        let (work_tx, work_rx) = mpsc::unbounded_channel::<Signal<RouteStep>>();
        let (candidate_tx, candidate_rx) = mpsc::unbounded_channel();
        let (selection_tx, selection_rx) = mpsc::unbounded_channel();

        let collector = Collector::new(total)
            .with_progress(Arc::clone(&self.progress))
            .with_events(self.events.clone());
        let collector_task = tokio::spawn(collector.run(selection_rx, poll, cancel.clone()));

        let arbiter = Arbiter::new(Arc::clone(&self.llm), &self.templates, self.llm_config.clone())
            .with_events(self.events.clone());
        let arbiter_task = tokio::spawn(arbiter.run(
            candidate_rx,
            selection_tx.clone(),
            poll,
            cancel.clone(),
        ));

        let mut producer_inputs = Vec::with_capacity(ContentCategory::ALL.len());
        let mut producer_tasks = Vec::with_capacity(ContentCategory::ALL.len());
        for category in ContentCategory::ALL {
            let (tx, rx) = mpsc::unbounded_channel();
            let agent = ContentAgent::new(
                category,
                Arc::clone(&self.llm),
                Arc::clone(&self.search),
                &self.templates,
                self.llm_config.clone(),
            )
            .with_result_limit(self.config.search_result_limit)
            .with_events(self.events.clone());
            producer_tasks.push(tokio::spawn(agent.run(rx, candidate_tx.clone(), poll, cancel.clone())));
            producer_inputs.push(tx);
        }

        let dispatcher_task = tokio::spawn(dispatch(work_rx, producer_inputs, poll, cancel.clone()));

        let mut abort_handles: Vec<AbortHandle> = producer_tasks
            .iter()
            .map(|t| t.abort_handle())
            .collect();
        abort_handles.push(arbiter_task.abort_handle());
        abort_handles.push(dispatcher_task.abort_handle());

        Scheduler::new(work_tx, self.events.clone()).schedule(steps)?;

        let drain = async move {
            dispatcher_task.await?;
            futures::future::try_join_all(producer_tasks).await?;
            tracing::debug!("Producers drained; stopping arbiter");
            // The arbiter may already be gone if the collector finished early.
            let _ = candidate_tx.send(Signal::Stop);
            arbiter_task.await?;
            let _ = selection_tx.send(Signal::Stop);
            Ok::<_, crate::error::WayfarerError>(())
        };

        let timed_out = match self.config.collect_timeout {
            Some(limit) => match tokio::time::timeout(limit, drain).await {
                Ok(drained) => {
                    drained?;
                    false
                }
                Err(_) => {
                    tracing::warn!(timeout = ?limit, "Collect timeout elapsed; cancelling pipeline");
                    cancel.cancel();
                    for handle in &abort_handles {
                        handle.abort();
                    }
                    true
                }
            },
            None => {
                drain.await?;
                false
            }
        };

        let results = collector_task.await?;
        tracing::info!(collected = results.len(), total, "Pipeline finished");

        Ok(PipelineOutcome {
            results,
            total,
            timed_out,
        })
    }
}

/// Copy each step to every producer; on stop, stop them all.
async fn dispatch(
    mut rx: UnboundedReceiver<Signal<RouteStep>>,
    outputs: Vec<UnboundedSender<Signal<RouteStep>>>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!("Distributing tasks to agents");

    loop {
        if cancel.is_cancelled() {
            break;
        }
        match poll_next(&mut rx, poll_interval).await {
            Polled::Idle => continue,
            Polled::Closed | Polled::Item(Signal::Stop) => break,
            Polled::Item(Signal::Data(step)) => {
                for tx in &outputs {
                    if tx.send(Signal::Data(step.clone())).is_err() {
                        tracing::warn!(step_id = %step.id, "Producer input closed");
                    }
                }
            }
        }
    }

    for tx in &outputs {
        let _ = tx.send(Signal::Stop);
    }
    tracing::info!("Task distribution complete");
}
