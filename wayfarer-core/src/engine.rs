//! Engine: fetches a route and runs it through the pipeline in the background
//!
//! # Example
//!
//! ```rust,no_run
//! use wayfarer_core::config::WayfarerConfig;
//! use wayfarer_core::engine::Engine;
//!
//! # async fn example() -> wayfarer_core::error::Result<()> {
//! let engine = Engine::from_config(&WayfarerConfig::load()?)?;
//! let handle = engine.start("Portland, OR", "Seattle, WA", Some(5));
//!
//! let itinerary = handle.wait().await?;
//! println!("{} stops", itinerary.len());
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{PipelineConfig, WayfarerConfig};
use crate::error::{Result, WayfarerError};
use crate::llm::{LLMConfig, LLMProvider, LLMProviderFactory};
use crate::model::{RouteStep, SelectedContent};
use crate::pipeline::{EventEmitter, EventSender, Pipeline};
use crate::prompts::PromptTemplates;
use crate::routing::{OpenRouteService, RouteProvider};
use crate::search::{BraveSearch, SearchProvider};

/// Message reported when routing yields no steps
pub const NO_ROUTE: &str = "No route found.";

/// Collaborators and settings for itinerary runs.
#[derive(Clone)]
pub struct Engine {
    route: Arc<dyn RouteProvider>,
    llm: Arc<dyn LLMProvider>,
    search: Arc<dyn SearchProvider>,
    templates: PromptTemplates,
    llm_config: LLMConfig,
    pipeline_config: PipelineConfig,
    events: EventEmitter,
}

impl Engine {
    pub fn new(
        route: Arc<dyn RouteProvider>,
        llm: Arc<dyn LLMProvider>,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        Self {
            route,
            llm,
            search,
            templates: PromptTemplates::builtin(),
            llm_config: LLMConfig::default(),
            pipeline_config: PipelineConfig::default(),
            events: EventEmitter::disabled(),
        }
    }

    /// Build the configured collaborators.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when routing has no API key or the
    /// language model backend cannot be created.
    pub fn from_config(config: &WayfarerConfig) -> Result<Self> {
        let route = OpenRouteService::from_config(&config.routing, &config.cache)?;
        let search = BraveSearch::from_config(&config.search, &config.cache)?;
        let llm = LLMProviderFactory::create(&config.llm)?;

        Ok(Self::new(Arc::new(route), llm, Arc::new(search))
            .with_templates(PromptTemplates::load(config.prompts.dir.as_deref()))
            .with_llm_config(LLMConfig::from(&config.llm))
            .with_pipeline_config(config.pipeline.clone()))
    }

    pub fn with_templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_llm_config(mut self, llm_config: LLMConfig) -> Self {
        self.llm_config = llm_config;
        self
    }

    pub fn with_pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = config;
        self
    }

    /// Register a channel that receives every run event
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = EventEmitter::new(Some(sender));
        self
    }

    /// Start a run in the background.
    ///
    /// `limit` keeps only the first `n` steps; `None` or `Some(0)` keeps all.
    pub fn start(
        &self,
        origin: impl Into<String>,
        destination: impl Into<String>,
        limit: Option<usize>,
    ) -> EngineHandle {
        let run_id = uuid::Uuid::new_v4().to_string();
        let state = Arc::new(RunState::default());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(self.clone().execute(
            run_id.clone(),
            origin.into(),
            destination.into(),
            limit,
            Arc::clone(&state),
            cancel.clone(),
        ));

        EngineHandle {
            run_id,
            state,
            cancel,
            task,
        }
    }

    async fn execute(
        self,
        run_id: String,
        origin: String,
        destination: String,
        limit: Option<usize>,
        state: Arc<RunState>,
        cancel: CancellationToken,
    ) {
        tracing::info!(%run_id, %origin, %destination, "Starting engine");

        match self.fetch_steps(&origin, &destination, limit).await {
            Ok(steps) => {
                state.total.store(steps.len(), Ordering::SeqCst);
                self.events
                    .run_started(&run_id, &origin, &destination, steps.len());

                let pipeline = Pipeline::new(
                    Arc::clone(&self.llm),
                    Arc::clone(&self.search),
                    self.templates.clone(),
                    self.pipeline_config.clone(),
                )
                .with_llm_config(self.llm_config.clone())
                .with_events(self.events.clone())
                .with_progress(Arc::clone(&state.collected))
                .with_cancellation(cancel);

                match pipeline.run(steps).await {
                    Ok(outcome) => {
                        if !outcome.is_complete() {
                            tracing::warn!(
                                collected = outcome.results.len(),
                                total = outcome.total,
                                "Run finished with missing steps"
                            );
                        }
                        *state.results.write().await = outcome.results;
                        tracing::info!(%run_id, "Engine execution complete");
                    }
                    Err(e) => {
                        tracing::error!(%run_id, error = %e, "Engine error");
                        *state.error.write().await = Some(e.to_string());
                    }
                }
            }
            Err(message) => {
                tracing::error!(%run_id, "{}", message);
                *state.error.write().await = Some(message);
            }
        }

        state.complete.store(true, Ordering::SeqCst);
        self.events.run_finished(
            &run_id,
            state.collected.load(Ordering::SeqCst),
            state.total.load(Ordering::SeqCst),
            state.error.read().await.clone(),
        );
    }

    /// Route lookup with the empty-route and limit rules applied.
    /// Errors come back as the terminal message.
    async fn fetch_steps(
        &self,
        origin: &str,
        destination: &str,
        limit: Option<usize>,
    ) -> std::result::Result<Vec<RouteStep>, String> {
        let mut steps = self
            .route
            .get_route(origin, destination)
            .await
            .map_err(|e| e.to_string())?;

        if steps.is_empty() {
            return Err(NO_ROUTE.to_string());
        }

        if let Some(limit) = limit.filter(|n| *n > 0) {
            tracing::info!("Limiting to {} steps", limit);
            steps.truncate(limit);
        }
        Ok(steps)
    }
}

#[derive(Default)]
struct RunState {
    total: AtomicUsize,
    collected: Arc<AtomicUsize>,
    complete: AtomicBool,
    results: RwLock<Vec<SelectedContent>>,
    error: RwLock<Option<String>>,
}

/// Observe and await a background run.
pub struct EngineHandle {
    run_id: String,
    state: Arc<RunState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EngineHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Fraction of steps collected so far, in `[0, 1]`
    pub fn progress(&self) -> f64 {
        let total = self.state.total.load(Ordering::SeqCst);
        if total == 0 {
            return 0.0;
        }
        let collected = self.state.collected.load(Ordering::SeqCst).min(total);
        collected as f64 / total as f64
    }

    /// True once the run has ended, with or without an error
    pub fn is_complete(&self) -> bool {
        self.state.complete.load(Ordering::SeqCst)
    }

    /// Selections in step order; empty until the run completes
    pub async fn results(&self) -> Vec<SelectedContent> {
        self.state.results.read().await.clone()
    }

    /// The terminal error, if the run failed
    pub async fn error(&self) -> Option<String> {
        self.state.error.read().await.clone()
    }

    /// Ask every pipeline unit to stop at its next poll
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to end.
    ///
    /// # Errors
    ///
    /// Returns the terminal error message verbatim, or a pipeline error if
    /// the run task itself panicked.
    pub async fn wait(self) -> Result<Vec<SelectedContent>> {
        self.task.await?;
        if let Some(message) = self.state.error.read().await.clone() {
            return Err(WayfarerError::Other(message));
        }
        Ok(self.state.results.read().await.clone())
    }
}
