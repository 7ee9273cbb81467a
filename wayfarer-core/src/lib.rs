//! # Wayfarer - multimedia itineraries for a driving route
//!
//! Wayfarer takes a route between two places and, for every maneuver, asks
//! three producer agents for something to enjoy on the way there:
//! - a video about the location
//! - a song that fits the moment
//! - a piece of local history
//!
//! An arbiter then picks one proposal per step, and the collector returns the
//! picks in route order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wayfarer_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = WayfarerConfig::load()?;
//!     let engine = Engine::from_config(&config)?;
//!
//!     let itinerary = engine.start("Denver, CO", "Boulder, CO", Some(5)).wait().await?;
//!     println!("{}", render_itinerary(&itinerary));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Collaborators**: [`routing::RouteProvider`], [`search::SearchProvider`]
//!   and [`llm::LLMProvider`] traits, with OpenRouteService, Brave and several
//!   model backends behind them
//! - **Pipeline**: scheduler, fan-out, per-step buffering, arbitration and
//!   collection as tokio tasks over channels ([`pipeline`])
//! - **Engine**: route lookup plus a background pipeline run with progress
//!   and events ([`engine`])
//!
//! ## Feature Flags
//!
//! - `llm-anthropic`: Anthropic messages API backend (default)
//! - `llm-ollama`: local Ollama backend (default)

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod model;
pub mod parsing;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod routing;
pub mod search;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::JsonCache;
    pub use crate::config::{
        CacheConfig, LLMBackend, LLMProviderConfig, PipelineConfig, PromptConfig, RoutingConfig,
        SearchConfig, WayfarerConfig,
    };
    pub use crate::engine::{Engine, EngineHandle};
    pub use crate::error::{Result, WayfarerError};
    pub use crate::llm::{
        generate_text, LLMConfig, LLMProvider, LLMProviderFactory, MockLLMProvider,
    };
    pub use crate::model::{
        ContentCandidate, ContentCategory, Coordinates, RouteStep, SearchResult, SelectedContent,
    };
    pub use crate::parsing::{JsonObjectParser, OutputParser, ParseError, ParseResult};
    pub use crate::pipeline::{
        event_channel, order_results, Arbiter, CandidateMessage, Collector, ContentAgent,
        EventEmitter, EventReceiver, EventSender, Pipeline, PipelineEvent, PipelineOutcome,
        Scheduler, Signal,
    };
    pub use crate::prompts::{PromptTemplate, PromptTemplates};
    pub use crate::report::render_itinerary;
    pub use crate::routing::{OpenRouteService, RouteProvider, StaticRoute};
    pub use crate::search::{BraveSearch, SearchKind, SearchProvider};
}
