//! Routing collaborators: origin and destination in, ordered steps out

use async_trait::async_trait;

use crate::error::Result;
use crate::model::RouteStep;

pub mod openroute;

pub use openroute::{parse_route, OpenRouteService};

/// Trait for route sources.
///
/// An empty vector means no route could be found; errors are reserved for
/// failures the caller should surface verbatim.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn get_route(&self, origin: &str, destination: &str) -> Result<Vec<RouteStep>>;
}

/// A fixed list of steps, handy for demos and tests.
pub struct StaticRoute {
    steps: Vec<RouteStep>,
}

impl StaticRoute {
    pub fn new(steps: Vec<RouteStep>) -> Self {
        Self { steps }
    }
}

#[async_trait]
impl RouteProvider for StaticRoute {
    async fn get_route(&self, _origin: &str, _destination: &str) -> Result<Vec<RouteStep>> {
        Ok(self.steps.clone())
    }
}
