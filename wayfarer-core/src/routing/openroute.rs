//! OpenRouteService geocoding and driving directions

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::cache::JsonCache;
use crate::config::{CacheConfig, RoutingConfig};
use crate::error::{Result, WayfarerError};
use crate::model::{Coordinates, RouteStep};

use super::RouteProvider;

/// OpenRouteService client with a persistent route cache.
pub struct OpenRouteService {
    client: reqwest::Client,
    api_key: String,
    directions_url: String,
    geocode_url: String,
    cache: JsonCache,
}

impl OpenRouteService {
    /// # Errors
    ///
    /// Returns a configuration error when no API key is configured.
    pub fn new(config: &RoutingConfig, cache: JsonCache) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            tracing::error!("ORS_API_KEY is not set.");
            WayfarerError::Configuration("ORS_API_KEY is required.".to_string())
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            directions_url: config.directions_url.clone(),
            geocode_url: config.geocode_url.clone(),
            cache,
        })
    }

    /// Build from config, caching to `route_cache.json` under the cache dir.
    pub fn from_config(routing: &RoutingConfig, cache: &CacheConfig) -> Result<Self> {
        Self::new(routing, JsonCache::open(cache.file("route_cache.json")))
    }

    /// Resolve an address to `[lon, lat]`.
    async fn geocode(&self, address: &str) -> Option<[f64; 2]> {
        let response = self
            .client
            .get(&self.geocode_url)
            .query(&[("api_key", self.api_key.as_str()), ("text", address), ("size", "1")])
            .send()
            .await;

        let body: Value = match response {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::error!(address, error = %e, "Geocoding response unreadable");
                    return None;
                }
            },
            Ok(r) => {
                tracing::error!(address, status = %r.status(), "Geocoding failed");
                return None;
            }
            Err(e) => {
                tracing::error!(address, error = %e, "Geocoding failed");
                return None;
            }
        };

        let coords = body.pointer("/features/0/geometry/coordinates")?.as_array()?;
        Some([coords.first()?.as_f64()?, coords.get(1)?.as_f64()?])
    }

    async fn fetch_directions(&self, origin: &str, destination: &str) -> Option<Value> {
        let (Some(start), Some(end)) = (self.geocode(origin).await, self.geocode(destination).await)
        else {
            tracing::error!("Failed to geocode origin or destination.");
            return None;
        };

        let start = format!("{},{}", start[0], start[1]);
        let end = format!("{},{}", end[0], end[1]);
        let response = self
            .client
            .get(&self.directions_url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
            ])
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => match r.json::<Value>().await {
                Ok(body) => Some(body),
                Err(e) => {
                    tracing::error!(error = %e, "Error reading route response");
                    None
                }
            },
            Ok(r) => {
                let status = r.status();
                let text = r.text().await.unwrap_or_default();
                tracing::error!(%status, body = %text, "ORS API Error");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Error fetching route");
                None
            }
        }
    }
}

#[async_trait]
impl RouteProvider for OpenRouteService {
    async fn get_route(&self, origin: &str, destination: &str) -> Result<Vec<RouteStep>> {
        let cache_key =
            JsonCache::digest_key(&[&origin.to_lowercase(), &destination.to_lowercase()]);

        let route = match self.cache.get(&cache_key).await {
            Some(route) => {
                tracing::info!(origin, destination, "Route found in cache");
                route
            }
            None => {
                tracing::info!(origin, destination, "Fetching route from ORS");
                let Some(route) = self.fetch_directions(origin, destination).await else {
                    return Ok(Vec::new());
                };
                self.cache.insert(cache_key, route.clone()).await;
                route
            }
        };

        Ok(parse_route(&route))
    }
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Properties,
    geometry: Option<Geometry>,
}

#[derive(Deserialize, Default)]
struct Properties {
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct Segment {
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    instruction: String,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    way_points: Vec<usize>,
}

/// Turn an ORS GeoJSON directions response into route steps.
///
/// Only the first feature's first segment is read; simple A-to-B routes
/// have exactly one. Steps are numbered `step_0`, `step_1`, ...
pub fn parse_route(route: &Value) -> Vec<RouteStep> {
    let collection = match FeatureCollection::deserialize(route) {
        Ok(collection) => collection,
        Err(e) => {
            tracing::warn!(error = %e, "Route response has unexpected shape");
            return Vec::new();
        }
    };

    let Some(feature) = collection.features.into_iter().next() else {
        return Vec::new();
    };
    let Some(segment) = feature.properties.segments.into_iter().next() else {
        return Vec::new();
    };
    let geometry = feature.geometry.map(|g| g.coordinates).unwrap_or_default();

    let point = |index: Option<&usize>| -> Option<Coordinates> {
        let lon_lat = geometry.get(*index?)?;
        Some(Coordinates::new(*lon_lat.get(1)?, *lon_lat.first()?))
    };

    segment
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, raw)| RouteStep {
            id: RouteStep::id_for(i),
            start_location: point(raw.way_points.first()),
            end_location: point(raw.way_points.last()),
            instruction: raw.instruction,
            distance: raw.distance,
            duration: raw.duration,
            address: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_route() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "properties": {
                    "segments": [{
                        "distance": 1500.0,
                        "steps": [
                            {"instruction": "Head north on Broadway", "distance": 500.0, "duration": 60.0, "way_points": [0, 1]},
                            {"instruction": "Turn right onto 5th Ave", "distance": 1000.0, "duration": 120.5, "way_points": [1, 2]},
                            {"instruction": "Arrive at destination", "distance": 0.0, "duration": 0.0, "way_points": [2, 2]}
                        ]
                    }]
                },
                "geometry": {
                    "coordinates": [[-74.0, 40.7], [-73.99, 40.71], [-73.98, 40.72]]
                }
            }]
        })
    }

    #[test]
    fn test_parse_route_steps() {
        let steps = parse_route(&sample_route());
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].id, "step_0");
        assert_eq!(steps[2].id, "step_2");
        assert_eq!(steps[1].instruction, "Turn right onto 5th Ave");
        assert_eq!(steps[1].duration, 120.5);
        assert_eq!(steps[0].start_location, Some(Coordinates::new(40.7, -74.0)));
        assert_eq!(steps[0].end_location, Some(Coordinates::new(40.71, -73.99)));
    }

    #[test]
    fn test_parse_route_missing_way_points() {
        let route = json!({
            "features": [{
                "properties": {"segments": [{"steps": [{"instruction": "Go"}]}]},
                "geometry": {"coordinates": []}
            }]
        });
        let steps = parse_route(&route);
        assert_eq!(steps.len(), 1);
        assert!(steps[0].start_location.is_none());
        assert!(steps[0].end_location.is_none());
    }

    #[test]
    fn test_parse_route_empty_shapes() {
        assert!(parse_route(&json!({})).is_empty());
        assert!(parse_route(&json!({"features": []})).is_empty());
        assert!(parse_route(&json!({"features": [{"properties": {"segments": []}}]})).is_empty());
        assert!(parse_route(&json!("error")).is_empty());
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = OpenRouteService::new(&RoutingConfig::default(), JsonCache::in_memory());
        assert!(matches!(result, Err(WayfarerError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_get_route_uses_cache() {
        let cache = JsonCache::in_memory();
        let key = JsonCache::digest_key(&["new york, ny", "boston, ma"]);
        cache.insert(key, sample_route()).await;

        let config = RoutingConfig {
            api_key: Some("test".to_string()),
            ..Default::default()
        };
        let ors = OpenRouteService::new(&config, cache).unwrap();
        let steps = ors.get_route("New York, NY", "Boston, MA").await.unwrap();
        assert_eq!(steps.len(), 3);
    }
}
