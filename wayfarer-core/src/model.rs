//! Data model shared by the pipeline and its collaborators

use serde::{Deserialize, Serialize};
use std::fmt;

/// A geographic position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// One maneuver of a driving route.
///
/// Identifiers have the form `step_<n>` where `n` is the position in the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub id: String,
    pub instruction: String,
    /// Metres
    pub distance: f64,
    /// Seconds
    pub duration: f64,
    pub start_location: Option<Coordinates>,
    pub end_location: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl RouteStep {
    /// Identifier for the step at `index`
    pub fn id_for(index: usize) -> String {
        format!("step_{}", index)
    }

    /// Text used to describe where this step happens: the address when the
    /// routing backend supplied one, else the end coordinates.
    pub fn location_description(&self) -> String {
        if let Some(address) = self.address.as_deref().filter(|a| !a.trim().is_empty()) {
            return address.to_string();
        }
        match self.end_location {
            Some(coords) => coords.to_string(),
            None => "unknown location".to_string(),
        }
    }
}

/// The closed set of content kinds a producer can propose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Video,
    Music,
    History,
}

impl ContentCategory {
    /// Every category, in judging-slot order
    pub const ALL: [ContentCategory; 3] = [
        ContentCategory::Video,
        ContentCategory::Music,
        ContentCategory::History,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Video => "video",
            ContentCategory::Music => "music",
            ContentCategory::History => "history",
        }
    }

    /// Parse a category tag as produced by the judging model. Only the
    /// exact lowercase tags match.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "video" => Some(ContentCategory::Video),
            "music" => Some(ContentCategory::Music),
            "history" => Some(ContentCategory::History),
            _ => None,
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single proposal for a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCandidate {
    pub category: ContentCategory,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub reasoning: String,
}

/// The arbiter's final choice for a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedContent {
    pub step_id: String,
    pub chosen_candidate: ContentCandidate,
    pub judge_reasoning: String,
}

/// One hit returned by a search backend
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
}
