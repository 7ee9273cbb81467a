//! Plain-text itinerary report

use std::fmt::Write;

use crate::model::SelectedContent;

/// Render the final itinerary, one block per step.
pub fn render_itinerary(results: &[SelectedContent]) -> String {
    let rule = "=".repeat(50);
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "\n{}", rule);
    let _ = writeln!(out, "FINAL TRAVEL GUIDE ITINERARY");
    let _ = writeln!(out, "{}\n", rule);

    for result in results {
        let candidate = &result.chosen_candidate;
        let _ = writeln!(out, "Step: {}", result.step_id);
        let _ = writeln!(
            out,
            "Selected Content: [{}] {}",
            candidate.category.as_str().to_uppercase(),
            candidate.title
        );
        let _ = writeln!(out, "Description: {}", candidate.description);
        if let Some(url) = candidate.url.as_deref().filter(|u| !u.is_empty()) {
            let _ = writeln!(out, "URL: {}", url);
        }
        let _ = writeln!(out, "Reasoning: {}", result.judge_reasoning);
        let _ = writeln!(out, "{}", "-".repeat(30));
    }

    out
}
