//! Static image mode output.

use facescope_core::AnalysisResult;
use std::fmt::Write as _;

/// `Name:` / `Location:` / `Attributes:` blocks, each closed by `---`.
pub fn format_text(results: &[AnalysisResult]) -> String {
    let mut out = String::new();
    for result in results {
        let attributes = match &result.attributes {
            Some(attrs) => attrs.to_string(),
            None => "None".to_string(),
        };
        // Writing to a String cannot fail.
        let _ = writeln!(out, "Name: {}", result.name);
        let _ = writeln!(out, "Location: {}", result.location);
        let _ = writeln!(out, "Attributes: {attributes}");
        let _ = writeln!(out, "---");
    }
    out
}

pub fn format_json(results: &[AnalysisResult]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(results)
}
