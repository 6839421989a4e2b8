//! The `OUTPUT_FILE::` stage hand-off convention.
//!
//! The ingest stage prints `OUTPUT_FILE::<path>` as its final stdout line so
//! an external orchestrator can pick up the produced transcript without
//! scraping human-oriented output. The parser takes the *last* marker line,
//! since diagnostics may precede it.

use std::path::{Path, PathBuf};

use profitgraph_shared::{ProfitGraphError, Result};

/// Line prefix announcing a produced artifact's path.
pub const OUTPUT_FILE_MARKER: &str = "OUTPUT_FILE::";

/// Format the marker line for a produced artifact.
pub fn emit(path: &Path) -> String {
    format!("{OUTPUT_FILE_MARKER}{}", path.display())
}

/// Extract the artifact path from stage output, or fail with the
/// validation error an orchestrator should surface.
pub fn require(output: &str) -> Result<PathBuf> {
    parse(output).ok_or_else(|| {
        ProfitGraphError::validation(format!(
            "stage output contained no {OUTPUT_FILE_MARKER} marker line"
        ))
    })
}

/// Extract the artifact path from stage output.
///
/// Returns the trailing path of the last line carrying the marker prefix,
/// or `None` when no such line exists.
pub fn parse(output: &str) -> Option<PathBuf> {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(OUTPUT_FILE_MARKER))
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_then_parse_roundtrips() {
        let path = Path::new("/data/transcripts/dQw4w9WgXcQ_transcript.json");
        let line = emit(path);
        assert_eq!(parse(&line).as_deref(), Some(path));
    }

    #[test]
    fn parse_returns_exact_trailing_path() {
        let output = "fetching captions...\nOUTPUT_FILE::/path/to/file\n";
        assert_eq!(parse(output), Some(PathBuf::from("/path/to/file")));
    }

    #[test]
    fn parse_takes_last_marker_line() {
        let output = "OUTPUT_FILE::/old/path\nsome diagnostics\nOUTPUT_FILE::/new/path\n";
        assert_eq!(parse(output), Some(PathBuf::from("/new/path")));
    }

    #[test]
    fn parse_none_without_marker() {
        assert_eq!(parse("no marker here\njust logs\n"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn parse_none_for_empty_path() {
        assert_eq!(parse("OUTPUT_FILE::\n"), None);
        assert_eq!(parse("OUTPUT_FILE::   \n"), None);
    }

    #[test]
    fn parse_ignores_mid_line_occurrences() {
        // The marker is a line prefix, not a substring convention.
        assert_eq!(parse("saw OUTPUT_FILE:: in docs\n"), None);
    }

    #[test]
    fn require_surfaces_missing_marker_as_validation_error() {
        let err = require("logs only, no marker\n").unwrap_err();
        assert!(err.to_string().contains("OUTPUT_FILE::"));

        let path = require("OUTPUT_FILE::/path/to/file\n").expect("marker present");
        assert_eq!(path, PathBuf::from("/path/to/file"));
    }
}
