//! Filename-based stem classification.
//!
//! The renderer names exported files after its track names, so the only
//! signal available for categorisation is the filename itself. Matching is
//! a fixed, ordered keyword table with first-match-wins semantics and
//! [`StemType::Other`] as the total fallback: classification must never
//! block the pipeline, so every input maps to a category.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Semantic category of a rendered stem, mirroring the queue API enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StemType {
    Drums,
    Bass,
    Vocals,
    Melody,
    Harmony,
    Effects,
    Master,
    Other,
}

impl std::fmt::Display for StemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StemType::Drums => "DRUMS",
            StemType::Bass => "BASS",
            StemType::Vocals => "VOCALS",
            StemType::Melody => "MELODY",
            StemType::Harmony => "HARMONY",
            StemType::Effects => "EFFECTS",
            StemType::Master => "MASTER",
            StemType::Other => "OTHER",
        };
        write!(f, "{s}")
    }
}

/// Ordered keyword table. Earlier rows win, so "bass drum" classifies as
/// drums. Keyword precedence is part of the worker's wire contract with
/// the review UI and must not be reordered casually.
const KEYWORD_TABLE: &[(&[&str], StemType)] = &[
    (&["drum"], StemType::Drums),
    (&["bass"], StemType::Bass),
    (&["vocal"], StemType::Vocals),
    (&["melody", "lead"], StemType::Melody),
    (&["pad", "chord"], StemType::Harmony),
    (&["fx", "effect"], StemType::Effects),
    (&["master"], StemType::Master),
];

/// Classify a rendered file by its name. Total: unmatched names are
/// [`StemType::Other`].
pub fn classify(filename: &str) -> StemType {
    let lower = filename.to_lowercase();
    for (keywords, stem_type) in KEYWORD_TABLE {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return *stem_type;
        }
    }
    StemType::Other
}

/// Derive a human label from a filename: the file stem, or the full name
/// when there is no stem to take.
pub fn label_for(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(filename)
        .to_string()
}
