// Year/Make/Model/System resolution from document paths
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

use crate::config::{MetadataPolicy, NOT_AVAILABLE};
use crate::types::PathMetadata;

static SYSTEM_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((.*?)\)").expect("valid regex"));
static YEAR_OR_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+\b|\b[A-Z][a-z]*\b").expect("valid regex"));
static CAPITALIZED_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-zA-Z0-9 ]*\b").expect("valid regex"));

/// Resolves identity fields for documents, never failing: anything that
/// cannot be found becomes "N/A".
///
/// With [`MetadataPolicy::Auto`] the directory structure wins whenever the
/// path is deep enough to carry make/year/model folders; otherwise the
/// filename is scanned for tokens.
#[derive(Debug, Clone, Default)]
pub struct PathMetadataResolver {
    policy: MetadataPolicy,
    root: Option<PathBuf>,
}

impl PathMetadataResolver {
    pub fn new(policy: MetadataPolicy) -> Self {
        Self { policy, root: None }
    }

    /// Anchors structural resolution at a corpus root, so that make, year
    /// and model are the first three folders below it regardless of how
    /// deep the document sits (split parts live one level lower).
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn resolve(&self, path: &Path) -> PathMetadata {
        let file_name = file_name_of(path);
        match self.policy {
            MetadataPolicy::Pattern => resolve_pattern(&file_name),
            MetadataPolicy::Structural => resolve_structural(path, self.root.as_deref())
                .unwrap_or_else(|| PathMetadata {
                    system: system_tag(&file_name).unwrap_or_else(na),
                    ..PathMetadata::default()
                }),
            MetadataPolicy::Auto => resolve_structural(path, self.root.as_deref())
                .unwrap_or_else(|| resolve_pattern(&file_name)),
        }
    }
}

/// Reads make/year/model from folders. Returns `None` when the path is too
/// shallow to hold them.
pub fn resolve_structural(path: &Path, root: Option<&Path>) -> Option<PathMetadata> {
    let file_name = file_name_of(path);
    let folders: Vec<String> = match root.and_then(|r| path.strip_prefix(r).ok()) {
        // Relative to the root: make/year/model/.../file
        Some(relative) => {
            let parts = normal_components(relative);
            if parts.len() < 4 {
                return None;
            }
            parts[..3].to_vec()
        }
        // No usable root: the three folders directly above the file.
        None => {
            let parts = normal_components(path.parent()?);
            if parts.len() < 3 {
                return None;
            }
            parts[parts.len() - 3..].to_vec()
        }
    };

    Some(PathMetadata {
        make: folders[0].clone(),
        year: folders[1].clone(),
        model: folders[2].clone(),
        system: system_tag(&file_name).unwrap_or_else(na),
    })
}

/// Scans a bare filename: first digit run is the year, first capitalized
/// word the make, the first capitalized multi-word run (minus a leading
/// make) the model, and the first parenthesized group the system.
pub fn resolve_pattern(file_name: &str) -> PathMetadata {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());

    let mut year = None;
    let mut make = None;
    for token in YEAR_OR_WORD.find_iter(&stem).map(|m| m.as_str()) {
        if token.chars().all(|c| c.is_ascii_digit()) {
            year.get_or_insert_with(|| token.to_string());
        } else {
            make.get_or_insert_with(|| token.to_string());
        }
        if year.is_some() && make.is_some() {
            break;
        }
    }

    let model = CAPITALIZED_RUN.find(&stem).and_then(|m| {
        let run = m.as_str().trim();
        let run = match &make {
            Some(make) => run.strip_prefix(make.as_str()).unwrap_or(run),
            None => run,
        };
        let run = run.trim();
        (!run.is_empty()).then(|| run.to_string())
    });

    PathMetadata {
        year: year.unwrap_or_else(na),
        make: make.unwrap_or_else(na),
        model: model.unwrap_or_else(na),
        system: system_tag(file_name).unwrap_or_else(na),
    }
}

/// First parenthesized group of a filename, e.g. `Pads (Brakes).pdf` → `Brakes`.
pub fn system_tag(file_name: &str) -> Option<String> {
    SYSTEM_TAG
        .captures(file_name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn na() -> String {
    NOT_AVAILABLE.to_string()
}
