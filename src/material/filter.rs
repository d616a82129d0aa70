//! Ignore filters for material modifications.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{MaterialRevision, Modification};

/// Glob patterns naming files whose changes should not trigger a pipeline.
///
/// `*` stays within one path segment, `**` crosses segments. Leading `/` is
/// ignored on both patterns and paths. Patterns are compiled once, when the
/// filter is built or deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "FilterPatterns", into = "FilterPatterns")]
pub struct Filter {
    ignore: Vec<String>,
    compiled: GlobSet,
}

/// Serialized form of a [`Filter`].
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct FilterPatterns {
    ignore: Vec<String>,
}

impl From<FilterPatterns> for Filter {
    fn from(patterns: FilterPatterns) -> Self {
        Self::new(patterns.ignore)
    }
}

impl From<Filter> for FilterPatterns {
    fn from(filter: Filter) -> Self {
        Self {
            ignore: filter.ignore,
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            compiled: GlobSet::empty(),
        }
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.ignore == other.ignore
    }
}

impl Eq for Filter {}

impl Filter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ignore: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let compiled = compile(&ignore);
        Self { ignore, compiled }
    }

    pub fn patterns(&self) -> &[String] {
        &self.ignore
    }

    pub fn is_empty(&self) -> bool {
        self.ignore.is_empty()
    }

    /// True when `path` matches at least one ignore pattern.
    pub fn matches_path(&self, path: &str) -> bool {
        self.compiled.is_match(path.trim_start_matches('/'))
    }

    /// A modification is ignored when it touched files and every one of them
    /// is covered by the filter.
    pub fn should_ignore(&self, modification: &Modification) -> bool {
        Self::ignores(&self.compiled, modification)
    }

    /// True when every modification of `revision` is ignored. A revision
    /// without modifications is never ignorable.
    pub fn ignores_all(&self, revision: &MaterialRevision) -> bool {
        if self.ignore.is_empty() || revision.modifications().is_empty() {
            return false;
        }
        revision
            .modifications()
            .iter()
            .all(|m| Self::ignores(&self.compiled, m))
    }

    fn ignores(set: &GlobSet, modification: &Modification) -> bool {
        let files = modification.files();
        !files.is_empty()
            && files
                .iter()
                .all(|f| set.is_match(f.path.trim_start_matches('/')))
    }
}

fn compile(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match GlobBuilder::new(pattern.trim_start_matches('/'))
            .literal_separator(true)
            .build()
        {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!(pattern = %pattern, error = %e, "Skipping invalid ignore pattern"),
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "Ignore filter could not be compiled, ignoring nothing");
        GlobSet::empty()
    })
}
