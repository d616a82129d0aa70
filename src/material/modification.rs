//! A single change recorded against a material.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a file in a modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Added,
    Modified,
    Deleted,
    Unknown,
}

/// A file touched by a modification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModifiedFile {
    pub path: String,
    pub action: FileAction,
}

impl ModifiedFile {
    pub fn new(path: impl Into<String>, action: FileAction) -> Self {
        Self {
            path: path.into(),
            action,
        }
    }
}

/// One change to one material: a commit, an upstream pipeline run or a
/// package release.
///
/// Immutable once built. Equality ignores the persisted `id`, so a change
/// read back from storage equals the one that was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Modification {
    #[serde(default)]
    id: i64,
    author: String,
    #[serde(default)]
    email: Option<String>,
    comment: String,
    revision: String,
    modified_time: DateTime<Utc>,
    #[serde(default)]
    folder: Option<String>,
    #[serde(default)]
    files: Vec<ModifiedFile>,
    #[serde(default)]
    pipeline_label: Option<String>,
}

impl Modification {
    pub fn new(
        author: impl Into<String>,
        comment: impl Into<String>,
        revision: impl Into<String>,
        modified_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            author: author.into(),
            email: None,
            comment: comment.into(),
            revision: revision.into(),
            modified_time,
            folder: None,
            files: Vec::new(),
            pipeline_label: None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn with_files(mut self, files: Vec<ModifiedFile>) -> Self {
        self.files = files;
        self
    }

    /// Label of the upstream pipeline run this modification stands for.
    pub fn with_pipeline_label(mut self, label: impl Into<String>) -> Self {
        self.pipeline_label = Some(label.into());
        self
    }

    /// Persisted id, 0 until stored.
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn modified_time(&self) -> DateTime<Utc> {
        self.modified_time
    }

    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    pub fn files(&self) -> &[ModifiedFile] {
        &self.files
    }

    pub fn pipeline_label(&self) -> Option<&str> {
        self.pipeline_label.as_deref()
    }

    /// A modification without a revision carries no information and may not
    /// enter a revision set.
    pub fn is_null_equivalent(&self) -> bool {
        self.revision.is_empty()
    }
}

impl PartialEq for Modification {
    fn eq(&self, other: &Self) -> bool {
        self.revision == other.revision
            && self.author == other.author
            && self.email == other.email
            && self.comment == other.comment
            && self.modified_time == other.modified_time
            && self.folder == other.folder
            && self.files == other.files
            && self.pipeline_label == other.pipeline_label
    }
}

impl Eq for Modification {}
