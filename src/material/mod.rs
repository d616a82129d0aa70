//! Materials and the revisions a pipeline instance consumes from them.
//!
//! A [`Material`] identifies a checkable source. A [`MaterialRevision`] pairs a
//! material with the modifications picked up from it, newest first, and a
//! [`MaterialRevisionSet`] holds every revision consumed by one pipeline
//! instance. Sets are compared against the previous instance's set to decide
//! whether a new instance represents new work.

mod env;
mod filter;
mod matcher;
mod modification;
mod revision;
mod revisions;

pub use env::EnvironmentVariableContext;
pub use filter::Filter;
pub use matcher::Matcher;
pub use modification::{FileAction, Modification, ModifiedFile};
pub use revision::MaterialRevision;
pub use revisions::MaterialRevisionSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Result type for revision set operations.
pub type Result<T> = std::result::Result<T, RevisionError>;

/// Errors raised while building or validating revision sets.
#[derive(Debug, Error)]
pub enum RevisionError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Material {fingerprint} is already part of this revision set")]
    DuplicateMaterial { fingerprint: String },

    #[error("Pipeline {pipeline} has materials without modifications")]
    MissingModifications { pipeline: String },
}

/// The kind of source a material checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaterialKind {
    /// Version control repository, e.g. `git` or `hg`.
    Scm { scm_type: String, url: String },
    /// Another pipeline's stage acting as a material (fan-in).
    Dependency { pipeline: String, stage: String },
    Package { repository: String, package: String },
    PluggableScm { scm_name: String },
}

/// A checkable source declared by a pipeline.
///
/// `fingerprint` identifies the source across pipelines. Two declarations of
/// the same repository checked out into different folders share the
/// fingerprint but differ in [`Material::pipeline_unique_fingerprint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    kind: MaterialKind,
    fingerprint: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    folder: Option<String>,
    #[serde(default)]
    filter: Filter,
}

fn sha256_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"<|>");
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

impl Material {
    fn with_kind(kind: MaterialKind, fingerprint: String) -> Self {
        Self {
            kind,
            fingerprint,
            name: None,
            folder: None,
            filter: Filter::default(),
        }
    }

    pub fn scm(scm_type: impl Into<String>, url: impl Into<String>) -> Self {
        let scm_type = scm_type.into();
        let url = url.into();
        let fingerprint = sha256_hex(&[&format!("type={scm_type}"), &format!("url={url}")]);
        Self::with_kind(MaterialKind::Scm { scm_type, url }, fingerprint)
    }

    pub fn dependency(pipeline: impl Into<String>, stage: impl Into<String>) -> Self {
        let pipeline = pipeline.into();
        let stage = stage.into();
        let fingerprint = sha256_hex(&[
            &format!("pipelineName={pipeline}"),
            &format!("stageName={stage}"),
        ]);
        Self::with_kind(MaterialKind::Dependency { pipeline, stage }, fingerprint)
    }

    pub fn package(repository: impl Into<String>, package: impl Into<String>) -> Self {
        let repository = repository.into();
        let package = package.into();
        let fingerprint = sha256_hex(&[
            &format!("repository={repository}"),
            &format!("package={package}"),
        ]);
        Self::with_kind(MaterialKind::Package { repository, package }, fingerprint)
    }

    pub fn pluggable_scm(scm_name: impl Into<String>) -> Self {
        let scm_name = scm_name.into();
        let fingerprint = sha256_hex(&[&format!("scm={scm_name}")]);
        Self::with_kind(MaterialKind::PluggableScm { scm_name }, fingerprint)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn kind(&self) -> &MaterialKind {
        &self.kind
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Identity of this declaration within one pipeline's material list.
    pub fn pipeline_unique_fingerprint(&self) -> String {
        sha256_hex(&[&self.fingerprint, self.folder.as_deref().unwrap_or("")])
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn is_dependency(&self) -> bool {
        matches!(self.kind, MaterialKind::Dependency { .. })
    }

    /// Upstream pipeline of a dependency material.
    pub fn upstream_pipeline(&self) -> Option<&str> {
        match &self.kind {
            MaterialKind::Dependency { pipeline, .. } => Some(pipeline),
            _ => None,
        }
    }

    /// Name used to suffix the environment variables handed to jobs.
    pub fn env_name(&self) -> String {
        match &self.kind {
            MaterialKind::Scm { .. } => self
                .name
                .clone()
                .or_else(|| self.folder.clone())
                .unwrap_or_default(),
            MaterialKind::Dependency { pipeline, .. } => {
                self.name.clone().unwrap_or_else(|| pipeline.clone())
            }
            MaterialKind::Package {
                repository,
                package,
            } => format!("{repository}_{package}"),
            MaterialKind::PluggableScm { scm_name } => {
                self.name.clone().unwrap_or_else(|| scm_name.clone())
            }
        }
    }

    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match &self.kind {
            MaterialKind::Scm { url, .. } => url.clone(),
            MaterialKind::Dependency { pipeline, .. } => pipeline.clone(),
            MaterialKind::Package {
                repository,
                package,
            } => format!("{repository}:{package}"),
            MaterialKind::PluggableScm { scm_name } => scm_name.clone(),
        }
    }
}
