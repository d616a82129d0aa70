//! One material and the modifications picked up from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::env::env_suffix;
use super::{EnvironmentVariableContext, Material, MaterialKind, Matcher, Modification};
use super::{Result, RevisionError};

/// A material together with its modifications, newest first.
///
/// `changed` records whether this material triggered the instance. The null
/// sentinel ([`MaterialRevision::null`]) has no material and no modifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRevision {
    material: Option<Material>,
    modifications: Vec<Modification>,
    #[serde(default)]
    changed: bool,
}

pub(crate) fn reject_null_equivalent(modifications: &[Modification]) -> Result<()> {
    if let Some(m) = modifications.iter().find(|m| m.is_null_equivalent()) {
        return Err(RevisionError::InvalidArgument(format!(
            "Modification by {} at {} has no revision",
            m.author(),
            m.modified_time()
        )));
    }
    Ok(())
}

impl MaterialRevision {
    pub fn new(material: Material, modifications: Vec<Modification>) -> Result<Self> {
        reject_null_equivalent(&modifications)?;
        Ok(Self {
            material: Some(material),
            modifications,
            changed: false,
        })
    }

    /// Revision standing in for "no revision at all".
    pub fn null() -> Self {
        Self {
            material: None,
            modifications: Vec::new(),
            changed: false,
        }
    }

    pub fn with_changed(mut self, changed: bool) -> Self {
        self.changed = changed;
        self
    }

    pub fn is_null(&self) -> bool {
        self.material.is_none()
    }

    pub fn material(&self) -> Option<&Material> {
        self.material.as_ref()
    }

    pub fn modifications(&self) -> &[Modification] {
        &self.modifications
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn set_changed(&mut self, changed: bool) {
        self.changed = changed;
    }

    pub fn pipeline_unique_fingerprint(&self) -> Option<String> {
        self.material.as_ref().map(Material::pipeline_unique_fingerprint)
    }

    pub fn latest_modification(&self) -> Option<&Modification> {
        self.modifications.first()
    }

    pub fn oldest_modification(&self) -> Option<&Modification> {
        self.modifications.last()
    }

    /// Revision string of the head modification.
    pub fn latest_revision(&self) -> Option<&str> {
        self.latest_modification().map(Modification::revision)
    }

    pub fn date_of_latest_modification(&self) -> Option<DateTime<Utc>> {
        self.latest_modification().map(Modification::modified_time)
    }

    pub fn is_missing_modifications(&self) -> bool {
        self.modifications.is_empty()
    }

    pub(crate) fn replace_modifications(&mut self, modifications: Vec<Modification>) {
        self.modifications = modifications;
    }

    /// True when the head revision differs from `other`'s.
    pub fn has_changed_since(&self, other: &MaterialRevision) -> bool {
        self.latest_revision() != other.latest_revision()
    }

    /// Falls back to `previous` when every new modification is ignored by
    /// the material's filter.
    pub fn filter(&self, previous: Option<&MaterialRevision>) -> MaterialRevision {
        match (previous, &self.material) {
            (Some(previous), Some(material))
                if self.has_changed_since(previous) && material.filter().ignores_all(self) =>
            {
                previous.clone()
            }
            _ => self.clone(),
        }
    }

    /// Upstream pipeline label for dependency materials, head revision otherwise.
    pub fn latest_label(&self) -> Option<&str> {
        let latest = self.latest_modification()?;
        match latest.pipeline_label() {
            Some(label) if self.is_dependency() => Some(label),
            _ => Some(latest.revision()),
        }
    }

    fn is_dependency(&self) -> bool {
        self.material.as_ref().is_some_and(Material::is_dependency)
    }

    /// Who caused this revision: the upstream pipeline for dependencies, the
    /// head modification's author otherwise.
    pub fn build_caused_by(&self) -> String {
        match (&self.material, self.latest_modification()) {
            (Some(material), _) if material.is_dependency() => material
                .upstream_pipeline()
                .unwrap_or_default()
                .to_string(),
            (_, Some(latest)) if !latest.author().is_empty() => latest.author().to_string(),
            _ => "Unknown".to_string(),
        }
    }

    pub fn contains_my_checkin(&self, matcher: &Matcher) -> bool {
        !matcher.is_empty()
            && self
                .modifications
                .iter()
                .any(|m| matcher.matches_modification(m))
    }

    pub fn populate_environment_variables(&self, context: &mut EnvironmentVariableContext) {
        let Some(material) = &self.material else {
            return;
        };
        let suffix = env_suffix(&material.env_name());
        context.set_property(
            format!("GO_MATERIAL{suffix}_HAS_CHANGED"),
            self.changed.to_string(),
        );
        let Some(latest) = self.latest_modification() else {
            return;
        };
        match material.kind() {
            MaterialKind::Dependency { .. } => {
                context.set_property(format!("GO_DEPENDENCY_LOCATOR{suffix}"), latest.revision());
                context.set_property(
                    format!("GO_DEPENDENCY_LABEL{suffix}"),
                    latest.pipeline_label().unwrap_or(latest.revision()),
                );
            }
            _ => {
                let oldest = self.oldest_modification().unwrap_or(latest);
                context.set_property(format!("GO_REVISION{suffix}"), latest.revision());
                context.set_property(format!("GO_TO_REVISION{suffix}"), latest.revision());
                context.set_property(format!("GO_FROM_REVISION{suffix}"), oldest.revision());
            }
        }
    }
}
