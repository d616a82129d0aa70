//! The set of material revisions consumed by one pipeline instance.


use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::revision::reject_null_equivalent;
use super::{EnvironmentVariableContext, Material, MaterialRevision, Matcher, Modification};
use super::{Result, RevisionError};

/// Every [`MaterialRevision`] consumed by one pipeline instance, in
/// declaration order. No two revisions share a pipeline-unique fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialRevisionSet {
    revisions: Vec<MaterialRevision>,
}

impl MaterialRevisionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_revisions<I>(revisions: I) -> Result<Self>
    where
        I: IntoIterator<Item = MaterialRevision>,
    {
        let mut set = Self::new();
        for revision in revisions {
            set.add_revision(revision)?;
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MaterialRevision> {
        self.revisions.iter()
    }

    pub fn get(&self, index: usize) -> Option<&MaterialRevision> {
        self.revisions.get(index)
    }

    /// Appends a revision for `material`. The set is unchanged on error.
    pub fn add(&mut self, material: Material, modifications: Vec<Modification>) -> Result<()> {
        self.add_revision(MaterialRevision::new(material, modifications)?)
    }

    /// Appends `revision`. The set is unchanged on error.
    pub fn add_revision(&mut self, revision: MaterialRevision) -> Result<()> {
        let Some(material) = revision.material() else {
            return Err(RevisionError::InvalidArgument(
                "The null revision cannot be added to a revision set".to_string(),
            ));
        };
        reject_null_equivalent(revision.modifications())?;
        if self.find_revision_for(material).is_some() {
            return Err(RevisionError::DuplicateMaterial {
                fingerprint: material.fingerprint().to_string(),
            });
        }
        self.revisions.push(revision);
        Ok(())
    }

    pub fn find_revision_for(&self, material: &Material) -> Option<&MaterialRevision> {
        let key = material.pipeline_unique_fingerprint();
        self.revisions
            .iter()
            .find(|r| r.pipeline_unique_fingerprint().as_deref() == Some(key.as_str()))
    }

    fn position_of(&self, material: &Material) -> Option<usize> {
        let key = material.pipeline_unique_fingerprint();
        self.revisions
            .iter()
            .position(|r| r.pipeline_unique_fingerprint().as_deref() == Some(key.as_str()))
    }

    fn counterpart_in<'a>(&self, revision: &MaterialRevision, other: &'a Self) -> Option<&'a MaterialRevision> {
        revision.material().and_then(|m| other.find_revision_for(m))
    }

    /// True when this set represents new work relative to `original`.
    ///
    /// Revisions whose new modifications are all ignored by their material's
    /// filter count as unchanged. Neither set is modified.
    pub fn has_changed_since(&self, original: &MaterialRevisionSet) -> bool {
        let filtered = self.filter(original);
        if filtered.len() != original.len() {
            return true;
        }
        filtered.iter().any(|revision| {
            match filtered.counterpart_in(revision, original) {
                Some(previous) => revision.has_changed_since(previous),
                None => true,
            }
        })
    }

    /// Replaces revisions that only carry ignored modifications with their
    /// counterpart from `original`.
    pub fn filter(&self, original: &MaterialRevisionSet) -> MaterialRevisionSet {
        MaterialRevisionSet {
            revisions: self
                .revisions
                .iter()
                .map(|r| r.filter(self.counterpart_in(r, original)))
                .collect(),
        }
    }

    /// Same materials with the same latest modification each.
    pub fn is_same_as(&self, other: &MaterialRevisionSet) -> bool {
        self.len() == other.len()
            && self.revisions.iter().all(|revision| {
                self.counterpart_in(revision, other)
                    .is_some_and(|o| o.latest_modification() == revision.latest_modification())
            })
    }

    fn first_modified(&self) -> Option<&MaterialRevision> {
        self.revisions
            .iter()
            .find(|r| r.is_changed())
            .or_else(|| self.revisions.first())
    }

    /// The first revision that triggered the instance, else the first
    /// revision, else the null revision.
    pub fn first_modified_material_revision(&self) -> MaterialRevision {
        self.first_modified()
            .cloned()
            .unwrap_or_else(MaterialRevision::null)
    }

    pub fn is_missing_modifications(&self) -> bool {
        self.revisions.is_empty() || self.revisions.iter().any(|r| r.is_missing_modifications())
    }

    /// Recomputes `changed` against the revisions of an upstream instance.
    ///
    /// A revision stays changed only when the matching original revision was
    /// changed and already contained this revision's head. Revisions with no
    /// counterpart keep their flag.
    #[deprecated(note = "only needed for triangular fan-in dependencies")]
    pub fn update_revision_changed_status(&mut self, original: &MaterialRevisionSet) {
        for revision in &mut self.revisions {
            let Some(previous) = revision.material().and_then(|m| original.find_revision_for(m)) else {
                continue;
            };
            let changed = previous.is_changed()
                && revision
                    .latest_modification()
                    .is_some_and(|latest| previous.modifications().contains(latest));
            revision.set_changed(changed);
        }
    }

    pub fn replace_modifications(
        &mut self,
        material: &Material,
        modifications: Vec<Modification>,
    ) -> Result<()> {
        reject_null_equivalent(&modifications)?;
        let index = self.position_of(material).ok_or_else(|| {
            RevisionError::InvalidArgument(format!(
                "Material {} is not part of this revision set",
                material.display_name()
            ))
        })?;
        self.revisions[index].replace_modifications(modifications);
        Ok(())
    }

    pub fn modifications_for(&self, material: &Material) -> &[Modification] {
        self.find_revision_for(material)
            .map(MaterialRevision::modifications)
            .unwrap_or_default()
    }

    pub fn date_of_latest_modification(&self) -> Option<DateTime<Utc>> {
        self.revisions
            .iter()
            .filter_map(MaterialRevision::date_of_latest_modification)
            .max()
    }

    /// Head revision of the first modified material.
    pub fn latest_revision(&self) -> Option<String> {
        self.first_modified()
            .and_then(MaterialRevision::latest_revision)
            .map(String::from)
    }

    pub fn build_cause_message(&self) -> String {
        match self.first_modified() {
            Some(revision) if revision.material().is_some_and(Material::is_dependency) => {
                format!(
                    "triggered by {}",
                    revision.latest_revision().unwrap_or_default()
                )
            }
            Some(revision) => format!("modified by {}", revision.build_caused_by()),
            None => "No modifications".to_string(),
        }
    }

    pub fn build_caused_by(&self) -> String {
        self.first_modified()
            .map(MaterialRevision::build_caused_by)
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn contains_my_checkin(&self, matcher: &Matcher) -> bool {
        self.revisions.iter().any(|r| r.contains_my_checkin(matcher))
    }

    /// Lower-cased material name to head revision, or upstream label for
    /// dependency materials. Unnamed materials are skipped.
    pub fn named_revisions(&self) -> BTreeMap<String, String> {
        self.revisions
            .iter()
            .filter_map(|r| {
                let name = r.material()?.name()?.to_lowercase();
                let value = r.latest_label()?.to_string();
                Some((name, value))
            })
            .collect()
    }

    pub fn find_dependency_material_revision(&self, pipeline: &str) -> Option<&MaterialRevision> {
        self.revisions.iter().find(|r| {
            r.material()
                .and_then(Material::upstream_pipeline)
                .is_some_and(|upstream| upstream.eq_ignore_ascii_case(pipeline))
        })
    }

    pub fn populate_environment_variables(&self, context: &mut EnvironmentVariableContext) {
        for revision in &self.revisions {
            revision.populate_environment_variables(context);
        }
    }
}

impl<'a> IntoIterator for &'a MaterialRevisionSet {
    type Item = &'a MaterialRevision;
    type IntoIter = std::slice::Iter<'a, MaterialRevision>;

    fn into_iter(self) -> Self::IntoIter {
        self.revisions.iter()
    }
}
