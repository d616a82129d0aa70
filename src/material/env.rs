//! Environment variables handed to jobs.

use std::collections::BTreeMap;

/// Name/value pairs exported to a job's environment. Later writes win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentVariableContext {
    properties: BTreeMap<String, String>,
}

impl EnvironmentVariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// `_NAME` with non-alphanumerics replaced by `_`, or empty for an empty name.
pub(crate) fn env_suffix(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let escaped: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("_{escaped}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_escapes_and_uppercases() {
        assert_eq!(env_suffix("my-repo.v2"), "_MY_REPO_V2");
        assert_eq!(env_suffix(""), "");
    }

    #[test]
    fn test_last_write_wins() {
        let mut ctx = EnvironmentVariableContext::new();
        ctx.set_property("GO_REVISION", "a");
        ctx.set_property("GO_REVISION", "b");
        assert_eq!(ctx.property("GO_REVISION"), Some("b"));
        assert_eq!(ctx.len(), 1);
    }
}
