//! Explicit environment-variable state threaded through setup steps.
//!
//! `EnvironmentState` replaces ambient process-environment mutation: every step
//! receives the state, mutates it, and hands it on. Only the outer boundary
//! (export script, `exec` child) turns it back into a real environment.

use std::collections::BTreeMap;

use serde::Serialize;

/// Separator for PATH-like variables.
pub const PATH_SEPARATOR: char = ':';

/// Mapping from variable name to value with PATH-aware helpers.
///
/// All operations are total: none of them can fail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EnvironmentState {
    vars: BTreeMap<String, String>,
}

impl EnvironmentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from arbitrary name/value pairs. Later pairs win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Unconditionally overwrite `name`. Returns true if the stored value changed.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let value = value.into();
        match self.vars.insert(name.into(), value.clone()) {
            Some(previous) => previous != value,
            None => true,
        }
    }

    /// Remove `name` entirely. Returns true if it was present.
    pub fn unset(&mut self, name: &str) -> bool {
        self.vars.remove(name).is_some()
    }

    /// Insert `segment` at the front of the PATH-like list under `name`, unless
    /// an equal segment is already present anywhere in the list.
    ///
    /// Segments are compared whole, never by substring, so `/opt/pkg` is not
    /// considered present in `/opt/pkgmgr/bin`. Returns true if the value changed.
    pub fn prepend_path(&mut self, name: &str, segment: &str) -> bool {
        if segment.is_empty() || self.contains_segment(name, segment) {
            return false;
        }
        let value = match self.get(name) {
            Some(existing) if !existing.is_empty() => {
                format!("{segment}{PATH_SEPARATOR}{existing}")
            }
            _ => segment.to_string(),
        };
        self.vars.insert(name.to_string(), value);
        true
    }

    /// Drop every entry equal to `segment` from the PATH-like list under `name`.
    /// The variable is removed when no entries remain. Returns true if the
    /// value changed.
    pub fn remove_segment(&mut self, name: &str, segment: &str) -> bool {
        if !self.contains_segment(name, segment) {
            return false;
        }
        let wanted = normalize_segment(segment);
        let kept: Vec<&str> = self
            .segments(name)
            .into_iter()
            .filter(|existing| normalize_segment(existing) != wanted)
            .collect();
        if kept.is_empty() {
            self.vars.remove(name);
        } else {
            let joined = kept.join(&PATH_SEPARATOR.to_string());
            self.vars.insert(name.to_string(), joined);
        }
        true
    }

    /// True if the PATH-like list under `name` holds `segment` as a whole entry.
    pub fn contains_segment(&self, name: &str, segment: &str) -> bool {
        let wanted = normalize_segment(segment);
        self.segments(name)
            .into_iter()
            .any(|existing| normalize_segment(existing) == wanted)
    }

    /// Non-empty entries of the PATH-like list under `name`, in order.
    pub fn segments(&self, name: &str) -> Vec<&str> {
        self.get(name)
            .map(|value| {
                value
                    .split(PATH_SEPARATOR)
                    .filter(|segment| !segment.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvironmentState {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

/// Trailing slashes do not make a different directory (`/opt/bin/` == `/opt/bin`).
fn normalize_segment(segment: &str) -> &str {
    let trimmed = segment.trim_end_matches('/');
    if trimmed.is_empty() { segment } else { trimmed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(pairs: &[(&str, &str)]) -> EnvironmentState {
        pairs.iter().copied().collect()
    }

    #[test]
    fn prepend_is_idempotent() {
        let mut once = state(&[("PATH", "/usr/bin:/bin")]);
        once.prepend_path("PATH", "/opt/pkgmgr/bin");

        let mut twice = once.clone();
        assert!(!twice.prepend_path("PATH", "/opt/pkgmgr/bin"));
        assert_eq!(once, twice);
        assert_eq!(once.get("PATH"), Some("/opt/pkgmgr/bin:/usr/bin:/bin"));
    }

    #[test]
    fn prepend_skips_segment_present_later_in_list() {
        let mut env = state(&[("PATH", "/usr/bin:/opt/pkgmgr/bin")]);
        assert!(!env.prepend_path("PATH", "/opt/pkgmgr/bin"));
        assert_eq!(env.get("PATH"), Some("/usr/bin:/opt/pkgmgr/bin"));
    }

    #[test]
    fn prepend_uses_whole_segment_comparison() {
        let mut env = state(&[("PATH", "/opt/pkgmgr/bin:/usr/bin")]);
        assert!(!env.contains_segment("PATH", "/opt/pkg"));
        assert!(env.prepend_path("PATH", "/opt/pkg"));
        assert_eq!(env.get("PATH"), Some("/opt/pkg:/opt/pkgmgr/bin:/usr/bin"));
    }

    #[test]
    fn prepend_ignores_trailing_slash_differences() {
        let mut env = state(&[("PATH", "/opt/pkgmgr/bin/:/usr/bin")]);
        assert!(!env.prepend_path("PATH", "/opt/pkgmgr/bin"));
    }

    #[test]
    fn prepend_to_missing_or_empty_variable_sets_segment_only() {
        let mut env = state(&[("PYTHONPATH", "")]);
        assert!(env.prepend_path("PYTHONPATH", "/install/python"));
        assert_eq!(env.get("PYTHONPATH"), Some("/install/python"));

        assert!(env.prepend_path("CPLUS_INCLUDE_PATH", "/install/include"));
        assert_eq!(env.get("CPLUS_INCLUDE_PATH"), Some("/install/include"));
    }

    #[test]
    fn empty_segment_is_a_no_op() {
        let mut env = state(&[("PATH", "/usr/bin")]);
        assert!(!env.prepend_path("PATH", ""));
        assert_eq!(env.get("PATH"), Some("/usr/bin"));
    }

    #[test]
    fn remove_segment_drops_all_matches() {
        let mut env = state(&[("PATH", "/old/.venv/bin:/usr/bin:/old/.venv/bin/")]);
        assert!(env.remove_segment("PATH", "/old/.venv/bin"));
        assert_eq!(env.get("PATH"), Some("/usr/bin"));
        assert!(!env.remove_segment("PATH", "/old/.venv/bin"));

        assert!(env.remove_segment("PATH", "/usr/bin"));
        assert!(!env.contains("PATH"));
    }

    #[test]
    fn set_and_unset_report_changes() {
        let mut env = EnvironmentState::new();
        assert!(env.set("VIRTUAL_ENV", "/p/.venv"));
        assert!(!env.set("VIRTUAL_ENV", "/p/.venv"));
        assert!(env.unset("VIRTUAL_ENV"));
        assert!(!env.unset("VIRTUAL_ENV"));
        assert!(env.is_empty());
    }

    #[test]
    fn segments_skip_empty_entries() {
        let env = state(&[("PATH", "/a::/b:")]);
        assert_eq!(env.segments("PATH"), vec!["/a", "/b"]);
        assert!(env.segments("MISSING").is_empty());
    }
}
