//! Trigger sets and round-state matching.

use serde::{Deserialize, Serialize};

/// Trigger token that matches any round type or terror name.
pub const WILDCARD_TRIGGER: &str = "*";

/// Round facts delivered by the round-state tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundFacts {
    /// Round-type name, e.g. `Classic`.
    pub round_type: String,

    /// Composite terror key; multiple names joined with `&`, `,` or `;`.
    pub terror_key: Option<String>,
}

/// An ordered, deduplicated, case-insensitive set of trigger names.
#[derive(Debug, Clone, Default)]
pub struct TriggerSet {
    entries: Vec<String>,
    has_wildcard: bool,
}

impl TriggerSet {
    /// Build a trigger set from configured names.
    ///
    /// Entries are trimmed, empty entries dropped and case-insensitive
    /// duplicates removed while preserving first-seen order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<String> = Vec::new();
        let mut has_wildcard = false;

        for name in names {
            let trimmed = name.as_ref().trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed == WILDCARD_TRIGGER {
                has_wildcard = true;
                continue;
            }
            if !entries.iter().any(|e| e.eq_ignore_ascii_case(trimmed)) {
                entries.push(trimmed.to_string());
            }
        }

        Self {
            entries,
            has_wildcard,
        }
    }

    /// Returns true if neither a name nor the wildcard is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && !self.has_wildcard
    }

    /// Case-insensitive whole-name match, with wildcard dominance.
    pub fn matches(&self, name: &str) -> bool {
        if self.has_wildcard {
            return true;
        }
        let name = name.trim();
        self.entries.iter().any(|e| e.eq_ignore_ascii_case(name))
    }

    /// Match a composite terror key: the key is split into independent
    /// names first, and any of them matching counts as a match.
    ///
    /// Returns the first matching name so the caller can describe what
    /// started the recording.
    pub fn match_terror_key(&self, key: &str) -> Option<String> {
        for name in split_terror_key(key) {
            if self.matches(&name) {
                return Some(name);
            }
        }
        None
    }
}

/// Split a composite terror key on `&`, `,` and `;` into trimmed names.
pub fn split_terror_key(key: &str) -> Vec<String> {
    key.split(['&', ',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_dominance() {
        let set = TriggerSet::new(["Classic", "*"]);
        assert!(set.matches("Classic"));
        assert!(set.matches("Bloodbath"));
        assert!(set.matches("anything at all"));
    }

    #[test]
    fn test_exact_case_insensitive_match() {
        let set = TriggerSet::new(["Classic"]);
        assert!(set.matches("classic"));
        assert!(set.matches("CLASSIC"));
        assert!(!set.matches("Classic2"));
        assert!(!set.matches("Class"));
    }

    #[test]
    fn test_dedup_preserves_order() {
        let set = TriggerSet::new(["Alpha", "beta", "ALPHA", "Gamma", "Beta"]);
        assert_eq!(set.entries, vec!["Alpha", "beta", "Gamma"]);
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let set = TriggerSet::new(Vec::<String>::new());
        assert!(set.is_empty());
        assert!(!set.matches("Classic"));
    }

    #[test]
    fn test_split_terror_key() {
        assert_eq!(split_terror_key("A & B, C"), vec!["A", "B", "C"]);
        assert_eq!(split_terror_key("Solo"), vec!["Solo"]);
        assert_eq!(split_terror_key(" ; , "), Vec::<String>::new());
    }

    #[test]
    fn test_match_terror_key_returns_matching_name() {
        let set = TriggerSet::new(["Huggy"]);
        assert_eq!(
            set.match_terror_key("Apocalypse Bird & huggy"),
            Some("huggy".to_string())
        );
        assert_eq!(set.match_terror_key("Apocalypse Bird"), None);
    }
}
