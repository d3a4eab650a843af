//! Country and state to language mapping.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::Entry;

/// One mapping rule, as found in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageRule {
    /// Country code, e.g. `CH`
    pub country: String,
    /// State name; empty for a country wide rule
    #[serde(default)]
    pub state: String,
    /// Language code, e.g. `fr`
    pub language: String,
}

/// Maps entries to a language code.
#[derive(Debug, Clone, Default)]
pub struct LanguageMap {
    map: AHashMap<String, String>,
}

impl LanguageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map with the built-in rules.
    pub fn with_defaults() -> Self {
        let mut map = Self::new();
        for (country, state, language) in [
            ("AT", "", "de"),
            ("AU", "", "en"),
            ("CA", "", "en"),
            ("CA", "Quebec", "fr"),
            ("CH", "", "de"),
            ("CH", "Valais", "fr"),
            ("CH", "Vaud", "fr"),
            ("CH", "Neuchâtel", "fr"),
            ("CH", "Geneve", "fr"),
            ("CH", "Genève", "fr"),
            ("CH", "Ticino", "it"),
            ("UK", "", "en"),
            ("US", "", "en"),
        ] {
            map.define(country, state, language);
        }
        map
    }

    fn key(country: &str, state: &str) -> String {
        if state.is_empty() {
            country.to_string()
        } else {
            format!("{}-{}", country, state)
        }
    }

    /// Add or replace a rule. An empty state applies to the whole country.
    pub fn define(&mut self, country: &str, state: &str, language: &str) {
        self.map
            .insert(Self::key(country, state), language.to_string());
    }

    pub fn apply(&mut self, rules: &[LanguageRule]) {
        for rule in rules {
            self.define(&rule.country, &rule.state, &rule.language);
        }
    }

    /// Language for a country and state.
    ///
    /// Tries the state rule, then the country rule, and falls back to the
    /// lowercase country code.
    pub fn lookup(&self, country: &str, state: &str) -> String {
        let state_rule = if state.is_empty() {
            None
        } else {
            self.map.get(&Self::key(country, state))
        };
        state_rule
            .or_else(|| self.map.get(country))
            .cloned()
            .unwrap_or_else(|| country.to_lowercase())
    }

    pub fn language_for(&self, entry: &Entry) -> String {
        self.lookup(&entry.country_code, &entry.state)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let map = LanguageMap::with_defaults();
        assert_eq!(map.lookup("CH", "Genève"), "fr");
        assert_eq!(map.lookup("CH", "Ticino"), "it");
        assert_eq!(map.lookup("CH", "Zurich"), "de");
        assert_eq!(map.lookup("CA", "Quebec"), "fr");
        assert_eq!(map.lookup("AT", ""), "de");
    }

    #[test]
    fn test_fallback_to_country_code() {
        let map = LanguageMap::with_defaults();
        assert_eq!(map.lookup("DE", "Berlin"), "de");
        assert_eq!(map.lookup("FR", ""), "fr");
    }

    #[test]
    fn test_configured_rules_override() {
        let mut map = LanguageMap::with_defaults();
        map.apply(&[LanguageRule {
            country: "BE".to_string(),
            state: "Wallonia".to_string(),
            language: "fr".to_string(),
        }]);
        map.define("AT", "", "de-AT");

        let entry = Entry {
            country_code: "BE".to_string(),
            state: "Wallonia".to_string(),
            ..Default::default()
        };
        assert_eq!(map.language_for(&entry), "fr");
        assert_eq!(map.lookup("AT", "Tyrol"), "de-AT");
    }
}
