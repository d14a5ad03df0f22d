//! Project label to billing code (DL number) resolution.
//!
//! The mapping document is JSON with two objects keyed by project-label fragments:
//!
//! ```json
//! {
//!   "dl_number_mapping":    { "Intern": "DL10001", "Kunde A": "DL20001" },
//!   "second_field_mapping": { "Intern": "Admin",   "Kunde A": "Support" }
//! }
//! ```
//!
//! Keys match as case-insensitive substrings of a project label, tried in declaration order.

use crate::error::{Error, Result};
use log::warn;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Billing code used when nothing has matched yet in this run.
pub const DEFAULT_DL_NUMBER: &str = "DL20517";
/// Secondary field used when nothing has matched yet in this run.
pub const DEFAULT_SECOND_FIELD: &str = "MAPPING nicht im JSON File";
/// Replaces the title of any entry whose project has no mapping.
pub const UNMAPPED_TITLE: &str = "KEIN DL BELEG für den angegebenen Titel gefunden";

#[derive(Deserialize)]
struct MappingDocument {
    #[serde(rename = "dl_number_mapping", alias = "dlNumberMapping")]
    dl_number: Map<String, Value>,
    #[serde(rename = "second_field_mapping", alias = "secondFieldMapping")]
    second_field: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingRule {
    pub label: String,
    pub dl_number: String,
    pub second_field: String,
}

/// Ordered, read-only mapping rules for one run.
#[derive(Clone, Debug, Default)]
pub struct MappingTable {
    rules: Vec<MappingRule>,
}

/// Last successful resolution; carried across records and files within a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolverState {
    pub previous_dl_number: Option<String>,
    pub previous_second_field: Option<String>,
}

/// Outcome of resolving one project label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub dl_number: String,
    pub second_field: String,
    pub title: String,
    /// Matched key, or `None` when the fallback was used.
    pub matched: Option<String>,
}

impl Resolution {
    pub fn is_fallback(&self) -> bool {
        self.matched.is_none()
    }
}

fn string_value(map: &str, label: &str, v: &Value) -> Result<String> {
    v.as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::Mapping(format!("{}: value for {:?} is not a string", map, label)))
}

impl MappingTable {
    /// Reads and validates the mapping document at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Mapping(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Parses a mapping document. Every DL label needs a secondary field.
    pub fn from_json(content: &str) -> Result<Self> {
        let doc: MappingDocument = serde_json::from_str(content)?;
        let mut rules = Vec::with_capacity(doc.dl_number.len());
        for (label, dl) in &doc.dl_number {
            let second = doc.second_field.get(label).ok_or_else(|| {
                Error::Mapping(format!(
                    "second_field_mapping has no entry for label {:?}",
                    label
                ))
            })?;
            rules.push(MappingRule {
                label: label.clone(),
                dl_number: string_value("dl_number_mapping", label, dl)?,
                second_field: string_value("second_field_mapping", label, second)?,
            });
        }
        Ok(MappingTable { rules })
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule (declaration order) whose label occurs in `project`, ignoring case.
    pub fn find(&self, project: &str) -> Option<&MappingRule> {
        let project = project.to_lowercase();
        self.rules
            .iter()
            .find(|r| project.contains(&r.label.to_lowercase()))
    }

    /// Resolves `project` and updates `state` on a match. Without a match, returns the previous
    /// successful values (or the defaults before any match) with [`UNMAPPED_TITLE`]; `state` is untouched.
    pub fn resolve(&self, state: &mut ResolverState, project: &str, title: &str) -> Resolution {
        match self.find(project) {
            Some(rule) => {
                state.previous_dl_number = Some(rule.dl_number.clone());
                state.previous_second_field = Some(rule.second_field.clone());
                Resolution {
                    dl_number: rule.dl_number.clone(),
                    second_field: rule.second_field.clone(),
                    title: title.to_string(),
                    matched: Some(rule.label.clone()),
                }
            }
            None => {
                warn!("no mapping for project {:?}, reusing previous values", project);
                Resolution {
                    dl_number: state
                        .previous_dl_number
                        .clone()
                        .unwrap_or_else(|| DEFAULT_DL_NUMBER.to_string()),
                    second_field: state
                        .previous_second_field
                        .clone()
                        .unwrap_or_else(|| DEFAULT_SECOND_FIELD.to_string()),
                    title: UNMAPPED_TITLE.to_string(),
                    matched: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "dl_number_mapping": { "Kunde": "DL100", "Kunde Alpha": "DL200", "Intern": "DL300" },
        "second_field_mapping": { "Kunde": "Beratung", "Kunde Alpha": "Support", "Intern": "Admin" }
    }"#;

    #[test]
    fn test_from_json_preserves_declaration_order() {
        let table = MappingTable::from_json(DOC).unwrap();
        let labels: Vec<&str> = table.rules().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Kunde", "Kunde Alpha", "Intern"]);
    }

    #[test]
    fn test_from_json_accepts_camel_case_keys() {
        let doc = r#"{ "dlNumberMapping": {"A": "DL1"}, "secondFieldMapping": {"A": "X"} }"#;
        let table = MappingTable::from_json(doc).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_from_json_missing_second_field() {
        let doc = r#"{ "dl_number_mapping": {"A": "DL1"}, "second_field_mapping": {} }"#;
        let err = MappingTable::from_json(doc).unwrap_err();
        assert!(err.to_string().contains("\"A\""));
    }

    #[test]
    fn test_from_json_rejects_non_string_and_malformed() {
        let doc = r#"{ "dl_number_mapping": {"A": 5}, "second_field_mapping": {"A": "X"} }"#;
        assert!(matches!(MappingTable::from_json(doc), Err(Error::Mapping(_))));
        assert!(matches!(MappingTable::from_json("{"), Err(Error::Mapping(_))));
        assert!(matches!(MappingTable::from_json("{}"), Err(Error::Mapping(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = MappingTable::load(&dir.path().join("mappings.json"));
        assert!(matches!(result, Err(Error::Mapping(_))));
    }

    #[test]
    fn test_earlier_key_wins_when_both_match() {
        let table = MappingTable::from_json(DOC).unwrap();
        let mut state = ResolverState::default();
        let r = table.resolve(&mut state, "Projekt KUNDE ALPHA 2025", "Workshop");
        assert_eq!(r.matched.as_deref(), Some("Kunde"));
        assert_eq!(r.dl_number, "DL100");
        assert_eq!(r.title, "Workshop");
    }

    #[test]
    fn test_fallback_before_any_match_uses_defaults() {
        let table = MappingTable::from_json(DOC).unwrap();
        let mut state = ResolverState::default();
        let r = table.resolve(&mut state, "Something else", "Call");
        assert!(r.is_fallback());
        assert_eq!(r.dl_number, DEFAULT_DL_NUMBER);
        assert_eq!(r.second_field, DEFAULT_SECOND_FIELD);
        assert_eq!(r.title, UNMAPPED_TITLE);
        assert_eq!(state, ResolverState::default());
    }

    #[test]
    fn test_fallback_after_match_reuses_previous() {
        let table = MappingTable::from_json(DOC).unwrap();
        let mut state = ResolverState::default();
        table.resolve(&mut state, "intern meeting", "Standup");
        let r = table.resolve(&mut state, "Unknown", "Call");
        assert_eq!(r.dl_number, "DL300");
        assert_eq!(r.second_field, "Admin");
        assert_eq!(r.title, UNMAPPED_TITLE);
    }

    #[test]
    fn test_fallback_tracks_most_recent_match() {
        let table = MappingTable::from_json(DOC).unwrap();
        let mut state = ResolverState::default();
        table.resolve(&mut state, "Intern", "a");
        table.resolve(&mut state, "Kunde Beta", "b");
        let r = table.resolve(&mut state, "nothing", "c");
        assert_eq!(r.dl_number, "DL100");
        assert_eq!(r.second_field, "Beratung");
    }
}
