//! Risk table and findings.
//!
//! Every dictionary the reader finishes is checked against a [`RiskTable`].
//! A rule matches either an exact `(key, name value)` pair or any value of a
//! key (wildcard). Each match records a [`RiskFinding`] carrying the values of
//! the rule's detail keys, taken from the same dictionary.

use crate::model::objects::{ObjectKey, PdfDict, PdfValue};
use indexmap::IndexMap;
use std::fmt;

/// One rule: which pair triggers it, how the finding is named, and which
/// companion keys hold the interesting detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskRule {
    pub key: String,
    /// `None` matches any value of `key`.
    pub value: Option<String>,
    pub category: String,
    pub detail_keys: Vec<String>,
}

impl RiskRule {
    /// Exact rule; the category is the matched value.
    pub fn exact(key: &str, value: &str, detail_keys: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            value: Some(value.to_string()),
            category: value.to_string(),
            detail_keys: detail_keys.iter().map(|k| (*k).to_string()).collect(),
        }
    }

    /// Wildcard rule; the category is the key itself and the detail is the
    /// key's own value.
    pub fn any_value(key: &str) -> Self {
        Self {
            key: key.to_string(),
            value: None,
            category: key.to_string(),
            detail_keys: vec![key.to_string()],
        }
    }
}

/// Lookup table keyed by `(key, value)`; wildcard rules use an empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskTable {
    rules: IndexMap<(String, String), RiskRule>,
}

impl RiskTable {
    /// Empty table; nothing matches.
    pub fn empty() -> Self {
        Self {
            rules: IndexMap::new(),
        }
    }

    /// Add or replace a rule.
    pub fn insert(&mut self, rule: RiskRule) {
        let slot = (rule.key.clone(), rule.value.clone().unwrap_or_default());
        self.rules.insert(slot, rule);
    }

    pub fn with_rule(mut self, rule: RiskRule) -> Self {
        self.insert(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> impl Iterator<Item = &RiskRule> {
        self.rules.values()
    }

    /// Rules matching one dictionary entry: the exact rule first, then the
    /// wildcard rule for the key.
    pub fn matches<'t>(&'t self, key: &str, value: &PdfValue) -> Vec<&'t RiskRule> {
        let mut found = Vec::new();
        if let PdfValue::Name(name) = value
            && !name.is_empty()
            && let Some(rule) = self.rules.get(&(key.to_string(), name.clone()))
        {
            found.push(rule);
        }
        if let Some(rule) = self.rules.get(&(key.to_string(), String::new())) {
            found.push(rule);
        }
        found
    }

    /// Check every entry of `dict` and return the findings, attributed to
    /// `key` at `location`.
    pub fn check_dictionary(
        &self,
        dict: &PdfDict,
        key: ObjectKey,
        location: Location,
    ) -> Vec<RiskFinding> {
        let mut findings = Vec::new();
        for (name, value) in dict {
            for rule in self.matches(name, value) {
                findings.push(RiskFinding {
                    key,
                    location,
                    category: rule.category.clone(),
                    detail: detail_text(dict, &rule.detail_keys),
                });
            }
        }
        findings
    }
}

impl Default for RiskTable {
    fn default() -> Self {
        Self::empty()
            .with_rule(RiskRule::exact("S", "GoTo", &["D"]))
            .with_rule(RiskRule::exact("S", "GoToR", &["F"]))
            .with_rule(RiskRule::exact("S", "GoToE", &["F"]))
            .with_rule(RiskRule::exact("S", "Launch", &["F", "Win", "Mac", "Unix"]))
            .with_rule(RiskRule::exact("S", "URI", &["URI"]))
            .with_rule(RiskRule::exact("S", "SubmitForm", &["F"]))
            .with_rule(RiskRule::exact("S", "ImportData", &["F"]))
            .with_rule(RiskRule::exact("S", "JavaScript", &["JS"]))
            .with_rule(RiskRule::any_value("OpenAction"))
            .with_rule(RiskRule::any_value("AA"))
            .with_rule(RiskRule::exact("Type", "EmbeddedFile", &["Subtype"]))
    }
}

/// Values of the detail keys present in `dict`, space separated.
fn detail_text(dict: &PdfDict, detail_keys: &[String]) -> String {
    detail_keys
        .iter()
        .filter_map(|k| dict.get(k))
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Where the object holding a finding lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Byte offset of `n g obj` in the file.
    Offset(usize),
    /// Embedded in the object stream with this key.
    ObjStm(ObjectKey),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offset(off) => write!(f, "at: {off:#x}"),
            Self::ObjStm(container) => write!(f, "in: objstm {container}"),
        }
    }
}

/// A risky key/value pair found in a dictionary. Not deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskFinding {
    pub key: ObjectKey,
    pub location: Location,
    pub category: String,
    pub detail: String,
}

impl fmt::Display for RiskFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{} in object {} ({}): {}",
            self.category, self.key, self.location, self.detail
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> PdfValue {
        PdfValue::Name(s.to_string())
    }

    #[test]
    fn exact_rule_reports_detail_key() {
        let mut dict = PdfDict::new();
        dict.insert("S".into(), name("URI"));
        dict.insert("URI".into(), PdfValue::String(b"http://x.test".to_vec()));
        let findings =
            RiskTable::default().check_dictionary(&dict, ObjectKey::new(3, 0), Location::Offset(0x1f));
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].to_string(),
            "/URI in object 3 0 (at: 0x1f): http://x.test"
        );
    }

    #[test]
    fn wildcard_rule_uses_key_as_category() {
        let mut dict = PdfDict::new();
        dict.insert("OpenAction".into(), PdfValue::Ref(ObjectKey::new(7, 0)));
        let findings = RiskTable::default().check_dictionary(
            &dict,
            ObjectKey::new(1, 0),
            Location::ObjStm(ObjectKey::new(9, 0)),
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].to_string(),
            "/OpenAction in object 1 0 (in: objstm 9 0): 7 0 R"
        );
    }

    #[test]
    fn launch_joins_all_present_detail_keys() {
        let mut dict = PdfDict::new();
        dict.insert("S".into(), name("Launch"));
        dict.insert("F".into(), PdfValue::String(b"calc.exe".to_vec()));
        dict.insert("Unix".into(), PdfValue::String(b"/bin/sh".to_vec()));
        let findings =
            RiskTable::default().check_dictionary(&dict, ObjectKey::new(2, 0), Location::Offset(9));
        assert_eq!(findings[0].category, "Launch");
        assert_eq!(findings[0].detail, "calc.exe /bin/sh");
    }

    #[test]
    fn non_matching_values_are_ignored() {
        let mut dict = PdfDict::new();
        dict.insert("S".into(), name("Named"));
        dict.insert("Type".into(), name("Page"));
        let findings =
            RiskTable::default().check_dictionary(&dict, ObjectKey::new(2, 0), Location::Offset(9));
        assert!(findings.is_empty());
    }

    #[test]
    fn empty_table_matches_nothing() {
        let mut dict = PdfDict::new();
        dict.insert("AA".into(), PdfValue::Dict(PdfDict::new()));
        let table = RiskTable::empty();
        assert!(table.is_empty());
        assert!(
            table
                .check_dictionary(&dict, ObjectKey::new(1, 0), Location::Offset(0))
                .is_empty()
        );
    }
}
