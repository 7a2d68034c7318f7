//! The rule table and the row format it is compiled from.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::LoadError;
use crate::rule::Rule;

/// One row of a rule table, as authored.
///
/// `Criteria` and `Remember` hold one code per line. A missing `Cooldown`
/// makes the rule one-shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleRow {
    pub id: i64,
    pub concept: String,
    pub who: String,
    pub response: String,
    #[serde(default)]
    pub criteria: String,
    #[serde(default)]
    pub remember: String,
    #[serde(default)]
    pub cooldown: Option<f64>,
}

impl RuleRow {
    pub fn new(
        id: i64,
        concept: impl Into<String>,
        who: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            id,
            concept: concept.into(),
            who: who.into(),
            response: response.into(),
            criteria: String::new(),
            remember: String::new(),
            cooldown: None,
        }
    }

    pub fn with_criteria(mut self, codes: &[&str]) -> Self {
        self.criteria = codes.join("\n");
        self
    }

    pub fn with_remember(mut self, codes: &[&str]) -> Self {
        self.remember = codes.join("\n");
        self
    }

    pub fn with_cooldown(mut self, seconds: f64) -> Self {
        self.cooldown = Some(seconds);
        self
    }
}

#[derive(Deserialize)]
struct TomlRuleFile {
    #[serde(default, rename = "rule")]
    rules: Vec<RuleRow>,
}

/// Parse rows from a TOML document of `[[rule]]` tables.
pub fn rows_from_toml(src: &str) -> Result<Vec<RuleRow>, LoadError> {
    let file: TomlRuleFile = toml::from_str(src)?;
    Ok(file.rules)
}

/// Parse rows from a JSON array of row objects.
pub fn rows_from_json(src: &str) -> Result<Vec<RuleRow>, LoadError> {
    Ok(serde_json::from_str(src)?)
}

/// Read rows from a `.toml` or `.json` file.
pub fn load_rows(path: impl AsRef<Path>) -> Result<Vec<RuleRow>, LoadError> {
    let path = path.as_ref();
    let src = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => rows_from_toml(&src),
        Some("json") => rows_from_json(&src),
        other => Err(LoadError::UnsupportedFormat(
            other.unwrap_or_default().to_string(),
        )),
    }
}

/// Key of a rule bucket: `(concept, who)`.
pub type RuleKey = (String, String);

/// Compiled rules grouped by `(concept, who)`.
///
/// Each bucket is kept in descending order of specificity. Fired one-shot
/// rules are moved out of their bucket into the archive.
#[derive(Debug, Default)]
pub struct RuleTable {
    buckets: HashMap<RuleKey, Vec<Rule>>,
    archived: Vec<Rule>,
}

impl RuleTable {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from rules, grouping and sorting them.
    pub fn from_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        let mut table = Self::new();
        for rule in rules {
            table.push(rule);
        }
        table.sort_buckets();
        table
    }

    /// Append a rule to its bucket without re-sorting.
    pub(crate) fn push(&mut self, rule: Rule) {
        let key = (rule.concept().to_string(), rule.who().to_string());
        self.buckets.entry(key).or_default().push(rule);
    }

    /// Sort every bucket by descending predicate count.
    pub(crate) fn sort_buckets(&mut self) {
        for bucket in self.buckets.values_mut() {
            bucket.sort_by(|a, b| b.num_criteria().cmp(&a.num_criteria()));
        }
    }

    /// Add a single rule, keeping its bucket sorted.
    pub fn insert(&mut self, rule: Rule) {
        let key = (rule.concept().to_string(), rule.who().to_string());
        let bucket = self.buckets.entry(key).or_default();
        let at = bucket.partition_point(|r| r.num_criteria() >= rule.num_criteria());
        bucket.insert(at, rule);
    }

    /// Active rules for a key, most specific first. Empty if the key is unknown.
    pub fn bucket(&self, concept: &str, who: &str) -> &[Rule] {
        self.buckets
            .get(&(concept.to_string(), who.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn bucket_mut(&mut self, concept: &str, who: &str) -> Option<&mut Vec<Rule>> {
        self.buckets.get_mut(&(concept.to_string(), who.to_string()))
    }

    /// Move a rule out of its bucket into the archive.
    pub(crate) fn retire(&mut self, concept: &str, who: &str, index: usize) -> Option<&Rule> {
        let bucket = self.bucket_mut(concept, who)?;
        if index >= bucket.len() {
            return None;
        }
        let rule = bucket.remove(index);
        self.archived.push(rule);
        self.archived.last()
    }

    /// One-shot rules that have fired, in firing order.
    pub fn archived(&self) -> &[Rule] {
        &self.archived
    }

    /// Find an active rule by id.
    pub fn get(&self, id: i64) -> Option<&Rule> {
        self.buckets.values().flatten().find(|rule| rule.id() == id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &RuleKey> {
        self.buckets.keys()
    }

    /// Number of active rules.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Predicate;
    use npc_state::StateSource;

    fn rule_with(id: i64, criteria: usize) -> Rule {
        (0..criteria).fold(Rule::new(id, "SeeObject", "Player", "..."), |rule, i| {
            rule.with_predicate(Predicate::equal(format!("k{i}"), StateSource::Event, true))
        })
    }

    #[test]
    fn test_buckets_sorted_by_specificity() {
        let table = RuleTable::from_rules(vec![
            rule_with(1, 1),
            rule_with(2, 3),
            rule_with(3, 2),
            rule_with(4, 3),
        ]);

        let counts: Vec<_> = table
            .bucket("SeeObject", "Player")
            .iter()
            .map(Rule::num_criteria)
            .collect();
        assert_eq!(counts, vec![3, 3, 2, 1]);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut table = RuleTable::from_rules(vec![rule_with(1, 3), rule_with(2, 1)]);
        table.insert(rule_with(3, 2));

        let ids: Vec<_> = table
            .bucket("SeeObject", "Player")
            .iter()
            .map(Rule::id)
            .collect();
        assert_eq!(ids, vec![1, 3, 2]);
    }

    #[test]
    fn test_unknown_bucket_is_empty() {
        let table = RuleTable::new();
        assert!(table.bucket("Hurt", "Guard").is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn test_retire_moves_to_archive() {
        let mut table = RuleTable::from_rules(vec![rule_with(1, 2), rule_with(2, 1)]);

        let retired = table.retire("SeeObject", "Player", 0).map(Rule::id);
        assert_eq!(retired, Some(1));
        assert_eq!(table.bucket("SeeObject", "Player").len(), 1);
        assert_eq!(table.archived().len(), 1);
        assert!(table.get(1).is_none());
        assert!(table.get(2).is_some());

        assert!(table.retire("SeeObject", "Player", 5).is_none());
    }

    #[test]
    fn test_rows_from_toml() {
        let src = r#"
            [[rule]]
            Id = 1
            Concept = "SeeObject"
            Who = "Player"
            Response = "Oh look! A barrel!"
            Criteria = """
            e TargetName = Barrel
            m SeenBarrels = 0
            """
            Remember = "m SeenBarrels + 1"

            [[rule]]
            Id = 2
            Concept = "SeeObject"
            Who = "Player"
            Response = "A thing."
            Cooldown = 5.0
        "#;

        let rows = rows_from_toml(src).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].criteria.lines().filter(|l| !l.trim().is_empty()).count(), 2);
        assert_eq!(rows[0].cooldown, None);
        assert_eq!(rows[1].criteria, "");
        assert_eq!(rows[1].cooldown, Some(5.0));
    }

    #[test]
    fn test_rows_from_json() {
        let src = r#"[
            {
                "Id": 7,
                "Concept": "Hurt",
                "Who": "Guard",
                "Response": "Ow!",
                "Criteria": "w Alarm = false",
                "Remember": "w Alarm = true",
                "Cooldown": 2.5
            }
        ]"#;

        let rows = rows_from_json(src).unwrap();
        assert_eq!(
            rows[0],
            RuleRow::new(7, "Hurt", "Guard", "Ow!")
                .with_criteria(&["w Alarm = false"])
                .with_remember(&["w Alarm = true"])
                .with_cooldown(2.5)
        );
    }

    #[test]
    fn test_bad_sources_are_load_errors() {
        assert!(matches!(rows_from_json("{"), Err(LoadError::Json(_))));
        assert!(matches!(rows_from_toml("[[rule]]\nId = \"x\""), Err(LoadError::Toml(_))));
        assert!(matches!(
            load_rows("/definitely/not/here.toml"),
            Err(LoadError::Io { .. })
        ));
    }
}
