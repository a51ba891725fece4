use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::models::RiskLevel;
use crate::text::{format_thousands, normalize_query};

const BUILTIN_KNOWLEDGE: &str = include_str!("../data/knowledge.json");

#[derive(Debug, Clone)]
pub struct KnowledgeEntry {
    pub key: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub requires_any: Vec<String>,
    pub priority: i32,
    pub risk_level: Option<RiskLevel>,
    pub season: Option<String>,
    pub population_affected: Option<u64>,
    pub guidance: Option<String>,
    pub answer: String,
}

impl KnowledgeEntry {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.key.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn is_qualified(&self) -> bool {
        !self.requires_any.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct KnowledgeDocument {
    entries: Vec<EntryRecord>,
}

#[derive(Debug, Deserialize)]
struct EntryRecord {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    requires_any: Vec<String>,
    #[serde(default)]
    priority: i32,
    risk_level: Option<RiskLevel>,
    season: Option<String>,
    population_affected: Option<u64>,
    guidance: Option<String>,
    answer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegionRow {
    region: String,
    risk_level: String,
    flood_season_start: String,
    flood_season_end: String,
    population_affected: u64,
}

impl EntryRecord {
    fn into_entry(self) -> Result<KnowledgeEntry> {
        let key = normalize_query(&self.name);
        if key.is_empty() {
            anyhow::bail!("knowledge entry has an empty name");
        }

        let answer = match self.answer {
            Some(answer) if !answer.trim().is_empty() => answer,
            _ => compose_answer(
                &self.name,
                self.risk_level,
                self.season.as_deref(),
                self.population_affected,
                self.guidance.as_deref(),
            )
            .with_context(|| format!("knowledge entry '{}' has no answer", self.name))?,
        };

        Ok(KnowledgeEntry {
            key,
            name: self.name,
            aliases: normalize_terms(&self.aliases),
            requires_any: normalize_terms(&self.requires_any),
            priority: self.priority,
            risk_level: self.risk_level,
            season: self.season,
            population_affected: self.population_affected,
            guidance: self.guidance,
            answer,
        })
    }
}

impl RegionRow {
    fn into_entry(self) -> Result<KnowledgeEntry> {
        let risk_level = RiskLevel::parse(&self.risk_level).with_context(|| {
            format!(
                "region '{}' has unknown risk level '{}'",
                self.region, self.risk_level
            )
        })?;

        EntryRecord {
            name: self.region.trim().to_string(),
            aliases: vec![],
            requires_any: vec![],
            priority: 0,
            risk_level: Some(risk_level),
            season: Some(format!(
                "{} to {}",
                self.flood_season_start.trim(),
                self.flood_season_end.trim()
            )),
            population_affected: Some(self.population_affected),
            guidance: None,
            answer: None,
        }
        .into_entry()
    }
}

/// Region and topic answers, loaded once and shared read-only.
#[derive(Clone, Debug)]
pub struct KnowledgeStore {
    entries: Arc<Vec<KnowledgeEntry>>,
}

impl KnowledgeStore {
    pub async fn load(config: &AppConfig) -> Result<Self> {
        let mut store = match &config.knowledge_path {
            Some(path) => Self::from_json_file(path).await?,
            None => Self::builtin()?,
        };

        if let Some(csv_path) = &config.regions_csv {
            let content = tokio::fs::read_to_string(csv_path)
                .await
                .with_context(|| format!("failed to read region csv {}", csv_path.display()))?;
            store = store.with_regions_csv(&content)?;
        }

        tracing::info!("knowledge store loaded with {} entries", store.len());
        Ok(store)
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_KNOWLEDGE).context("embedded knowledge base is invalid")
    }

    pub async fn from_json_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read knowledge file {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("invalid knowledge file {}", path.display()))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let document: KnowledgeDocument =
            serde_json::from_str(content).context("failed to decode knowledge document")?;

        let entries = document
            .entries
            .into_iter()
            .map(EntryRecord::into_entry)
            .collect::<Result<Vec<_>>>()?;

        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<KnowledgeEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            for key in entry.keys() {
                if !seen.insert(key.to_string()) {
                    anyhow::bail!("duplicate knowledge key '{}' (entry '{}')", key, entry.name);
                }
            }
        }

        Ok(Self {
            entries: Arc::new(entries),
        })
    }

    /// Appends region rows (`region,risk_level,flood_season_start,flood_season_end,
    /// population_affected`). A row whose key already exists is rejected.
    pub fn with_regions_csv(self, content: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let mut entries: Vec<KnowledgeEntry> = self.entries.as_ref().clone();

        for (idx, row) in reader.deserialize::<RegionRow>().enumerate() {
            let row = row.with_context(|| format!("invalid region csv row {}", idx + 1))?;
            entries.push(row.into_entry()?);
        }

        Self::from_entries(entries)
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&KnowledgeEntry> {
        let key = normalize_query(key);
        self.entries.iter().find(|entry| entry.keys().any(|k| k == key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn compose_answer(
    name: &str,
    risk_level: Option<RiskLevel>,
    season: Option<&str>,
    population: Option<u64>,
    guidance: Option<&str>,
) -> Option<String> {
    let mut answer = format!(
        "{name} has a {} flood risk. The flood season typically runs from {}, affecting approximately {} people.",
        risk_level?,
        season?,
        format_thousands(population?)
    );

    if let Some(guidance) = guidance.map(str::trim).filter(|g| !g.is_empty()) {
        answer.push(' ');
        answer.push_str(guidance);
    }

    Some(answer)
}

fn normalize_terms(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|term| normalize_query(term))
        .filter(|term| !term.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_store_loads() {
        let store = KnowledgeStore::builtin().unwrap();
        assert!(!store.is_empty());
        assert!(store.get("Bentiu").is_some());
        assert!(store.get("johnglei").is_some());
    }

    #[test]
    fn region_answer_is_composed_from_fields() {
        let store = KnowledgeStore::builtin().unwrap();
        let bentiu = store.get("bentiu").unwrap();
        assert_eq!(bentiu.risk_level, Some(RiskLevel::High));
        assert_eq!(
            bentiu.answer,
            "Bentiu has a High flood risk. The flood season typically runs from May to October, affecting approximately 120,000 people."
        );
    }

    #[test]
    fn guidance_is_appended_to_composed_answer() {
        let store = KnowledgeStore::from_json_str(
            r#"{"entries":[{"name":"Pibor","risk_level":"Very High","season":"May to November","population_affected":5000,"guidance":"Move livestock early."}]}"#,
        )
        .unwrap();
        assert_eq!(
            store.get("pibor").unwrap().answer,
            "Pibor has a Very High flood risk. The flood season typically runs from May to November, affecting approximately 5,000 people. Move livestock early."
        );
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = KnowledgeStore::from_json_str(
            r#"{"entries":[{"name":"Bor","answer":"a"},{"name":"Bor Town","aliases":["BOR"],"answer":"b"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate knowledge key 'bor'"));
    }

    #[test]
    fn entry_without_answer_or_fields_is_rejected() {
        let result = KnowledgeStore::from_json_str(r#"{"entries":[{"name":"Leer","risk_level":"High"}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn region_csv_rows_are_appended() {
        let store = KnowledgeStore::builtin().unwrap();
        let before = store.len();
        let store = store
            .with_regions_csv(
                "region,risk_level,flood_season_start,flood_season_end,population_affected\nRumbek,Medium,June,September,40000\n",
            )
            .unwrap();
        assert_eq!(store.len(), before + 1);
        assert_eq!(
            store.get("rumbek").unwrap().answer,
            "Rumbek has a Medium flood risk. The flood season typically runs from June to September, affecting approximately 40,000 people."
        );
    }

    #[test]
    fn region_csv_cannot_shadow_existing_key() {
        let store = KnowledgeStore::builtin().unwrap();
        let result = store.with_regions_csv(
            "region,risk_level,flood_season_start,flood_season_end,population_affected\nJuba,Low,July,August,1\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn region_csv_rejects_unknown_risk_level() {
        let store = KnowledgeStore::builtin().unwrap();
        let result = store.with_regions_csv(
            "region,risk_level,flood_season_start,flood_season_end,population_affected\nKoch,Extreme,May,October,1000\n",
        );
        assert!(result.is_err());
    }
}
