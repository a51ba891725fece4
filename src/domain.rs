use std::collections::BTreeSet;
use std::sync::Arc;

use crate::knowledge::KnowledgeStore;
use crate::text::{contains_term, normalize_query};

const DOMAIN_KEYWORDS: &[&str] = &[
    // hazard and climate vocabulary
    "flood",
    "floods",
    "flooding",
    "flooded",
    "floodwater",
    "floodwaters",
    "water level",
    "water levels",
    "river",
    "rivers",
    "nile",
    "white nile",
    "sobat",
    "sudd",
    "wetland",
    "wetlands",
    "rain",
    "rains",
    "rainfall",
    "rainy season",
    "wet season",
    "drought",
    "climate",
    "climate change",
    "global warming",
    "risk",
    "risks",
    "evacuation",
    "evacuate",
    "emergency",
    "warning",
    "warnings",
    "early warning",
    "disaster",
    "displacement",
    "displaced",
    "humanitarian",
    "preparedness",
    "chirps",
    // geography
    "south sudan",
    "sudan",
    "county",
    "payam",
    "boma",
    "jonglei",
    "johnglei",
    "upper nile",
    "unity state",
    "equatoria",
    "central equatoria",
    "eastern equatoria",
    "western equatoria",
    "northern bahr el ghazal",
    "western bahr el ghazal",
    "bahr el ghazal",
    "lakes state",
    "warrap",
    "bentiu",
    "bor",
    "malakal",
    "juba",
    "tonj",
    "yei",
    "wau",
    "aweil",
    "rumbek",
    "kuajok",
    "torit",
    "kapoeta",
    "magwi",
    "pochalla",
    "pibor",
    "akobo",
    "nasir",
    "melut",
    "renk",
    "kodok",
    "fashoda",
    "maban",
    "pariang",
    "rubkona",
    "mayom",
    "koch",
    "leer",
    "panyijiar",
    "guit",
    "mayendit",
    "abiemnhom",
];

/// Keyword gate deciding whether a query belongs to the flood-risk domain.
#[derive(Clone, Debug)]
pub struct DomainClassifier {
    keywords: Arc<Vec<String>>,
}

impl DomainClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: BTreeSet<String> = keywords
            .into_iter()
            .map(|keyword| normalize_query(keyword.as_ref()))
            .filter(|keyword| !keyword.is_empty())
            .collect();

        Self {
            keywords: Arc::new(keywords.into_iter().collect()),
        }
    }

    /// Built-in vocabulary plus the store's unconditional keys and qualifier terms, so
    /// anything the rules can answer is also in-domain.
    pub fn for_store(store: &KnowledgeStore) -> Self {
        let store_keys = store.entries().iter().flat_map(|entry| {
            if entry.is_qualified() {
                entry.requires_any.clone()
            } else {
                entry.keys().map(str::to_string).collect()
            }
        });

        Self::new(
            DOMAIN_KEYWORDS
                .iter()
                .map(|keyword| keyword.to_string())
                .chain(store_keys),
        )
    }

    pub fn is_in_domain(&self, normalized_query: &str) -> bool {
        if normalized_query.is_empty() {
            return false;
        }

        self.keywords
            .iter()
            .any(|keyword| contains_term(normalized_query, keyword))
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }
}
