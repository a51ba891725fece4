use crate::knowledge::{KnowledgeEntry, KnowledgeStore};
use crate::text::{contains_term, has_any_term};

#[derive(Debug, Clone, Copy)]
pub struct RuleMatch<'a> {
    pub entry: &'a KnowledgeEntry,
    pub matched_key: &'a str,
}

impl<'a> RuleMatch<'a> {
    pub fn answer(&self) -> &'a str {
        &self.entry.answer
    }
}

#[derive(Clone, Debug)]
pub struct RuleResolver {
    store: KnowledgeStore,
}

impl RuleResolver {
    pub fn new(store: KnowledgeStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    /// `None` is the no-match sentinel. Out-of-domain queries never match.
    pub fn resolve(&self, normalized_query: &str, in_domain: bool) -> Option<&str> {
        if !in_domain {
            return None;
        }
        self.best_match(normalized_query).map(|found| found.answer())
    }

    /// Highest priority wins, then the longest matched key, then store order.
    pub fn best_match(&self, normalized_query: &str) -> Option<RuleMatch<'_>> {
        let mut best: Option<RuleMatch<'_>> = None;

        for entry in self.store.entries() {
            let Some(matched_key) = longest_matching_key(entry, normalized_query) else {
                continue;
            };

            if entry.is_qualified() && !has_any_term(normalized_query, &entry.requires_any) {
                continue;
            }

            let candidate = RuleMatch { entry, matched_key };
            best = match best {
                Some(current) if !outranks(&candidate, &current) => Some(current),
                _ => Some(candidate),
            };
        }

        best
    }
}

fn longest_matching_key<'a>(entry: &'a KnowledgeEntry, query: &str) -> Option<&'a str> {
    entry
        .keys()
        .filter(|key| contains_term(query, key))
        .fold(None::<&'a str>, |longest, key| match longest {
            Some(current) if current.len() >= key.len() => Some(current),
            _ => Some(key),
        })
}

fn outranks(candidate: &RuleMatch<'_>, current: &RuleMatch<'_>) -> bool {
    (candidate.entry.priority, candidate.matched_key.len())
        > (current.entry.priority, current.matched_key.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::normalize_query;

    fn resolver() -> RuleResolver {
        RuleResolver::new(KnowledgeStore::builtin().unwrap())
    }

    fn resolve(resolver: &RuleResolver, query: &str) -> Option<String> {
        resolver
            .resolve(&normalize_query(query), true)
            .map(str::to_string)
    }

    #[test]
    fn known_region_returns_stored_answer() {
        let resolver = resolver();
        let answer = resolve(&resolver, "What is the flood risk in Bentiu?").unwrap();
        assert_eq!(
            answer,
            "Bentiu has a High flood risk. The flood season typically runs from May to October, affecting approximately 120,000 people."
        );
    }

    #[test]
    fn every_unqualified_key_resolves_to_its_own_entry() {
        let resolver = resolver();
        for entry in resolver.store().entries() {
            if entry.is_qualified() {
                continue;
            }
            for key in entry.keys() {
                let query = format!("tell me about {key} please");
                let found = resolver.best_match(&query).unwrap();
                assert_eq!(found.entry.key, entry.key, "query: {query}");
            }
        }
    }

    #[test]
    fn out_of_domain_never_matches() {
        let resolver = resolver();
        assert_eq!(resolver.resolve("flood risk in bentiu", false), None);
    }

    #[test]
    fn unmatched_query_yields_sentinel() {
        let resolver = resolver();
        assert_eq!(
            resolve(
                &resolver,
                "Explain unusual climate feedback loops in wetlands of Sudd"
            ),
            None
        );
    }

    #[test]
    fn longest_key_wins_on_overlap() {
        let resolver = resolver();
        let found = resolver
            .best_match("flood risk for bentiu in unity state")
            .unwrap();
        assert_eq!(found.entry.key, "unity state");
        assert_eq!(found.matched_key, "unity state");

        let found = resolver.best_match("floods in central equatoria").unwrap();
        assert_eq!(found.entry.key, "equatoria");
        assert_eq!(found.matched_key, "central equatoria");
    }

    #[test]
    fn region_outranks_generic_topic() {
        let resolver = resolver();
        let found = resolver
            .best_match("when is the flood season in bentiu?")
            .unwrap();
        assert_eq!(found.entry.key, "bentiu");

        let found = resolver.best_match("hello, what about bor?").unwrap();
        assert_eq!(found.entry.key, "bor");
    }

    #[test]
    fn qualified_topic_needs_its_qualifier() {
        let resolver = resolver();
        assert_eq!(
            resolver
                .best_match("when is the flood season?")
                .unwrap()
                .entry
                .key,
            "flood season"
        );
        assert!(resolver.best_match("when is the market open?").is_none());

        let found = resolver
            .best_match("where are evacuation centers in malakal?")
            .unwrap();
        assert_eq!(found.entry.key, "evacuation centers");
        assert!(resolver.best_match("where are evacuation centers?").is_none());
    }

    #[test]
    fn plain_center_mentions_keep_the_region_answer() {
        let resolver = resolver();
        let found = resolver
            .best_match("what is the flood risk in juba city center?")
            .unwrap();
        assert_eq!(found.entry.key, "juba");

        let found = resolver
            .best_match("is the bor health center at risk of flooding?")
            .unwrap();
        assert_eq!(found.entry.key, "bor");

        let found = resolver
            .best_match("is there a flood shelter in bor?")
            .unwrap();
        assert_eq!(found.entry.key, "evacuation centers");
    }

    #[test]
    fn short_keys_do_not_match_inside_words() {
        let resolver = resolver();
        assert!(resolver.best_match("my neighbor asked about this").is_none());
    }

    #[test]
    fn repeated_lookups_are_identical() {
        let resolver = resolver();
        let query = normalize_query("What is the flood risk in Juba?");
        let first = resolver.resolve(&query, true).map(str::to_string);
        for _ in 0..5 {
            assert_eq!(resolver.resolve(&query, true).map(str::to_string), first);
        }
    }
}
